//! # audio-spectrum-host
//!
//! Platform backends for audio-spectrum-core.
//!
//! Provides:
//! - `CpalCallbackHost`: callback input capture on every cpal host
//! - `WasapiLoopbackHost`: system audio via WASAPI loopback on render endpoints (Windows)
//! - `UnsupportedLoopbackHost`: empty loopback backend for other platforms
//! - `DeviceEnumerator`: endpoint enumeration via the MMDevice API (Windows)
//!
//! ## Usage
//! ```ignore
//! use audio_spectrum_core::SpectrumConfig;
//!
//! let mut coordinator = audio_spectrum_host::default_coordinator(SpectrumConfig::default())?;
//! coordinator.select_devices(coordinator.enumerate_devices());
//! coordinator.start()?;
//! let spectrum = coordinator.spectrum();
//! ```

pub mod cpal_host;
pub mod unsupported;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

use audio_spectrum_core::{CaptureCoordinator, CaptureError, SpectrumConfig};

pub use cpal_host::CpalCallbackHost;
pub use unsupported::UnsupportedLoopbackHost;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::{WasapiLoopbackHost, WasapiLoopbackRecorder};

/// The loopback backend for the current platform.
#[cfg(target_os = "windows")]
pub type DefaultLoopbackHost = WasapiLoopbackHost;

/// The loopback backend for the current platform.
#[cfg(not(target_os = "windows"))]
pub type DefaultLoopbackHost = UnsupportedLoopbackHost;

/// Coordinator over this platform's default backends.
pub fn default_coordinator(
    config: SpectrumConfig,
) -> Result<CaptureCoordinator<CpalCallbackHost, DefaultLoopbackHost>, CaptureError> {
    CaptureCoordinator::new(CpalCallbackHost::new(), DefaultLoopbackHost::default(), config)
}
