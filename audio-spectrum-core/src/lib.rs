//! # audio-spectrum-core
//!
//! Platform-agnostic real-time spectrum core.
//!
//! Unifies a callback-driven input backend (microphones) and a blocking-read
//! loopback backend (desktop audio) into one fixed-hop loop that mixes the
//! active sources, keeps an overlapping window, and publishes a log-band
//! spectrum plus bass/treble energy envelopes. Concrete backends implement
//! `CallbackHost` / `LoopbackHost` and plug into the generic
//! `CaptureCoordinator`.
//!
//! ## Architecture
//!
//! ```text
//! audio-spectrum-core (this crate)
//! ├── traits/       ← CallbackHost, LoopbackHost, LoopbackRecorder, CaptureDelegate
//! ├── models/       ← AudioDevice, CaptureError, CoordinatorState, SpectrumConfig, SpectrumSnapshot
//! ├── processing/   ← HopMixer, CircularAudioBuffer, bounded hop queue
//! ├── stream/       ← CaptureStream (callback | blocking)
//! ├── analysis/     ← SpectrumAnalyzer, EnergyTracker, HopPipeline
//! └── session/      ← DeviceCatalog, CaptureSession, CaptureCoordinator, SharedSpectrum
//! ```

pub mod analysis;
pub mod models;
pub mod processing;
pub mod session;
pub mod stream;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use analysis::energy_tracker::EnergyTracker;
pub use analysis::pipeline::HopPipeline;
pub use analysis::spectrum_analyzer::{normalize_frame, SpectrumAnalyzer};
pub use models::audio_models::{
    AudioDevice, BackendKind, CallbackDeviceInfo, CoordinatorDiagnostics, DeviceHandle, HostApiInfo,
    LoopbackDeviceInfo, StreamParams,
};
pub use models::config::{AnalysisParams, ParamsHandle, SpectrumConfig, GAIN_LIMIT};
pub use models::error::CaptureError;
pub use models::snapshot::SpectrumSnapshot;
pub use models::state::CoordinatorState;
pub use processing::circular_buffer::CircularAudioBuffer;
pub use processing::mixer::HopMixer;
pub use processing::resampler::StreamResampler;
pub use session::capture_session::CaptureSession;
pub use session::catalog::DeviceCatalog;
pub use session::coordinator::CaptureCoordinator;
pub use session::shared::SharedSpectrum;
pub use stream::CaptureStream;
pub use traits::callback_host::{AudioBufferCallback, CallbackHost};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::loopback_host::{LoopbackHost, LoopbackRecorder};
