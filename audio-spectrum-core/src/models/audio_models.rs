use std::fmt;

use serde::{Deserialize, Serialize};

/// Which capture backend a device is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Low-latency backend that pushes blocks from its own audio thread.
    Callback,
    /// Backend with a blocking read call, used for loopback endpoints.
    Blocking,
}

/// Backend-specific reference used to reopen a device.
///
/// The contents are only meaningful to the host that produced them
/// (a cpal host id, a WASAPI endpoint id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A capture device as presented to the device picker.
///
/// Built by the `DeviceCatalog` and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioDevice {
    display_name: String,
    backend_kind: BackendKind,
    is_loopback: bool,
    native_handle: DeviceHandle,
    backend_index: Option<usize>,
}

impl AudioDevice {
    pub fn new(
        display_name: impl Into<String>,
        backend_kind: BackendKind,
        is_loopback: bool,
        native_handle: DeviceHandle,
        backend_index: Option<usize>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            backend_kind,
            is_loopback,
            native_handle,
            backend_index,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn is_loopback(&self) -> bool {
        self.is_loopback
    }

    pub fn native_handle(&self) -> &DeviceHandle {
        &self.native_handle
    }

    pub fn backend_index(&self) -> Option<usize> {
        self.backend_index
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// A host API exposed by the callback backend (WASAPI, MME, ALSA, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostApiInfo {
    pub index: usize,
    pub name: String,
}

/// Raw input device listing from the callback backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackDeviceInfo {
    pub name: String,
    /// Index into the host API list this device belongs to.
    pub host_api: usize,
    pub max_input_channels: u16,
    /// Backend-wide device index.
    pub index: usize,
    pub handle: DeviceHandle,
}

/// Raw endpoint listing from the blocking backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackDeviceInfo {
    pub name: String,
    pub is_loopback: bool,
    pub handle: DeviceHandle,
}

/// Parameters every capture stream is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub hop_size: usize,
}

impl StreamParams {
    /// Wall-clock length of one hop.
    pub fn hop_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.hop_size as f64 / self.sample_rate as f64)
    }
}

/// Counters for debugging a running coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorDiagnostics {
    pub hops_processed: u64,
    pub sessions_started: u64,
    pub devices_excluded: u64,
    pub read_timeouts: u64,
    pub stale_blocks_dropped: u64,
    pub overflow_blocks_dropped: u64,
    pub read_failures: u64,
    pub last_analysis_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_duration_at_default_rate() {
        let params = StreamParams {
            sample_rate: 48000,
            hop_size: 512,
        };
        let millis = params.hop_duration().as_secs_f64() * 1000.0;
        assert!((millis - 10.666).abs() < 0.01);
    }

    #[test]
    fn device_serializes_backend_kind_lowercase() {
        let device = AudioDevice::new(
            "[PC] Speakers",
            BackendKind::Blocking,
            true,
            DeviceHandle::new("{0.0.0.00000000}.{abc}"),
            None,
        );
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"backend_kind\":\"blocking\""));

        let back: AudioDevice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, device);
    }
}
