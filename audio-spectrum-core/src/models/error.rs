use thiserror::Error;

/// Errors raised by the capture and analysis pipeline.
///
/// None of these are fatal to the process. The coordinator converts each one
/// into a logged, recoverable outcome (empty device list, excluded device,
/// silent hop, idle backoff).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A backend could not be queried for its devices.
    #[error("{backend} device enumeration failed: {reason}")]
    DeviceEnumeration { backend: String, reason: String },

    /// A specific device failed to open.
    #[error("failed to open {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    /// A callback stream produced no block within the read timeout.
    #[error("no audio within the read timeout")]
    ReadTimeout,

    /// None of the selected devices could be opened.
    #[error("no selected device could be opened")]
    EmptyActiveSet,

    /// A blocking read on an open stream failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    pub fn enumeration(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeviceEnumeration {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub fn open(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeviceOpen {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}
