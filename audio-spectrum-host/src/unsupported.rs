use audio_spectrum_core::models::audio_models::{AudioDevice, LoopbackDeviceInfo, StreamParams};
use audio_spectrum_core::models::error::CaptureError;
use audio_spectrum_core::traits::loopback_host::{LoopbackHost, LoopbackRecorder};

/// Loopback host for platforms without a loopback backend.
///
/// Lists no endpoints, so the catalog only offers callback devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLoopbackHost;

impl UnsupportedLoopbackHost {
    pub fn new() -> Self {
        Self
    }
}

/// Uninhabited; an [`UnsupportedLoopbackHost`] never opens a recorder.
#[derive(Debug)]
pub enum NoRecorder {}

impl LoopbackRecorder for NoRecorder {
    fn record(&mut self, _frames: usize) -> Result<Vec<f32>, CaptureError> {
        match *self {}
    }
}

impl LoopbackHost for UnsupportedLoopbackHost {
    type Recorder = NoRecorder;

    fn name(&self) -> &str {
        "unsupported"
    }

    fn capture_endpoints(&self) -> Result<Vec<LoopbackDeviceInfo>, CaptureError> {
        Ok(Vec::new())
    }

    fn open_recorder(
        &self,
        _device: &AudioDevice,
        _params: &StreamParams,
    ) -> Result<Self::Recorder, CaptureError> {
        Err(CaptureError::DeviceNotAvailable)
    }
}
