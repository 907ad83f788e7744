use crate::models::audio_models::{AudioDevice, LoopbackDeviceInfo, StreamParams};
use crate::models::error::CaptureError;

/// A backend with a blocking read call that can record what the system is
/// playing.
///
/// Implemented by:
/// - `WasapiLoopbackHost` (Windows)
/// - `UnsupportedLoopbackHost` (everything else; lists no devices)
pub trait LoopbackHost: Send + Sync + 'static {
    type Recorder: LoopbackRecorder;

    /// Backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Every endpoint the backend can record, loopback or not.
    fn capture_endpoints(&self) -> Result<Vec<LoopbackDeviceInfo>, CaptureError>;

    /// Acquire a recorder on `device`.
    ///
    /// Called on the thread that will read from it. The recorder owns its
    /// backend resources and releases them when dropped.
    fn open_recorder(
        &self,
        device: &AudioDevice,
        params: &StreamParams,
    ) -> Result<Self::Recorder, CaptureError>;
}

/// A scoped recorder handed out by a [`LoopbackHost`].
pub trait LoopbackRecorder {
    /// Block until `frames` mono frames at the stream's sample rate are
    /// available and return them.
    ///
    /// Should take roughly `frames / sample_rate` seconds; callers use this as
    /// their pacing.
    fn record(&mut self, frames: usize) -> Result<Vec<f32>, CaptureError>;
}
