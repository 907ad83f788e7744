use std::sync::Arc;

use crate::models::audio_models::{AudioDevice, CallbackDeviceInfo, HostApiInfo, StreamParams};
use crate::models::error::CaptureError;

/// Callback invoked when an audio buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of interleaved channels.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// A low-latency backend that delivers audio by calling back from its own
/// high-priority thread.
///
/// Implemented by:
/// - `CpalCallbackHost` (all platforms)
pub trait CallbackHost: Send + Sync + 'static {
    /// Live stream. Dropping it stops the callbacks and releases the device.
    type Stream;

    /// Backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Host APIs this backend can drive, indexed as in `CallbackDeviceInfo::host_api`.
    fn host_apis(&self) -> Result<Vec<HostApiInfo>, CaptureError>;

    /// Every input-capable device across all host APIs.
    fn input_devices(&self) -> Result<Vec<CallbackDeviceInfo>, CaptureError>;

    /// Open and start a stream on `device`.
    ///
    /// The callback fires on the backend's audio thread; keep work minimal.
    fn open_stream(
        &self,
        device: &AudioDevice,
        params: &StreamParams,
        callback: AudioBufferCallback,
    ) -> Result<Self::Stream, CaptureError>;
}
