use crate::models::audio_models::AudioDevice;
use crate::models::error::CaptureError;
use crate::models::state::CoordinatorState;

/// Event delegate for coordinator notifications.
///
/// All methods are called from the coordinator thread, not the UI thread.
/// Implementations should marshal to the UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the coordinator state changes.
    fn on_state_changed(&self, state: &CoordinatorState);

    /// Called when a device fails to open or a read on it fails.
    fn on_device_error(&self, device: &AudioDevice, error: &CaptureError);
}
