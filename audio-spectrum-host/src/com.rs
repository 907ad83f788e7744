use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use audio_spectrum_core::models::error::CaptureError;

/// Per-thread COM initialization, undone on drop.
///
/// A thread that already joined a different apartment keeps it; the guard
/// then leaves COM alone on drop.
pub(crate) struct ComGuard {
    owns: bool,
}

impl ComGuard {
    pub(crate) fn init() -> Result<Self, CaptureError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owns: false });
        }
        hr.ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self { owns: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.owns {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
