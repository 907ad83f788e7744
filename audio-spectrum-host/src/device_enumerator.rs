//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Render endpoints are what loopback capture records from, so they are
//! reported as loopback-capable; capture endpoints are listed too but
//! flagged as plain microphones.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::VT_LPWSTR;

use audio_spectrum_core::models::audio_models::{DeviceHandle, LoopbackDeviceInfo};
use audio_spectrum_core::models::error::CaptureError;

const BACKEND_NAME: &str = "wasapi";

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, CaptureError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::enumeration(BACKEND_NAME, format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// Active render endpoints (loopback) followed by active capture endpoints.
    pub fn list_endpoints(&self) -> Result<Vec<LoopbackDeviceInfo>, CaptureError> {
        let mut endpoints = self.list(eRender, true)?;
        endpoints.extend(self.list(eCapture, false)?);
        Ok(endpoints)
    }

    /// Open an endpoint by the id [`list_endpoints`](Self::list_endpoints) reported.
    pub fn device(&self, id: &str) -> Result<IMMDevice, CaptureError> {
        let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            self.enumerator
                .GetDevice(PCWSTR(wide.as_ptr()))
                .map_err(|_| CaptureError::DeviceNotAvailable)
        }
    }

    fn list(&self, data_flow: EDataFlow, is_loopback: bool) -> Result<Vec<LoopbackDeviceInfo>, CaptureError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::enumeration(BACKEND_NAME, format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::enumeration(BACKEND_NAME, format!("GetCount failed: {}", e)))?;

            let mut endpoints = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Ok(id) = device.GetId() else {
                    continue;
                };
                let id = id.to_string().unwrap_or_default();
                let name = Self::friendly_name(&device).unwrap_or_else(|| format!("Endpoint {}", i));

                endpoints.push(LoopbackDeviceInfo {
                    name,
                    is_loopback,
                    handle: DeviceHandle::new(id),
                });
            }
            Ok(endpoints)
        }
    }

    /// Read the PKEY_Device_FriendlyName property from a device.
    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;

            let mut prop_variant = std::mem::zeroed::<PROPVARIANT>();
            store.GetValue(&PKEY_Device_FriendlyName, &mut prop_variant).ok()?;

            let name = if prop_variant.Anonymous.Anonymous.vt == VT_LPWSTR {
                let pwsz = prop_variant.Anonymous.Anonymous.Anonymous.pwszVal;
                if pwsz.is_null() {
                    None
                } else {
                    let len = (0..).take_while(|&i| *pwsz.offset(i) != 0).count();
                    Some(String::from_utf16_lossy(std::slice::from_raw_parts(pwsz, len)))
                }
            } else {
                None
            };

            PropVariantClear(&mut prop_variant).ok();
            name
        }
    }
}
