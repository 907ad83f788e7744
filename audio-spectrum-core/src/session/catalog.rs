use crate::models::audio_models::{AudioDevice, BackendKind, CallbackDeviceInfo, HostApiInfo};
use crate::models::config::SpectrumConfig;
use crate::models::error::CaptureError;
use crate::traits::callback_host::CallbackHost;
use crate::traits::loopback_host::LoopbackHost;

/// Builds the unified device list shown to the user.
///
/// Microphones come only from the callback backend; desktop audio comes only
/// from the loopback endpoints of the blocking backend. Enumeration is
/// best-effort per backend: a backend that fails contributes nothing and the
/// failure is logged.
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    preferred_host_api: String,
    mic_label_prefix: String,
    loopback_label_prefix: String,
}

impl DeviceCatalog {
    pub fn new(config: &SpectrumConfig) -> Self {
        Self {
            preferred_host_api: config.preferred_host_api.clone(),
            mic_label_prefix: config.mic_label_prefix.clone(),
            loopback_label_prefix: config.loopback_label_prefix.clone(),
        }
    }

    /// Every selectable device, microphones first. Never fails.
    pub fn enumerate<C: CallbackHost, L: LoopbackHost>(&self, callback_host: &C, loopback_host: &L) -> Vec<AudioDevice> {
        let mut devices = match self.microphones(callback_host) {
            Ok(mics) => mics,
            Err(e) => {
                log::warn!("Skipping microphones: {}", e);
                Vec::new()
            }
        };

        match self.loopbacks(loopback_host) {
            Ok(loopbacks) => devices.extend(loopbacks),
            Err(e) => log::warn!("Skipping desktop audio: {}", e),
        }

        log::debug!("Enumerated {} capture devices", devices.len());
        devices
    }

    /// Input devices of the callback backend, restricted to the preferred host
    /// API when the backend exposes it.
    pub fn microphones<C: CallbackHost>(&self, host: &C) -> Result<Vec<AudioDevice>, CaptureError> {
        // A host API listing failure only disables the de-duplication filter.
        let preferred = match host.host_apis() {
            Ok(apis) => self.preferred_api(&apis),
            Err(e) => {
                log::debug!("Host API listing unavailable: {}", e);
                None
            }
        };
        let inputs = host.input_devices()?;

        Ok(inputs
            .into_iter()
            .filter(|info| info.max_input_channels > 0)
            .filter(|info| preferred.is_none_or(|api| info.host_api == api))
            .map(|info| self.microphone(info))
            .collect())
    }

    /// Loopback endpoints of the blocking backend.
    pub fn loopbacks<L: LoopbackHost>(&self, host: &L) -> Result<Vec<AudioDevice>, CaptureError> {
        Ok(host
            .capture_endpoints()?
            .into_iter()
            .filter(|info| info.is_loopback)
            .map(|info| {
                AudioDevice::new(
                    format!("{}{}", self.loopback_label_prefix, info.name),
                    BackendKind::Blocking,
                    true,
                    info.handle,
                    None,
                )
            })
            .collect())
    }

    fn preferred_api(&self, apis: &[HostApiInfo]) -> Option<usize> {
        if self.preferred_host_api.is_empty() {
            return None;
        }
        apis.iter()
            .find(|api| api.name.contains(&self.preferred_host_api))
            .map(|api| api.index)
    }

    fn microphone(&self, info: CallbackDeviceInfo) -> AudioDevice {
        AudioDevice::new(
            format!("{}{}", self.mic_label_prefix, info.name),
            BackendKind::Callback,
            false,
            info.handle,
            Some(info.index),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{callback_device, loopback_endpoint, FakeCallbackHost, FakeLoopbackHost};

    fn names(devices: &[AudioDevice]) -> Vec<&str> {
        devices.iter().map(|d| d.display_name()).collect()
    }

    fn catalog() -> DeviceCatalog {
        DeviceCatalog::new(&SpectrumConfig::default())
    }

    #[test]
    fn preferred_host_api_hides_duplicates() {
        // host api 0 = MME, 1 = Windows WASAPI
        let mics = FakeCallbackHost::with_devices(vec![
            callback_device("Headset (MME)", 0, 0, 1),
            callback_device("Headset", 1, 1, 1),
            callback_device("USB Mic", 1, 2, 2),
        ]);

        let devices = catalog().enumerate(&mics, &FakeLoopbackHost::empty());

        assert_eq!(names(&devices), vec!["[Mic] Headset", "[Mic] USB Mic"]);
        assert!(devices.iter().all(|d| d.backend_kind() == BackendKind::Callback));
        assert_eq!(devices[1].backend_index(), Some(2));
    }

    #[test]
    fn without_preferred_api_every_input_is_listed() {
        let mics = FakeCallbackHost::with_devices(vec![
            callback_device("hw:0", 0, 0, 2),
            callback_device("pulse", 0, 1, 2),
        ]);
        mics.set_host_apis(vec![HostApiInfo {
            index: 0,
            name: "ALSA".into(),
        }]);

        let devices = catalog().enumerate(&mics, &FakeLoopbackHost::empty());

        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn outputs_without_input_channels_are_skipped() {
        let mics = FakeCallbackHost::with_devices(vec![
            callback_device("Speakers", 1, 0, 0),
            callback_device("Mic", 1, 1, 1),
        ]);

        let devices = catalog().enumerate(&mics, &FakeLoopbackHost::empty());

        assert_eq!(names(&devices), vec!["[Mic] Mic"]);
    }

    #[test]
    fn only_loopback_endpoints_are_listed_from_blocking_backend() {
        let pc = FakeLoopbackHost::with_endpoints(vec![
            loopback_endpoint("Speakers", true),
            loopback_endpoint("Webcam Mic", false),
            loopback_endpoint("HDMI", true),
        ]);

        let devices = catalog().enumerate(&FakeCallbackHost::empty(), &pc);

        assert_eq!(names(&devices), vec!["[PC] Speakers", "[PC] HDMI"]);
        assert!(devices
            .iter()
            .all(|d| d.is_loopback() && d.backend_kind() == BackendKind::Blocking));
    }

    #[test]
    fn failing_backend_contributes_nothing() {
        let mics = FakeCallbackHost::with_devices(vec![callback_device("Mic", 1, 0, 1)]);
        mics.fail_enumeration();
        let pc = FakeLoopbackHost::with_endpoints(vec![loopback_endpoint("Speakers", true)]);

        let devices = catalog().enumerate(&mics, &pc);

        assert_eq!(names(&devices), vec!["[PC] Speakers"]);
        assert!(matches!(
            catalog().microphones(&mics),
            Err(CaptureError::DeviceEnumeration { .. })
        ));
    }

    #[test]
    fn both_backends_failing_yields_empty_list() {
        let mics = FakeCallbackHost::empty();
        mics.fail_enumeration();
        let pc = FakeLoopbackHost::empty();
        pc.fail_enumeration();

        assert!(catalog().enumerate(&mics, &pc).is_empty());
    }

    #[test]
    fn custom_prefixes_are_applied() {
        let config = SpectrumConfig {
            mic_label_prefix: "mic: ".into(),
            loopback_label_prefix: "out: ".into(),
            ..SpectrumConfig::default()
        };
        let mics = FakeCallbackHost::with_devices(vec![callback_device("A", 1, 0, 1)]);
        let pc = FakeLoopbackHost::with_endpoints(vec![loopback_endpoint("B", true)]);

        let devices = DeviceCatalog::new(&config).enumerate(&mics, &pc);

        assert_eq!(names(&devices), vec!["mic: A", "out: B"]);
    }
}
