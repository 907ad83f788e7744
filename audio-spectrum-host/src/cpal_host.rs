//! Callback capture through cpal.
//!
//! cpal exposes one "host" per platform audio API (WASAPI/ASIO on Windows,
//! ALSA/JACK on Linux, CoreAudio on macOS). Every available host is listed
//! so the catalog can prefer one when a platform exposes several.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, FromSample, HostId, Sample, SampleFormat, SizedSample, StreamConfig, SupportedBufferSize};

use audio_spectrum_core::models::audio_models::{
    AudioDevice, CallbackDeviceInfo, DeviceHandle, HostApiInfo, StreamParams,
};
use audio_spectrum_core::models::error::CaptureError;
use audio_spectrum_core::traits::callback_host::{AudioBufferCallback, CallbackHost};

const BACKEND_NAME: &str = "cpal";

/// [`CallbackHost`] over every cpal host available on this platform.
///
/// Holds only host ids, so it is `Send + Sync`; cpal hosts and devices are
/// created on demand on the calling thread.
#[derive(Debug, Clone)]
pub struct CpalCallbackHost {
    hosts: Vec<HostId>,
}

impl CpalCallbackHost {
    pub fn new() -> Self {
        Self {
            hosts: cpal::available_hosts(),
        }
    }

    fn host(&self, id: HostId) -> Result<cpal::Host, CaptureError> {
        cpal::host_from_id(id).map_err(|e| CaptureError::enumeration(id.name(), e))
    }

    /// Find the cpal device a catalog handle points at.
    fn find_device(&self, handle: &DeviceHandle) -> Result<cpal::Device, CaptureError> {
        let parsed = ParsedHandle::parse(handle.as_str())
            .ok_or_else(|| CaptureError::open(handle.as_str(), "malformed device handle"))?;
        let id = self
            .hosts
            .iter()
            .copied()
            .find(|id| id.name() == parsed.host)
            .ok_or_else(|| CaptureError::open(parsed.name, format!("host {} unavailable", parsed.host)))?;

        let mut devices: Vec<cpal::Device> = self
            .host(id)?
            .input_devices()
            .map_err(|e| CaptureError::open(parsed.name, e))?
            .collect();

        // Position first; fall back to name if the device list shifted.
        let named = |d: &cpal::Device| d.name().ok().as_deref() == Some(parsed.name);
        let position = if devices.get(parsed.position).is_some_and(named) {
            parsed.position
        } else {
            devices
                .iter()
                .position(named)
                .ok_or(CaptureError::DeviceNotAvailable)?
        };
        Ok(devices.swap_remove(position))
    }
}

impl Default for CpalCallbackHost {
    fn default() -> Self {
        Self::new()
    }
}

/// `<host>/<position>/<device name>`
struct ParsedHandle<'a> {
    host: &'a str,
    position: usize,
    name: &'a str,
}

impl<'a> ParsedHandle<'a> {
    fn format(host: HostId, position: usize, name: &str) -> DeviceHandle {
        DeviceHandle::new(format!("{}/{}/{}", host.name(), position, name))
    }

    fn parse(raw: &'a str) -> Option<Self> {
        let mut parts = raw.splitn(3, '/');
        let host = parts.next()?;
        let position = parts.next()?.parse().ok()?;
        let name = parts.next()?;
        Some(Self { host, position, name })
    }
}

impl CallbackHost for CpalCallbackHost {
    type Stream = cpal::Stream;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo>, CaptureError> {
        Ok(self
            .hosts
            .iter()
            .enumerate()
            .map(|(index, id)| HostApiInfo {
                index,
                name: id.name().to_string(),
            })
            .collect())
    }

    fn input_devices(&self) -> Result<Vec<CallbackDeviceInfo>, CaptureError> {
        let mut infos = Vec::new();
        let mut failures = Vec::new();

        for (api, &id) in self.hosts.iter().enumerate() {
            let devices = match self.host(id).and_then(|host| {
                host.input_devices()
                    .map_err(|e| CaptureError::enumeration(id.name(), e))
            }) {
                Ok(devices) => devices,
                Err(e) => {
                    log::warn!("Skipping cpal host {}: {}", id.name(), e);
                    failures.push(e);
                    continue;
                }
            };

            for (position, device) in devices.enumerate() {
                let Ok(name) = device.name() else {
                    continue;
                };
                infos.push(CallbackDeviceInfo {
                    handle: ParsedHandle::format(id, position, &name),
                    max_input_channels: max_input_channels(&device),
                    host_api: api,
                    index: infos.len(),
                    name,
                });
            }
        }

        // Only fail when no host could be queried at all.
        if infos.is_empty() && !failures.is_empty() && failures.len() == self.hosts.len() {
            return Err(failures.remove(0));
        }
        Ok(infos)
    }

    fn open_stream(
        &self,
        device: &AudioDevice,
        params: &StreamParams,
        callback: AudioBufferCallback,
    ) -> Result<Self::Stream, CaptureError> {
        let open_err = |reason: String| CaptureError::open(device.display_name(), reason);

        let cpal_device = self.find_device(device.native_handle())?;
        let supported = pick_config(&cpal_device, params.sample_rate)
            .map_err(|e| open_err(e.to_string()))?;
        let sample_format = supported.sample_format();
        let fixed = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&(params.hop_size as u32)) => {
                BufferSize::Fixed(params.hop_size as u32)
            }
            _ => BufferSize::Default,
        };
        let mut config: StreamConfig = supported.into();
        config.buffer_size = fixed;

        let stream = match build_stream(&cpal_device, &config, sample_format, callback.clone(), device) {
            Ok(stream) => stream,
            Err(e) if config.buffer_size != BufferSize::Default => {
                log::debug!("Fixed buffer rejected on {} ({}), using default", device, e);
                config.buffer_size = BufferSize::Default;
                build_stream(&cpal_device, &config, sample_format, callback, device)?
            }
            Err(e) => return Err(e),
        };

        stream.play().map_err(|e| open_err(e.to_string()))?;
        log::debug!(
            "cpal stream on {}: {} Hz, {} ch, {:?}",
            device,
            config.sample_rate.0,
            config.channels,
            sample_format
        );
        Ok(stream)
    }
}

fn max_input_channels(device: &cpal::Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

/// The device's default input format, at `target_rate` when supported.
fn pick_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig, cpal::DefaultStreamConfigError> {
    let default = device.default_input_config()?;
    let target = cpal::SampleRate(target_rate);
    if default.sample_rate() == target {
        return Ok(default);
    }

    let matching = device.supported_input_configs().ok().and_then(|mut ranges| {
        ranges.find(|range| {
            range.channels() == default.channels()
                && range.sample_format() == default.sample_format()
                && range.min_sample_rate() <= target
                && target <= range.max_sample_rate()
        })
    });
    Ok(matching.map_or(default, |range| range.with_sample_rate(target)))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    callback: AudioBufferCallback,
    target: &AudioDevice,
) -> Result<cpal::Stream, CaptureError> {
    let result = match format {
        SampleFormat::F32 => build_typed::<f32>(device, config, callback, target),
        SampleFormat::I16 => build_typed::<i16>(device, config, callback, target),
        SampleFormat::U16 => build_typed::<u16>(device, config, callback, target),
        SampleFormat::I32 => build_typed::<i32>(device, config, callback, target),
        other => {
            return Err(CaptureError::open(
                target.display_name(),
                format!("unsupported sample format {:?}", other),
            ))
        }
    };
    result.map_err(|e| CaptureError::open(target.display_name(), e))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    callback: AudioBufferCallback,
    target: &AudioDevice,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let sample_rate = config.sample_rate.0 as f64;
    let channels = config.channels;
    let label = target.display_name().to_string();
    let mut scratch: Vec<f32> = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            callback(&scratch, sample_rate, channels);
        },
        move |err| log::warn!("Input stream error on {}: {}", label, err),
        None,
    )
}
