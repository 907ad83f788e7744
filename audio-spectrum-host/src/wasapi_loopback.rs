//! WASAPI loopback recording for system audio.
//!
//! Records the mix going to a render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`. No special permissions needed on Windows.
//!
//! The recorder is polled rather than event-driven: `record` drains whatever
//! packets the engine has queued, and waits at most one hop period for more.
//! WASAPI delivers no packets while nothing is playing, so an idle endpoint
//! yields silent hops at the normal pace instead of blocking.

use std::thread;
use std::time::{Duration, Instant};

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_spectrum_core::models::audio_models::{AudioDevice, LoopbackDeviceInfo, StreamParams};
use audio_spectrum_core::models::error::CaptureError;
use audio_spectrum_core::processing::mixer::HopMixer;
use audio_spectrum_core::processing::resampler::StreamResampler;
use audio_spectrum_core::traits::loopback_host::{LoopbackHost, LoopbackRecorder};

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;

const BACKEND_NAME: &str = "wasapi";

/// 100 ms in 100 ns units.
const BUFFER_DURATION: i64 = 1_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Hops of backlog kept before the oldest samples are discarded.
const MAX_BACKLOG_HOPS: usize = 4;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// [`LoopbackHost`] over the Windows MMDevice and WASAPI APIs.
///
/// Stateless; each call joins COM on the calling thread for as long as it
/// needs to.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasapiLoopbackHost;

impl WasapiLoopbackHost {
    pub fn new() -> Self {
        Self
    }
}

impl LoopbackHost for WasapiLoopbackHost {
    type Recorder = WasapiLoopbackRecorder;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn capture_endpoints(&self) -> Result<Vec<LoopbackDeviceInfo>, CaptureError> {
        let _com = ComGuard::init()?;
        let enumerator = DeviceEnumerator::new()?;
        enumerator.list_endpoints()
    }

    fn open_recorder(
        &self,
        device: &AudioDevice,
        params: &StreamParams,
    ) -> Result<Self::Recorder, CaptureError> {
        WasapiLoopbackRecorder::open(device, params)
    }
}

/// Engine mix format, freed with `CoTaskMemFree` on drop.
struct MixFormat(*mut WAVEFORMATEX);

impl MixFormat {
    fn get(&self) -> WAVEFORMATEX {
        unsafe { *self.0 }
    }

    fn is_float32(&self) -> bool {
        let format = self.get();
        let tag = format.wFormatTag;
        let bits = format.wBitsPerSample;
        bits == 32 && (tag == WAVE_FORMAT_IEEE_FLOAT || tag == WAVE_FORMAT_EXTENSIBLE)
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.0 as *const _));
        }
    }
}

/// A started loopback client on one render endpoint.
///
/// Holds COM objects, so it stays on the thread that opened it.
pub struct WasapiLoopbackRecorder {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    channels: usize,
    device_rate: f64,
    sample_rate: u32,
    resampler: StreamResampler,
    pending: Vec<f32>,
    // Dropped last so the COM objects above are released first.
    _com: ComGuard,
}

impl WasapiLoopbackRecorder {
    /// Sequence:
    /// 1. CoInitializeEx (MTA)
    /// 2. Look up the endpoint by id
    /// 3. Activate IAudioClient and read the mix format
    /// 4. Initialize with LOOPBACK flag in shared mode
    /// 5. Get IAudioCaptureClient and start
    fn open(device: &AudioDevice, params: &StreamParams) -> Result<Self, CaptureError> {
        let com = ComGuard::init()?;
        let open_err = |stage: &str, e: windows::core::Error| {
            CaptureError::open(device.display_name(), format!("{} failed: {}", stage, e))
        };

        let endpoint = DeviceEnumerator::new()?.device(device.native_handle().as_str())?;

        unsafe {
            let audio_client: IAudioClient = endpoint
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| open_err("Activate", e))?;

            let mix_format = MixFormat(audio_client.GetMixFormat().map_err(|e| open_err("GetMixFormat", e))?);
            if !mix_format.is_float32() {
                return Err(CaptureError::open(
                    device.display_name(),
                    "engine mix format is not 32-bit float",
                ));
            }
            let format = mix_format.get();
            let channels = format.nChannels as usize;
            let device_rate = format.nSamplesPerSec as f64;

            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
                    BUFFER_DURATION,
                    0,
                    mix_format.0,
                    None,
                )
                .map_err(|e| open_err("IAudioClient::Initialize (loopback)", e))?;

            let capture_client: IAudioCaptureClient =
                audio_client.GetService().map_err(|e| open_err("GetService", e))?;

            audio_client.Start().map_err(|e| open_err("IAudioClient::Start", e))?;

            log::debug!(
                "WASAPI loopback on {}: {} Hz, {} ch",
                device,
                device_rate,
                channels
            );

            Ok(Self {
                audio_client,
                capture_client,
                channels,
                device_rate,
                sample_rate: params.sample_rate,
                resampler: StreamResampler::new(params.sample_rate as f64),
                pending: Vec::new(),
                _com: com,
            })
        }
    }

    /// Move every queued engine packet into `pending`, as mono at the target rate.
    fn drain_packets(&mut self) -> Result<(), CaptureError> {
        let read_err = |stage: &str, e: windows::core::Error| CaptureError::ReadFailed(format!("{} failed: {}", stage, e));

        unsafe {
            let mut packet_length = self
                .capture_client
                .GetNextPacketSize()
                .map_err(|e| read_err("GetNextPacketSize", e))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                self.capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| read_err("GetBuffer", e))?;

                if num_frames > 0 {
                    let mono = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || buffer_ptr.is_null() {
                        vec![0.0f32; num_frames as usize]
                    } else {
                        let total_samples = num_frames as usize * self.channels;
                        let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                        HopMixer::downmix_to_mono(samples, self.channels)
                    };
                    self.pending.extend(self.resampler.process(&mono, self.device_rate));
                }

                self.capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| read_err("ReleaseBuffer", e))?;

                packet_length = self
                    .capture_client
                    .GetNextPacketSize()
                    .map_err(|e| read_err("GetNextPacketSize", e))?;
            }
        }
        Ok(())
    }
}

impl LoopbackRecorder for WasapiLoopbackRecorder {
    fn record(&mut self, frames: usize) -> Result<Vec<f32>, CaptureError> {
        let deadline = Instant::now() + Duration::from_secs_f64(frames as f64 / self.sample_rate as f64);

        loop {
            self.drain_packets()?;
            if self.pending.len() >= frames || Instant::now() >= deadline {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        let backlog = frames * MAX_BACKLOG_HOPS;
        if self.pending.len() > backlog {
            let excess = self.pending.len() - backlog;
            log::trace!("Loopback backlog: discarding {} samples", excess);
            self.pending.drain(..excess);
        }

        let take = frames.min(self.pending.len());
        let mut hop: Vec<f32> = self.pending.drain(..take).collect();
        hop.resize(frames, 0.0);
        Ok(hop)
    }
}

impl Drop for WasapiLoopbackRecorder {
    fn drop(&mut self) {
        unsafe {
            let _ = self.audio_client.Stop();
        }
    }
}
