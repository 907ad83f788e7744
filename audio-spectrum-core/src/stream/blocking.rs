use crate::models::audio_models::AudioDevice;
use crate::models::config::SpectrumConfig;
use crate::models::error::CaptureError;
use crate::traits::loopback_host::{LoopbackHost, LoopbackRecorder};

/// Capture stream backed by a blocking recorder.
///
/// The recorder is acquired in [`open`](Self::open) and released by
/// [`close`](Self::close) or on drop, whichever comes first. Each
/// [`read_hop`](Self::read_hop) is one blocking read of `hop_size` frames,
/// which paces the coordinator loop.
pub struct BlockingCaptureStream<R: LoopbackRecorder> {
    device: AudioDevice,
    recorder: Option<R>,
    hop_size: usize,
}

impl<R: LoopbackRecorder> BlockingCaptureStream<R> {
    /// Acquire a recorder for `device`.
    pub fn open<L>(host: &L, device: &AudioDevice, config: &SpectrumConfig) -> Result<Self, CaptureError>
    where
        L: LoopbackHost<Recorder = R>,
    {
        let recorder = host
            .open_recorder(device, &config.stream_params())
            .map_err(|e| match e {
                CaptureError::DeviceOpen { .. } => e,
                other => CaptureError::open(device.display_name(), other),
            })?;

        log::info!("Opened loopback recorder on {}", device);
        Ok(Self {
            device: device.clone(),
            recorder: Some(recorder),
            hop_size: config.hop_size,
        })
    }

    /// One blocking read of exactly `hop_size` mono samples.
    pub fn read_hop(&mut self) -> Result<Vec<f32>, CaptureError> {
        let recorder = self
            .recorder
            .as_mut()
            .ok_or_else(|| CaptureError::ReadFailed(format!("{} is closed", self.device)))?;

        let mut frames = recorder.record(self.hop_size)?;
        frames.resize(self.hop_size, 0.0);
        Ok(frames)
    }

    /// Release the recorder. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            drop(recorder);
            log::info!("Released loopback recorder on {}", self.device);
        }
    }

    pub fn is_open(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn device(&self) -> &AudioDevice {
        &self.device
    }
}

impl<R: LoopbackRecorder> Drop for BlockingCaptureStream<R> {
    fn drop(&mut self) {
        self.close();
    }
}
