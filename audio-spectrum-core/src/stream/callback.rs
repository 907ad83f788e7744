use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::AudioDevice;
use crate::models::config::SpectrumConfig;
use crate::models::error::CaptureError;
use crate::processing::hop_queue::{self, HopConsumer, HopProducer, QueueStats, QUEUE_CAPACITY};
use crate::processing::mixer::HopMixer;
use crate::processing::resampler::StreamResampler;
use crate::traits::callback_host::{AudioBufferCallback, CallbackHost};

/// Turns whatever the backend delivers into gated, hop-sized mono blocks.
///
/// Lives inside the audio callback.
struct HopAssembler {
    resampler: StreamResampler,
    hop_size: usize,
    gate_threshold: f32,
    pending: Vec<f32>,
    producer: HopProducer,
}

impl HopAssembler {
    fn push(&mut self, samples: &[f32], sample_rate: f64, channels: u16) {
        let mono = HopMixer::downmix_to_mono(samples, channels as usize);
        let mono = self.resampler.process(&mono, sample_rate);
        self.pending.extend_from_slice(&mono);

        while self.pending.len() >= self.hop_size {
            let mut block: Vec<f32> = self.pending.drain(..self.hop_size).collect();
            HopMixer::apply_noise_gate(&mut block, self.gate_threshold);
            if !self.producer.push(block) {
                log::trace!("hop queue full, dropped callback block");
            }
        }
    }
}

/// Capture stream fed by a backend callback.
///
/// The backend thread pushes hop-sized blocks into a bounded queue; the
/// coordinator pops them with [`read_hop`](Self::read_hop), which never waits
/// longer than the configured read timeout.
pub struct CallbackCaptureStream<S> {
    device: AudioDevice,
    handle: Option<S>,
    consumer: HopConsumer,
    hop_size: usize,
}

impl<S> CallbackCaptureStream<S> {
    /// Open `device` on `host` and start its callbacks.
    pub fn open<C>(host: &C, device: &AudioDevice, config: &SpectrumConfig) -> Result<Self, CaptureError>
    where
        C: CallbackHost<Stream = S>,
    {
        let (producer, consumer) =
            hop_queue::channel(QUEUE_CAPACITY, config.queue_high_water, config.read_timeout());

        let assembler = Mutex::new(HopAssembler {
            resampler: StreamResampler::new(config.sample_rate as f64),
            hop_size: config.hop_size,
            gate_threshold: config.noise_gate_threshold,
            pending: Vec::with_capacity(config.hop_size * 2),
            producer,
        });
        let callback: AudioBufferCallback = Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
            assembler.lock().push(samples, sample_rate, channels);
        });

        let handle = host
            .open_stream(device, &config.stream_params(), callback)
            .map_err(|e| match e {
                CaptureError::DeviceOpen { .. } => e,
                other => CaptureError::open(device.display_name(), other),
            })?;

        log::info!("Opened callback stream on {}", device);
        Ok(Self {
            device: device.clone(),
            handle: Some(handle),
            consumer,
            hop_size: config.hop_size,
        })
    }

    /// Next hop-sized mono block, or [`CaptureError::ReadTimeout`] if none
    /// arrived within the read timeout.
    pub fn try_read_hop(&mut self) -> Result<Vec<f32>, CaptureError> {
        self.consumer.pop_latest().ok_or(CaptureError::ReadTimeout)
    }

    /// Next hop-sized mono block, or silence if none arrived in time.
    pub fn read_hop(&mut self) -> Vec<f32> {
        self.try_read_hop().unwrap_or_else(|e| {
            log::trace!("{}: {}, substituting silence", self.device, e);
            vec![0.0; self.hop_size]
        })
    }

    /// Stop the backend stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle);
            log::info!("Closed callback stream on {}", self.device);
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn device(&self) -> &AudioDevice {
        &self.device
    }

    pub fn pending(&self) -> usize {
        self.consumer.pending()
    }

    pub fn stats(&self) -> QueueStats {
        self.consumer.stats()
    }
}

impl<S> Drop for CallbackCaptureStream<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{callback_device, FakeCallbackHost};

    fn test_config() -> SpectrumConfig {
        SpectrumConfig {
            hop_size: 8,
            window_size: 16,
            read_timeout_ms: 10,
            ..SpectrumConfig::default()
        }
    }

    #[test]
    fn quiet_block_is_emitted_as_exact_zeros() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        host.deliver(&device, &[0.014, -0.01, 0.002, 0.0, 0.005, -0.014, 0.01, 0.0], 48000.0, 1);

        assert_eq!(stream.read_hop(), vec![0.0; 8]);
    }

    #[test]
    fn loud_block_passes_through_untouched() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();
        let block = vec![0.5f32, -0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.01];

        host.deliver(&device, &block, 48000.0, 1);

        assert_eq!(stream.read_hop(), block);
    }

    #[test]
    fn odd_sized_stereo_deliveries_are_rechunked_to_hops() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 2)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        // 5 stereo frames, then 11: 16 mono frames total, two hops
        host.deliver(&device, &[0.4f32; 10], 48000.0, 2);
        host.deliver(&device, &[0.4f32; 22], 48000.0, 2);

        assert_eq!(stream.pending(), 2);
        let hop = stream.read_hop();
        assert_eq!(hop.len(), 8);
        assert!(hop.iter().all(|s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn resampled_packets_keep_every_sample() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        // 440 frames at 44.1 kHz resample to 478 frames at 48 kHz
        for _ in 0..10 {
            host.deliver(&device, &[0.5f32; 44], 44100.0, 1);
        }

        assert_eq!(stream.pending(), 59);
        assert!(stream.read_hop().iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn timeout_yields_silent_hop() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        assert_eq!(stream.try_read_hop(), Err(CaptureError::ReadTimeout));
        assert_eq!(stream.read_hop(), vec![0.0; 8]);
        assert_eq!(stream.stats().timeouts, 2);
    }

    #[test]
    fn backlog_of_six_returns_newest_block() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        for n in 1..=6 {
            host.deliver(&device, &[n as f32 * 0.1; 8], 48000.0, 1);
        }
        assert_eq!(stream.pending(), 6);

        let hop = stream.read_hop();

        assert!(hop.iter().all(|s| (s - 0.6).abs() < 1e-6));
        assert_eq!(stream.pending(), 0);
        assert_eq!(stream.stats().stale_dropped, 5);
    }

    #[test]
    fn close_is_idempotent_and_releases_backend() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        let mut stream = CallbackCaptureStream::open(&host, &device, &test_config()).unwrap();

        stream.close();
        stream.close();
        drop(stream);

        assert_eq!(host.opened(), 1);
        assert_eq!(host.closed(), 1);
    }

    #[test]
    fn open_failure_is_a_device_open_error() {
        let host = FakeCallbackHost::with_devices(vec![callback_device("Mic", 0, 0, 1)]);
        let device = host.catalog_device(0);
        host.fail_open(&device);

        let result = CallbackCaptureStream::open(&host, &device, &test_config());

        assert!(matches!(result, Err(CaptureError::DeviceOpen { .. })));
        assert_eq!(host.closed(), 0);
    }
}
