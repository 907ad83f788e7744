use crate::models::audio_models::AudioDevice;
use crate::models::config::SpectrumConfig;
use crate::models::error::CaptureError;
use crate::processing::hop_queue::QueueStats;
use crate::stream::CaptureStream;
use crate::traits::callback_host::CallbackHost;
use crate::traits::loopback_host::LoopbackHost;

struct SessionStream<C: CallbackHost, L: LoopbackHost> {
    stream: CaptureStream<C, L>,
    failed: bool,
}

/// Result of reading one hop across a session.
pub struct HopReads {
    /// One hop-sized block per stream that delivered.
    pub sources: Vec<Vec<f32>>,
    /// Streams that failed during this hop; they are retired for the rest of
    /// the session.
    pub failures: Vec<(AudioDevice, CaptureError)>,
}

/// The streams opened for one activation.
///
/// Opened and dropped on the coordinator thread. Dropping the session closes
/// every stream, so cleanup happens on every exit path including unwinding.
pub struct CaptureSession<C: CallbackHost, L: LoopbackHost> {
    streams: Vec<SessionStream<C, L>>,
}

impl<C: CallbackHost, L: LoopbackHost> CaptureSession<C, L> {
    /// Open a stream per device. Devices that fail are skipped and returned
    /// alongside the session.
    pub fn open(
        devices: &[AudioDevice],
        callback_host: &C,
        loopback_host: &L,
        config: &SpectrumConfig,
    ) -> (Self, Vec<(AudioDevice, CaptureError)>) {
        let mut streams = Vec::with_capacity(devices.len());
        let mut excluded = Vec::new();

        for device in devices {
            match CaptureStream::open(device, callback_host, loopback_host, config) {
                Ok(stream) => streams.push(SessionStream {
                    stream,
                    failed: false,
                }),
                Err(e) => {
                    log::warn!("Excluding {} from this session: {}", device, e);
                    excluded.push((device.clone(), e));
                }
            }
        }

        (Self { streams }, excluded)
    }

    /// Read exactly one hop from every live stream.
    pub fn read_hop(&mut self) -> HopReads {
        let mut sources = Vec::with_capacity(self.streams.len());
        let mut failures = Vec::new();

        for entry in self.streams.iter_mut().filter(|s| !s.failed) {
            match entry.stream.read_hop() {
                Ok(hop) => sources.push(hop),
                Err(e) => {
                    log::error!("Read failed on {}, dropping it from the session: {}", entry.stream.device(), e);
                    entry.failed = true;
                    entry.stream.close();
                    failures.push((entry.stream.device().clone(), e));
                }
            }
        }

        HopReads { sources, failures }
    }

    /// Streams opened, including failed ones.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn live_streams(&self) -> usize {
        self.streams.iter().filter(|s| !s.failed).count()
    }

    /// True once every opened stream has failed (or none opened).
    pub fn exhausted(&self) -> bool {
        self.live_streams() == 0
    }

    pub fn devices(&self) -> Vec<AudioDevice> {
        self.streams.iter().map(|s| s.stream.device().clone()).collect()
    }

    /// Queue counters summed over all streams.
    pub fn queue_stats(&self) -> QueueStats {
        self.streams
            .iter()
            .map(|s| s.stream.stats())
            .fold(QueueStats::default(), |acc, stats| QueueStats {
                pending: acc.pending + stats.pending,
                stale_dropped: acc.stale_dropped + stats.stale_dropped,
                overflow_dropped: acc.overflow_dropped + stats.overflow_dropped,
                timeouts: acc.timeouts + stats.timeouts,
            })
    }

    /// Close every stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        for entry in &mut self.streams {
            entry.stream.close();
        }
    }
}

impl<C: CallbackHost, L: LoopbackHost> Drop for CaptureSession<C, L> {
    fn drop(&mut self) {
        self.close();
    }
}
