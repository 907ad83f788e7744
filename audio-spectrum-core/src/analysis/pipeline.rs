use std::time::{Duration, Instant};

use crate::analysis::energy_tracker::EnergyTracker;
use crate::analysis::spectrum_analyzer::{normalize_frame, SpectrumAnalyzer};
use crate::models::config::{AnalysisParams, SpectrumConfig};
use crate::models::snapshot::SpectrumSnapshot;
use crate::processing::circular_buffer::CircularAudioBuffer;
use crate::processing::mixer::HopMixer;

/// Everything the coordinator does to one hop after the reads complete:
///
/// ```text
/// sources → mean mix → circular buffer → analyzer → log1p/normalize → energy tracker
/// ```
///
/// Owned by the coordinator thread; nothing here is shared.
pub struct HopPipeline {
    buffer: CircularAudioBuffer,
    analyzer: SpectrumAnalyzer,
    tracker: EnergyTracker,
    hop_size: usize,
    noise_floor: f32,
    hops: u64,
    last_analysis: Duration,
}

impl HopPipeline {
    pub fn new(config: &SpectrumConfig) -> Self {
        Self {
            buffer: CircularAudioBuffer::new(config.window_size, config.hop_size),
            analyzer: SpectrumAnalyzer::new(config.window_size),
            tracker: EnergyTracker::new(),
            hop_size: config.hop_size,
            noise_floor: config.spectrum_noise_floor,
            hops: 0,
            last_analysis: Duration::ZERO,
        }
    }

    /// Mix one hop from every source, advance the window, and analyze it.
    pub fn process_hop<S: AsRef<[f32]>>(&mut self, sources: &[S], params: &AnalysisParams) -> SpectrumSnapshot {
        let mixed = HopMixer::mix_mean(sources, self.hop_size);
        self.buffer.push_hop(&mixed);

        let started = Instant::now();
        let mut frame = self.analyzer.process(
            self.buffer.as_slice(),
            params.output_size,
            params.gain_min,
            params.gain_max,
        );
        normalize_frame(&mut frame, self.noise_floor);
        self.tracker.update(&frame);
        self.last_analysis = started.elapsed();

        self.hops += 1;
        self.snapshot()
    }

    pub fn snapshot(&self) -> SpectrumSnapshot {
        SpectrumSnapshot {
            spectrum: self.tracker.spectrum().to_vec(),
            echo: self.tracker.echo().to_vec(),
            bass_energy: self.tracker.bass_energy(),
            high_energy: self.tracker.high_energy(),
            hop: self.hops,
        }
    }

    pub fn buffer(&self) -> &CircularAudioBuffer {
        &self.buffer
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn hops(&self) -> u64 {
        self.hops
    }

    /// Time spent in FFT, normalization and envelope update on the last hop.
    pub fn last_analysis(&self) -> Duration {
        self.last_analysis
    }
}
