/// Linear-interpolation resampler for one mono stream.
///
/// Keeps its read position and the previous block's last sample, so a stream
/// delivered in arbitrary packets resamples the same as one long buffer: no
/// fractional output sample is lost at a packet edge and interpolation runs
/// across the boundary.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    target_sample_rate: f64,
    source_sample_rate: f64,
    /// Next output position in source samples, relative to the next block.
    /// In `[-1, 0)` it lies between `last` and the block's first sample.
    position: f64,
    last: Option<f32>,
}

impl StreamResampler {
    pub fn new(target_sample_rate: f64) -> Self {
        Self {
            target_sample_rate,
            source_sample_rate: target_sample_rate,
            position: 0.0,
            last: None,
        }
    }

    /// Resample the next block of the stream from `source_sample_rate`.
    ///
    /// Blocks at the target rate pass through unchanged. A change of source
    /// rate restarts the stream.
    pub fn process(&mut self, samples: &[f32], source_sample_rate: f64) -> Vec<f32> {
        if (source_sample_rate - self.source_sample_rate).abs() >= 0.01 {
            self.source_sample_rate = source_sample_rate;
            self.position = 0.0;
            self.last = None;
        }

        let Some(&newest) = samples.last() else {
            return Vec::new();
        };
        if (source_sample_rate - self.target_sample_rate).abs() < 0.01 || source_sample_rate <= 0.0 {
            self.last = Some(newest);
            return samples.to_vec();
        }

        let step = source_sample_rate / self.target_sample_rate;
        let end = (samples.len() - 1) as f64;
        let mut output = Vec::with_capacity((samples.len() as f64 / step) as usize + 1);

        while self.position < end {
            let index = self.position.floor();
            let fraction = (self.position - index) as f32;
            let (a, b) = if index < 0.0 {
                (self.last.unwrap_or(samples[0]), samples[0])
            } else {
                let i = index as usize;
                (samples[i], samples[i + 1])
            };
            output.push(a + (b - a) * fraction);
            self.position += step;
        }

        self.position -= samples.len() as f64;
        self.last = Some(newest);
        output
    }
}
