/// Pure-math mono mixing helpers.
///
/// All operations work on `&[f32]` buffers with no platform dependencies.
/// Every source is reduced to mono at the target sample rate (see
/// [`StreamResampler`](super::resampler::StreamResampler)) before the per-hop
/// mix, which is a plain arithmetic mean across sources.
#[derive(Debug, Clone, Copy)]
pub struct HopMixer;

impl HopMixer {
    /// Mix one hop from each active source into a single mono hop.
    ///
    /// Output sample `i` is the mean of sample `i` across all sources. A source
    /// shorter than `hop_size` contributes silence for its missing tail.
    /// With one source this is the identity; with none it is silence.
    pub fn mix_mean<S: AsRef<[f32]>>(sources: &[S], hop_size: usize) -> Vec<f32> {
        let mut mixed = vec![0.0f32; hop_size];
        if sources.is_empty() {
            return mixed;
        }

        for source in sources {
            for (out, &sample) in mixed.iter_mut().zip(source.as_ref()) {
                *out += sample;
            }
        }

        let scale = 1.0 / sources.len() as f32;
        for sample in &mut mixed {
            *sample *= scale;
        }
        mixed
    }

    /// Average interleaved channels into mono.
    pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
        if channels <= 1 {
            return samples.to_vec();
        }
        let scale = 1.0 / channels as f32;
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }

    /// Zero the whole block when its peak stays under `threshold`.
    ///
    /// Returns `true` if the block was gated.
    pub fn apply_noise_gate(block: &mut [f32], threshold: f32) -> bool {
        if Self::peak_level(block) < threshold {
            block.fill(0.0);
            true
        } else {
            false
        }
    }

    /// Compute peak absolute level of samples.
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}
