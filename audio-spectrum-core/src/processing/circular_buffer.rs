/// Fixed-length overlapping sample window.
///
/// Each hop discards the oldest `hop_size` samples and appends the newest
/// `hop_size` at the tail, so consecutive windows overlap by
/// `window_size - hop_size` samples. The length never changes.
///
/// Owned by the coordinator thread only; no locking.
#[derive(Debug, Clone)]
pub struct CircularAudioBuffer {
    samples: Vec<f32>,
    hop_size: usize,
}

impl CircularAudioBuffer {
    /// A silent window. `hop_size` is capped at `window_size`.
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        Self {
            samples: vec![0.0; window_size],
            hop_size: hop_size.min(window_size),
        }
    }

    /// Rotate left by one hop and write `hop` into the vacated tail.
    ///
    /// A short `hop` is zero-padded at the end; a long one keeps only its
    /// first `hop_size` samples.
    pub fn push_hop(&mut self, hop: &[f32]) {
        let hop_size = self.hop_size;
        self.samples.rotate_left(hop_size);

        let start = self.samples.len() - hop_size;
        let tail = &mut self.samples[start..];
        let copied = hop.len().min(hop_size);
        tail[..copied].copy_from_slice(&hop[..copied]);
        tail[copied..].fill(0.0);
    }

    /// The whole window, oldest sample first.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// The most recently written hop.
    pub fn latest_hop(&self) -> &[f32] {
        &self.samples[self.samples.len() - self.hop_size..]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
