use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::snapshot::SpectrumSnapshot;

/// Read side of the published spectrum.
///
/// The coordinator thread is the only writer and replaces the whole snapshot
/// once per hop; readers clone what they need at their own frame rate.
#[derive(Debug, Clone)]
pub struct SharedSpectrum {
    inner: Arc<RwLock<SpectrumSnapshot>>,
}

impl SharedSpectrum {
    pub fn new(initial: SpectrumSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub(crate) fn publish(&self, snapshot: SpectrumSnapshot) {
        *self.inner.write() = snapshot;
    }

    pub fn snapshot(&self) -> SpectrumSnapshot {
        self.inner.read().clone()
    }

    pub fn spectrum(&self) -> Vec<f32> {
        self.inner.read().spectrum.clone()
    }

    pub fn echo(&self) -> Vec<f32> {
        self.inner.read().echo.clone()
    }

    pub fn bass_energy(&self) -> f32 {
        self.inner.read().bass_energy
    }

    pub fn high_energy(&self) -> f32 {
        self.inner.read().high_energy
    }

    /// Hop counter of the current snapshot; unchanged means nothing new.
    pub fn hop(&self) -> u64 {
        self.inner.read().hop
    }

    /// Copy the spectrum into `out` without allocating, resizing it if needed.
    pub fn read_into(&self, out: &mut Vec<f32>) -> u64 {
        let snapshot = self.inner.read();
        out.clear();
        out.extend_from_slice(&snapshot.spectrum);
        snapshot.hop
    }
}
