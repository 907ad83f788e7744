/// Blend weight toward a rising input.
const ATTACK: f32 = 0.6;
/// Blend weight toward a falling input.
const DECAY: f32 = 0.05;
/// Blend weight of a new frame into the displayed spectrum.
const SPECTRUM_BLEND: f32 = 0.15;
/// Lowest bands averaged for the bass envelope.
const BASS_BANDS: usize = 4;
/// Fraction of the spectrum below the treble region.
const TREBLE_START: f32 = 0.75;

/// Fast-attack, slow-decay envelope step.
pub fn smooth(current: f32, instant: f32) -> f32 {
    if instant > current {
        current * (1.0 - ATTACK) + instant * ATTACK
    } else {
        current * (1.0 - DECAY) + instant * DECAY
    }
}

/// Bass/treble envelopes plus the inertial display spectrum and its echo.
#[derive(Debug, Clone, Default)]
pub struct EnergyTracker {
    spectrum: Vec<f32>,
    echo: Vec<f32>,
    bass_energy: f32,
    high_energy: f32,
}

impl EnergyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one normalized frame into the envelopes and display spectrum.
    ///
    /// When the frame length differs from the current spectrum (output size
    /// changed), spectrum and echo restart from zero at the new length.
    pub fn update(&mut self, norm: &[f32]) {
        self.bass_energy = smooth(self.bass_energy, bass_instant(norm));
        self.high_energy = smooth(self.high_energy, treble_instant(norm));

        if self.spectrum.len() != norm.len() {
            self.spectrum = vec![0.0; norm.len()];
            self.echo = vec![0.0; norm.len()];
        }

        self.echo.copy_from_slice(&self.spectrum);
        for (shown, &fresh) in self.spectrum.iter_mut().zip(norm) {
            *shown = *shown * (1.0 - SPECTRUM_BLEND) + fresh * SPECTRUM_BLEND;
        }
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    pub fn echo(&self) -> &[f32] {
        &self.echo
    }

    pub fn bass_energy(&self) -> f32 {
        self.bass_energy
    }

    pub fn high_energy(&self) -> f32 {
        self.high_energy
    }
}

fn bass_instant(norm: &[f32]) -> f32 {
    if norm.len() <= BASS_BANDS {
        return 0.0;
    }
    finite_or_zero(mean(&norm[..BASS_BANDS]))
}

fn treble_instant(norm: &[f32]) -> f32 {
    if norm.is_empty() {
        return 0.0;
    }
    let start = (norm.len() as f32 * TREBLE_START) as usize;
    finite_or_zero(mean(&norm[start..]))
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn attack_and_decay_weights() {
        assert_abs_diff_eq!(smooth(0.0, 1.0), 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(smooth(1.0, 0.0), 0.95, epsilon = 1e-6);
    }

    #[test]
    fn rises_monotonically_without_overshoot() {
        let mut value = 0.1;
        for _ in 0..50 {
            let next = smooth(value, 0.8);
            assert!(next >= value - 1e-6);
            assert!(next <= 0.8 + 1e-6);
            value = next;
        }
        assert_abs_diff_eq!(value, 0.8, epsilon = 1e-4);
    }

    #[test]
    fn falls_monotonically_without_undershoot() {
        let mut value = 0.9;
        for _ in 0..400 {
            let next = smooth(value, 0.2);
            assert!(next <= value + 1e-6);
            assert!(next >= 0.2 - 1e-6);
            value = next;
        }
        assert_abs_diff_eq!(value, 0.2, epsilon = 1e-4);
    }

    #[test]
    fn bass_is_mean_of_lowest_four_bands() {
        let mut tracker = EnergyTracker::new();
        let mut frame = vec![0.0f32; 16];
        frame[..4].copy_from_slice(&[1.0, 1.0, 0.0, 0.0]);

        tracker.update(&frame);

        // instant 0.5, first attack step from zero
        assert_abs_diff_eq!(tracker.bass_energy(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn short_frame_has_no_bass() {
        let mut tracker = EnergyTracker::new();
        tracker.update(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(tracker.bass_energy(), 0.0);
    }

    #[test]
    fn treble_is_mean_of_top_quarter() {
        let mut tracker = EnergyTracker::new();
        let mut frame = vec![0.0f32; 8];
        frame[6] = 1.0;
        frame[7] = 1.0;

        tracker.update(&frame);

        assert_abs_diff_eq!(tracker.high_energy(), 0.6, epsilon = 1e-6);
        assert_eq!(tracker.bass_energy(), 0.0);
    }

    #[test]
    fn single_band_frame_counts_as_treble() {
        let mut tracker = EnergyTracker::new();
        tracker.update(&[1.0]);
        assert_abs_diff_eq!(tracker.high_energy(), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn nan_bands_do_not_poison_envelopes() {
        let mut tracker = EnergyTracker::new();
        tracker.update(&[f32::NAN; 8]);
        assert_eq!(tracker.bass_energy(), 0.0);
        assert_eq!(tracker.high_energy(), 0.0);

        tracker.update(&[f32::INFINITY; 8]);
        assert_eq!(tracker.bass_energy(), 0.0);
        assert_eq!(tracker.high_energy(), 0.0);
    }

    #[test]
    fn spectrum_blends_and_echo_lags_one_hop() {
        let mut tracker = EnergyTracker::new();
        tracker.update(&[1.0; 4]);
        assert_abs_diff_eq!(tracker.spectrum()[0], 0.15, epsilon = 1e-6);
        assert_eq!(tracker.echo(), &[0.0; 4]);

        tracker.update(&[1.0; 4]);
        assert_abs_diff_eq!(tracker.spectrum()[0], 0.2775, epsilon = 1e-6);
        assert_abs_diff_eq!(tracker.echo()[0], 0.15, epsilon = 1e-6);
    }

    #[test]
    fn length_change_restarts_spectrum() {
        let mut tracker = EnergyTracker::new();
        tracker.update(&[1.0; 4]);
        tracker.update(&[1.0; 6]);

        assert_eq!(tracker.spectrum().len(), 6);
        assert_eq!(tracker.echo(), &[0.0; 6]);
        assert_abs_diff_eq!(tracker.spectrum()[5], 0.15, epsilon = 1e-6);
    }
}
