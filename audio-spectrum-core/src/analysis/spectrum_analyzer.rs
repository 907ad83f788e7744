use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Added to the frame maximum before dividing, so a frame that only just
/// clears the noise floor never divides by zero.
const NORMALIZE_EPSILON: f32 = 1e-6;

/// Fractional bin positions for one `output_size`.
#[derive(Debug, Clone)]
struct LogIndexTable {
    output_size: usize,
    positions: Vec<f32>,
}

impl LogIndexTable {
    /// `output_size` points spaced geometrically from bin 1 to `last_bin`.
    fn build(output_size: usize, last_bin: usize) -> Self {
        let last = last_bin.max(1) as f64;
        let positions = match output_size {
            0 => Vec::new(),
            1 => vec![1.0],
            n => {
                let log_span = last.ln();
                let steps = (n - 1) as f64;
                let mut positions: Vec<f32> = (0..n)
                    .map(|k| (log_span * k as f64 / steps).exp() as f32)
                    .collect();
                // pin the endpoints against exp/ln rounding
                positions[0] = 1.0;
                positions[n - 1] = last as f32;
                positions
            }
        };
        Self {
            output_size,
            positions,
        }
    }
}

/// Windowed real FFT with a linear gain ramp and log-band resampling.
///
/// One analyzer is owned by the coordinator thread. The FFT plan, window,
/// and scratch buffers are allocated once; the only per-call allocation is
/// the returned frame.
pub struct SpectrumAnalyzer {
    window_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    log_table: Option<LogIndexTable>,
    table_builds: u64,
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        let num_bins = output.len();

        Self {
            window_size,
            fft,
            window: hann_window(window_size),
            input,
            output,
            scratch,
            magnitudes: vec![0.0; num_bins],
            log_table: None,
            table_builds: 0,
        }
    }

    /// Number of linear bins (`window_size / 2 + 1`).
    pub fn num_bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// How many times the log-index table has been computed.
    pub fn table_builds(&self) -> u64 {
        self.table_builds
    }

    /// Analyze one window and return `output_size` log-spaced magnitudes.
    ///
    /// 1. Hann window.
    /// 2. Real FFT magnitudes (`window_size / 2 + 1` bins).
    /// 3. Bin `i` scaled by `gain_min + (gain_max - gain_min) * i / (num_bins - 1)`.
    /// 4. Linear interpolation at `output_size` geometrically spaced fractional
    ///    bin indices from 1 (DC excluded) to `num_bins - 1`.
    ///
    /// A `buffer` of the wrong length is truncated or zero-padded. Values are
    /// non-negative but not compressed or normalized; see [`normalize_frame`].
    pub fn process(&mut self, buffer: &[f32], output_size: usize, gain_min: f32, gain_max: f32) -> Vec<f32> {
        let copied = buffer.len().min(self.window_size);
        for (i, slot) in self.input.iter_mut().enumerate() {
            let sample = if i < copied { buffer[i] } else { 0.0 };
            *slot = sample * self.window[i];
        }

        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
        {
            log::error!("FFT failed: {}", e);
            return vec![0.0; output_size];
        }

        let num_bins = self.magnitudes.len();
        let ramp_span = (num_bins.saturating_sub(1)).max(1) as f32;
        for (i, (magnitude, bin)) in self.magnitudes.iter_mut().zip(&self.output).enumerate() {
            let gain = gain_min + (gain_max - gain_min) * i as f32 / ramp_span;
            *magnitude = bin.norm() * gain;
        }

        self.ensure_table(output_size);
        let Some(table) = &self.log_table else {
            return vec![0.0; output_size];
        };
        table
            .positions
            .iter()
            .map(|&position| interpolate(&self.magnitudes, position))
            .collect()
    }

    fn ensure_table(&mut self, output_size: usize) {
        let stale = self
            .log_table
            .as_ref()
            .is_none_or(|table| table.output_size != output_size);
        if stale {
            let last_bin = self.magnitudes.len().saturating_sub(1);
            self.log_table = Some(LogIndexTable::build(output_size, last_bin));
            self.table_builds += 1;
            log::debug!("Rebuilt log-band table for {} bands", output_size);
        }
    }
}

/// Symmetric Hann window: `0.5 - 0.5 cos(2πn / (M - 1))`.
pub fn hann_window(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / denom).cos())
        .collect()
}

/// Sample `values` at a fractional index, clamping past either end.
fn interpolate(values: &[f32], position: f32) -> f32 {
    let Some(&last) = values.last() else {
        return 0.0;
    };
    if position <= 0.0 {
        return values[0];
    }
    let lower = position.floor() as usize;
    if lower + 1 >= values.len() {
        return last;
    }
    let fraction = position - lower as f32;
    values[lower] + (values[lower + 1] - values[lower]) * fraction
}

/// `log1p` compression followed by peak normalization, in place.
///
/// If the compressed maximum is below `noise_floor` the whole frame becomes
/// zero; otherwise every value is divided by `max + 1e-6`. Non-finite values
/// count as silence.
pub fn normalize_frame(frame: &mut [f32], noise_floor: f32) {
    for value in frame.iter_mut() {
        let compressed = value.ln_1p();
        *value = if compressed.is_finite() { compressed } else { 0.0 };
    }

    let max = frame.iter().copied().fold(0.0f32, f32::max);
    if max < noise_floor {
        frame.fill(0.0);
        return;
    }

    let scale = 1.0 / (max + NORMALIZE_EPSILON);
    for value in frame.iter_mut() {
        *value *= scale;
    }
}
