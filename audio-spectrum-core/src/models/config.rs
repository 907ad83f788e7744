use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::audio_models::StreamParams;
use super::error::CaptureError;

/// Slider range the gain controls are clamped to.
pub const GAIN_LIMIT: f32 = 5.0;

/// Static configuration for a coordinator.
///
/// Window and hop size are fixed for the lifetime of a coordinator; only the
/// values in [`AnalysisParams`] may change while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Target sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// Samples analyzed per FFT (default: 1024).
    pub window_size: usize,

    /// New samples consumed per iteration (default: 512, 50% overlap).
    pub hop_size: usize,

    /// Initial number of log-spaced spectrum bands (default: 1024).
    pub output_size: usize,

    /// Gain applied to the lowest linear bin (default: 0.3).
    pub gain_min: f32,

    /// Gain applied to the highest linear bin (default: 2.0).
    pub gain_max: f32,

    /// Peak amplitude below which a callback block is zeroed (default: 0.015).
    pub noise_gate_threshold: f32,

    /// Compressed spectrum maximum below which a frame is forced to zero (default: 0.1).
    pub spectrum_noise_floor: f32,

    /// Pending-block count above which stale callback blocks are dropped (default: 4).
    pub queue_high_water: usize,

    /// How long a callback read waits before substituting silence (default: 50).
    pub read_timeout_ms: u64,

    /// Poll interval while idle (default: 100).
    pub idle_poll_ms: u64,

    /// Backoff after no selected device could be opened (default: 500).
    pub empty_backoff_ms: u64,

    /// Callback host API that, when present, hides every other host API.
    pub preferred_host_api: String,

    pub mic_label_prefix: String,

    pub loopback_label_prefix: String,
}

impl SpectrumConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.window_size == 0 || self.hop_size == 0 {
            return Err("window and hop size must be non-zero".into());
        }
        if self.hop_size > self.window_size {
            return Err(format!(
                "hop size {} exceeds window size {}",
                self.hop_size, self.window_size
            ));
        }
        if self.output_size < 2 {
            return Err(format!("output size must be at least 2, got {}", self.output_size));
        }
        if self.gain_min < 0.0 || self.gain_max < 0.0 {
            return Err("gains must be non-negative".into());
        }
        if self.gain_min > self.gain_max {
            return Err(format!(
                "gain_min {} exceeds gain_max {}",
                self.gain_min, self.gain_max
            ));
        }
        if self.queue_high_water == 0 {
            return Err("queue high water must be at least 1".into());
        }
        Ok(())
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid config: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            sample_rate: self.sample_rate,
            hop_size: self.hop_size,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn empty_backoff(&self) -> Duration {
        Duration::from_millis(self.empty_backoff_ms)
    }

    pub fn initial_params(&self) -> AnalysisParams {
        AnalysisParams::new(self.gain_min, self.gain_max, self.output_size)
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            window_size: 1024,
            hop_size: 512,
            output_size: 1024,
            gain_min: 0.3,
            gain_max: 2.0,
            noise_gate_threshold: 0.015,
            spectrum_noise_floor: 0.1,
            queue_high_water: 4,
            read_timeout_ms: 50,
            idle_poll_ms: 100,
            empty_backoff_ms: 500,
            preferred_host_api: "WASAPI".into(),
            mic_label_prefix: "[Mic] ".into(),
            loopback_label_prefix: "[PC] ".into(),
        }
    }
}

/// Parameters the coordinator re-reads once per hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    pub gain_min: f32,
    pub gain_max: f32,
    pub output_size: usize,
}

impl AnalysisParams {
    /// Gains are clamped to `[0, GAIN_LIMIT]`, output size to at least 2.
    pub fn new(gain_min: f32, gain_max: f32, output_size: usize) -> Self {
        Self {
            gain_min: gain_min.clamp(0.0, GAIN_LIMIT),
            gain_max: gain_max.clamp(0.0, GAIN_LIMIT),
            output_size: output_size.max(2),
        }
    }
}

/// Shared, whole-value-replaced handle to the live [`AnalysisParams`].
#[derive(Debug, Clone)]
pub struct ParamsHandle {
    inner: Arc<RwLock<AnalysisParams>>,
}

impl ParamsHandle {
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params)),
        }
    }

    pub fn get(&self) -> AnalysisParams {
        *self.inner.read()
    }

    pub fn set_gain(&self, gain_min: f32, gain_max: f32) {
        let mut params = self.inner.write();
        *params = AnalysisParams::new(gain_min, gain_max, params.output_size);
    }

    pub fn set_output_size(&self, output_size: usize) {
        let mut params = self.inner.write();
        *params = AnalysisParams::new(params.gain_min, params.gain_max, output_size);
    }
}
