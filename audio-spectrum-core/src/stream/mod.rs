pub mod blocking;
pub mod callback;

use crate::models::audio_models::{AudioDevice, BackendKind};
use crate::models::config::SpectrumConfig;
use crate::models::error::CaptureError;
use crate::processing::hop_queue::QueueStats;
use crate::traits::callback_host::CallbackHost;
use crate::traits::loopback_host::LoopbackHost;

pub use blocking::BlockingCaptureStream;
pub use callback::CallbackCaptureStream;

/// One open device, whichever backend serves it.
///
/// The set of backends is closed, so this is an enum rather than a trait
/// object; the coordinator dispatches on it once per hop.
pub enum CaptureStream<C: CallbackHost, L: LoopbackHost> {
    Callback(CallbackCaptureStream<C::Stream>),
    Blocking(BlockingCaptureStream<L::Recorder>),
}

impl<C: CallbackHost, L: LoopbackHost> CaptureStream<C, L> {
    /// Open `device` on the backend its `backend_kind` names.
    pub fn open(
        device: &AudioDevice,
        callback_host: &C,
        loopback_host: &L,
        config: &SpectrumConfig,
    ) -> Result<Self, CaptureError> {
        match device.backend_kind() {
            BackendKind::Callback => {
                CallbackCaptureStream::open(callback_host, device, config).map(Self::Callback)
            }
            BackendKind::Blocking => {
                BlockingCaptureStream::open(loopback_host, device, config).map(Self::Blocking)
            }
        }
    }

    /// Exactly one hop of mono samples.
    ///
    /// Callback streams substitute silence on timeout and never fail; blocking
    /// streams surface backend read errors.
    pub fn read_hop(&mut self) -> Result<Vec<f32>, CaptureError> {
        match self {
            Self::Callback(stream) => Ok(stream.read_hop()),
            Self::Blocking(stream) => stream.read_hop(),
        }
    }

    pub fn close(&mut self) {
        match self {
            Self::Callback(stream) => stream.close(),
            Self::Blocking(stream) => stream.close(),
        }
    }

    pub fn device(&self) -> &AudioDevice {
        match self {
            Self::Callback(stream) => stream.device(),
            Self::Blocking(stream) => stream.device(),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Self::Callback(stream) => stream.is_open(),
            Self::Blocking(stream) => stream.is_open(),
        }
    }

    /// Queue counters; blocking streams have no queue and report zeros.
    pub fn stats(&self) -> QueueStats {
        match self {
            Self::Callback(stream) => stream.stats(),
            Self::Blocking(_) => QueueStats::default(),
        }
    }
}
