use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::analysis::pipeline::HopPipeline;
use crate::models::audio_models::{AudioDevice, CoordinatorDiagnostics};
use crate::models::config::{AnalysisParams, ParamsHandle, SpectrumConfig};
use crate::models::error::CaptureError;
use crate::models::snapshot::SpectrumSnapshot;
use crate::models::state::CoordinatorState;
use crate::session::capture_session::CaptureSession;
use crate::session::catalog::DeviceCatalog;
use crate::session::shared::SharedSpectrum;
use crate::traits::callback_host::CallbackHost;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::loopback_host::LoopbackHost;

struct Hosts<C, L> {
    callback: C,
    loopback: L,
}

/// State shared between the public handle and the coordinator thread.
struct Shared {
    running: AtomicBool,
    active: AtomicBool,
    /// Bumped on every device selection; a session ends when it moves.
    generation: AtomicU64,
    selected: RwLock<Vec<AudioDevice>>,
    state: Mutex<CoordinatorState>,
    diagnostics: Mutex<CoordinatorDiagnostics>,
    delegate: RwLock<Option<Arc<dyn CaptureDelegate>>>,
}

impl Shared {
    fn set_state(&self, new_state: CoordinatorState) {
        {
            let mut state = self.state.lock();
            if *state == new_state {
                return;
            }
            *state = new_state;
        }
        log::debug!("Coordinator state: {:?}", new_state);
        if let Some(delegate) = self.delegate.read().as_ref() {
            delegate.on_state_changed(&new_state);
        }
    }

    fn device_error(&self, device: &AudioDevice, error: &CaptureError) {
        if let Some(delegate) = self.delegate.read().as_ref() {
            delegate.on_device_error(device, error);
        }
    }

    fn should_stream(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.active.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Owns the capture lifecycle and the analysis thread.
///
/// Generic over both backends so the whole pipeline runs against fakes in
/// tests and against cpal/WASAPI in production:
///
/// ```text
/// [CallbackCaptureStream]* ─┐
///                           ├→ mean mix → CircularAudioBuffer → SpectrumAnalyzer → EnergyTracker → SharedSpectrum
/// [BlockingCaptureStream]* ─┘
/// ```
///
/// The worker thread cycles `Idle → Initializing → Streaming → Draining → Idle`.
/// It only opens streams while the coordinator is active and at least one
/// device is selected.
pub struct CaptureCoordinator<C: CallbackHost, L: LoopbackHost> {
    hosts: Arc<Hosts<C, L>>,
    config: SpectrumConfig,
    catalog: DeviceCatalog,
    params: ParamsHandle,
    spectrum: SharedSpectrum,
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<C: CallbackHost, L: LoopbackHost> CaptureCoordinator<C, L> {
    pub fn new(callback_host: C, loopback_host: L, config: SpectrumConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        Ok(Self {
            hosts: Arc::new(Hosts {
                callback: callback_host,
                loopback: loopback_host,
            }),
            catalog: DeviceCatalog::new(&config),
            params: ParamsHandle::new(config.initial_params()),
            spectrum: SharedSpectrum::new(SpectrumSnapshot::silent(config.output_size)),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                active: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                selected: RwLock::new(Vec::new()),
                state: Mutex::new(CoordinatorState::Idle),
                diagnostics: Mutex::new(CoordinatorDiagnostics::default()),
                delegate: RwLock::new(None),
            }),
            config,
            worker: None,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.shared.delegate.write() = Some(delegate);
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    // --- Devices ---

    /// Unified microphone + desktop-audio list. Never fails.
    pub fn enumerate_devices(&self) -> Vec<AudioDevice> {
        self.catalog
            .enumerate(&self.hosts.callback, &self.hosts.loopback)
    }

    /// Replace the selection. A running session re-initializes within one hop.
    pub fn select_devices(&self, devices: Vec<AudioDevice>) {
        log::info!(
            "Selected devices: [{}]",
            devices
                .iter()
                .map(|d| d.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        *self.shared.selected.write() = devices;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn selected_devices(&self) -> Vec<AudioDevice> {
        self.shared.selected.read().clone()
    }

    // --- Lifecycle ---

    /// Spawn the coordinator thread. No-op while it is already running.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                return Ok(());
            }
        }
        if let Some(finished) = self.worker.take() {
            if finished.join().is_err() {
                log::error!("Previous coordinator thread panicked");
            }
        }

        self.shared.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            hosts: Arc::clone(&self.hosts),
            config: self.config.clone(),
            params: self.params.clone(),
            spectrum: self.spectrum.clone(),
            shared: Arc::clone(&self.shared),
        };
        let handle = thread::Builder::new()
            .name("spectrum-coordinator".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                CaptureError::Unknown(format!("failed to spawn coordinator thread: {}", e))
            })?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Drain any open session and join the coordinator thread.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Coordinator thread panicked");
            }
        }
        self.shared.set_state(CoordinatorState::Idle);
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Gate capture without stopping the thread. Clearing it ends the current
    /// session within one hop.
    pub fn set_active(&self, active: bool) {
        self.shared.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> CoordinatorState {
        *self.shared.state.lock()
    }

    // --- Published outputs ---

    pub fn snapshot(&self) -> SpectrumSnapshot {
        self.spectrum.snapshot()
    }

    pub fn spectrum(&self) -> Vec<f32> {
        self.spectrum.spectrum()
    }

    pub fn bass_energy(&self) -> f32 {
        self.spectrum.bass_energy()
    }

    pub fn high_energy(&self) -> f32 {
        self.spectrum.high_energy()
    }

    /// Cloneable read handle for a renderer on another thread.
    pub fn spectrum_handle(&self) -> SharedSpectrum {
        self.spectrum.clone()
    }

    pub fn diagnostics(&self) -> CoordinatorDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    // --- Live parameters ---

    pub fn params(&self) -> ParamsHandle {
        self.params.clone()
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        self.params.get()
    }

    pub fn set_gain(&self, gain_min: f32, gain_max: f32) {
        self.params.set_gain(gain_min, gain_max);
    }

    pub fn set_output_size(&self, output_size: usize) {
        self.params.set_output_size(output_size);
    }
}

impl<C: CallbackHost, L: LoopbackHost> Drop for CaptureCoordinator<C, L> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Stopped, deactivated, or the selection changed.
    Deactivated,
    /// Every stream failed a read.
    Exhausted,
}

/// Everything the coordinator thread owns.
struct Worker<C, L> {
    hosts: Arc<Hosts<C, L>>,
    config: SpectrumConfig,
    params: ParamsHandle,
    spectrum: SharedSpectrum,
    shared: Arc<Shared>,
}

impl<C: CallbackHost, L: LoopbackHost> Worker<C, L> {
    fn run(self) {
        log::info!("Spectrum coordinator started");
        let mut pipeline = HopPipeline::new(&self.config);

        while self.shared.running.load(Ordering::SeqCst) {
            let generation = self.shared.generation.load(Ordering::SeqCst);
            let devices = self.shared.selected.read().clone();
            if !self.shared.active.load(Ordering::SeqCst) || devices.is_empty() {
                thread::sleep(self.config.idle_poll());
                continue;
            }

            self.shared.set_state(CoordinatorState::Initializing);
            let (session, excluded) =
                CaptureSession::open(&devices, &self.hosts.callback, &self.hosts.loopback, &self.config);

            if !excluded.is_empty() {
                self.shared.diagnostics.lock().devices_excluded += excluded.len() as u64;
                for (device, error) in &excluded {
                    self.shared.device_error(device, error);
                }
            }

            if session.is_empty() {
                log::warn!("{}; retrying in {:?}", CaptureError::EmptyActiveSet, self.config.empty_backoff());
                drop(session);
                self.shared.set_state(CoordinatorState::Idle);
                self.pause(self.config.empty_backoff());
                continue;
            }

            let end = self.stream(session, &mut pipeline, generation);
            self.shared.set_state(CoordinatorState::Idle);
            if end == SessionEnd::Exhausted {
                log::warn!("No stream left readable; retrying in {:?}", self.config.empty_backoff());
                self.pause(self.config.empty_backoff());
            }
        }

        log::info!("Spectrum coordinator stopped");
    }

    /// Hop loop for one session. The session is closed before returning,
    /// whatever ends the loop.
    fn stream(&self, mut session: CaptureSession<C, L>, pipeline: &mut HopPipeline, generation: u64) -> SessionEnd {
        let base = {
            let mut diagnostics = self.shared.diagnostics.lock();
            diagnostics.sessions_started += 1;
            diagnostics.clone()
        };
        log::info!(
            "Capture session started with {} stream(s): [{}]",
            session.len(),
            session
                .devices()
                .iter()
                .map(|d| d.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.shared.set_state(CoordinatorState::Streaming {
            active_streams: session.live_streams(),
        });

        let mut end = SessionEnd::Deactivated;
        while self.shared.should_stream(generation) {
            let reads = session.read_hop();

            if !reads.failures.is_empty() {
                self.shared.diagnostics.lock().read_failures += reads.failures.len() as u64;
                for (device, error) in &reads.failures {
                    self.shared.device_error(device, error);
                }
                if session.exhausted() {
                    log::warn!("Every stream in the session failed; returning to idle");
                    end = SessionEnd::Exhausted;
                    break;
                }
                self.shared.set_state(CoordinatorState::Streaming {
                    active_streams: session.live_streams(),
                });
            }

            let params = self.params.get();
            let snapshot = pipeline.process_hop(&reads.sources, &params);
            self.spectrum.publish(snapshot);

            let queues = session.queue_stats();
            let mut diagnostics = self.shared.diagnostics.lock();
            diagnostics.hops_processed += 1;
            diagnostics.last_analysis_micros = pipeline.last_analysis().as_micros() as u64;
            diagnostics.read_timeouts = base.read_timeouts + queues.timeouts;
            diagnostics.stale_blocks_dropped = base.stale_blocks_dropped + queues.stale_dropped;
            diagnostics.overflow_blocks_dropped = base.overflow_blocks_dropped + queues.overflow_dropped;
        }

        self.shared.set_state(CoordinatorState::Draining);
        session.close();
        drop(session);
        log::info!("Capture session drained");
        end
    }

    /// Sleep for `duration`, waking early if the coordinator stops.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let step = self.config.idle_poll().max(Duration::from_millis(1));
        while self.shared.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(step.min(deadline - now));
        }
    }
}
