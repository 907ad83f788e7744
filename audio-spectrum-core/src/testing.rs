//! In-memory capture backends for driving streams and the coordinator
//! without audio hardware.

use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::{
    AudioDevice, BackendKind, CallbackDeviceInfo, DeviceHandle, HostApiInfo, LoopbackDeviceInfo,
    StreamParams,
};
use crate::models::error::CaptureError;
use crate::traits::callback_host::{AudioBufferCallback, CallbackHost};
use crate::traits::loopback_host::{LoopbackHost, LoopbackRecorder};

/// Test signal a fake device produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Signal {
    Silence,
    Constant(f32),
    Sine { frequency: f32, amplitude: f32 },
}

impl Signal {
    fn fill(&self, out: &mut [f32], phase: &mut u64, sample_rate: u32) {
        for sample in out.iter_mut() {
            *sample = match *self {
                Signal::Silence => 0.0,
                Signal::Constant(value) => value,
                Signal::Sine { frequency, amplitude } => {
                    let t = *phase as f64 / sample_rate as f64;
                    amplitude * (TAU * frequency * t as f32).sin()
                }
            };
            *phase += 1;
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub(crate) fn callback_device(name: &str, host_api: usize, index: usize, channels: u16) -> CallbackDeviceInfo {
    CallbackDeviceInfo {
        name: name.to_string(),
        host_api,
        max_input_channels: channels,
        index,
        handle: DeviceHandle::new(format!("fake-input:{}", index)),
    }
}

pub(crate) fn loopback_endpoint(name: &str, is_loopback: bool) -> LoopbackDeviceInfo {
    LoopbackDeviceInfo {
        name: name.to_string(),
        is_loopback,
        handle: DeviceHandle::new(format!("fake-endpoint:{}", name)),
    }
}

// --- Callback backend ---

#[derive(Default)]
struct CallbackControl {
    callbacks: HashMap<DeviceHandle, AudioBufferCallback>,
    failing: HashSet<DeviceHandle>,
    feeds: HashMap<DeviceHandle, Signal>,
    enumeration_fails: bool,
}

struct CallbackInner {
    apis: Mutex<Vec<HostApiInfo>>,
    devices: Vec<CallbackDeviceInfo>,
    control: Mutex<CallbackControl>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Callback backend whose audio thread is either the test itself
/// ([`deliver`](Self::deliver)) or a paced feeder thread ([`feed`](Self::feed)).
#[derive(Clone)]
pub(crate) struct FakeCallbackHost {
    inner: Arc<CallbackInner>,
}

impl FakeCallbackHost {
    pub(crate) fn with_devices(devices: Vec<CallbackDeviceInfo>) -> Self {
        Self {
            inner: Arc::new(CallbackInner {
                apis: Mutex::new(vec![
                    HostApiInfo { index: 0, name: "MME".into() },
                    HostApiInfo { index: 1, name: "Windows WASAPI".into() },
                ]),
                devices,
                control: Mutex::new(CallbackControl::default()),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::with_devices(Vec::new())
    }

    pub(crate) fn set_host_apis(&self, apis: Vec<HostApiInfo>) {
        *self.inner.apis.lock() = apis;
    }

    /// The device as the catalog would present it.
    pub(crate) fn catalog_device(&self, position: usize) -> AudioDevice {
        let info = &self.inner.devices[position];
        AudioDevice::new(
            format!("[Mic] {}", info.name),
            BackendKind::Callback,
            false,
            info.handle.clone(),
            Some(info.index),
        )
    }

    /// Invoke the device's callback as the backend thread would.
    pub(crate) fn deliver(&self, device: &AudioDevice, samples: &[f32], sample_rate: f64, channels: u16) {
        let callback = self
            .inner
            .control
            .lock()
            .callbacks
            .get(device.native_handle())
            .cloned();
        if let Some(callback) = callback {
            callback(samples, sample_rate, channels);
        }
    }

    /// Streams opened on `device` from now on get a feeder thread that
    /// delivers one hop of `signal` per hop period.
    pub(crate) fn feed(&self, device: &AudioDevice, signal: Signal) {
        self.inner
            .control
            .lock()
            .feeds
            .insert(device.native_handle().clone(), signal);
    }

    pub(crate) fn fail_open(&self, device: &AudioDevice) {
        self.inner
            .control
            .lock()
            .failing
            .insert(device.native_handle().clone());
    }

    pub(crate) fn fail_enumeration(&self) {
        self.inner.control.lock().enumeration_fails = true;
    }

    pub(crate) fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn live_streams(&self) -> usize {
        self.opened() - self.closed()
    }
}

/// Stream handle; dropping it stops the feeder and unregisters the callback.
pub(crate) struct FakeCallbackStream {
    inner: Arc<CallbackInner>,
    handle: DeviceHandle,
    alive: Arc<AtomicBool>,
    feeder: Option<thread::JoinHandle<()>>,
}

impl Drop for FakeCallbackStream {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
        self.inner.control.lock().callbacks.remove(&self.handle);
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl CallbackHost for FakeCallbackHost {
    type Stream = FakeCallbackStream;

    fn name(&self) -> &str {
        "fake-callback"
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo>, CaptureError> {
        if self.inner.control.lock().enumeration_fails {
            return Err(CaptureError::enumeration(self.name(), "backend offline"));
        }
        Ok(self.inner.apis.lock().clone())
    }

    fn input_devices(&self) -> Result<Vec<CallbackDeviceInfo>, CaptureError> {
        if self.inner.control.lock().enumeration_fails {
            return Err(CaptureError::enumeration(self.name(), "backend offline"));
        }
        Ok(self.inner.devices.clone())
    }

    fn open_stream(
        &self,
        device: &AudioDevice,
        params: &StreamParams,
        callback: AudioBufferCallback,
    ) -> Result<Self::Stream, CaptureError> {
        let handle = device.native_handle().clone();
        let feed = {
            let mut control = self.inner.control.lock();
            if control.failing.contains(&handle) {
                return Err(CaptureError::open(device.display_name(), "device busy"));
            }
            control.callbacks.insert(handle.clone(), Arc::clone(&callback));
            control.feeds.get(&handle).copied()
        };
        self.inner.opened.fetch_add(1, Ordering::SeqCst);

        let alive = Arc::new(AtomicBool::new(true));
        let feeder = feed.map(|signal| {
            let alive = Arc::clone(&alive);
            let params = *params;
            thread::spawn(move || {
                let mut phase = 0u64;
                let mut block = vec![0.0f32; params.hop_size];
                while alive.load(Ordering::SeqCst) {
                    signal.fill(&mut block, &mut phase, params.sample_rate);
                    callback(&block, params.sample_rate as f64, 1);
                    thread::sleep(params.hop_duration());
                }
            })
        });

        Ok(FakeCallbackStream {
            inner: Arc::clone(&self.inner),
            handle,
            alive,
            feeder,
        })
    }
}

// --- Loopback backend ---

#[derive(Default)]
struct LoopbackControl {
    signals: HashMap<DeviceHandle, Signal>,
    failing_open: HashSet<DeviceHandle>,
    fail_after: HashMap<DeviceHandle, usize>,
    short: HashMap<DeviceHandle, usize>,
    enumeration_fails: bool,
}

struct LoopbackInner {
    endpoints: Mutex<Vec<LoopbackDeviceInfo>>,
    control: Mutex<LoopbackControl>,
    opened: AtomicUsize,
    released: AtomicUsize,
    reads: AtomicUsize,
}

/// Blocking backend whose recorders synthesise a signal and sleep for the
/// wall-clock length of each read.
#[derive(Clone)]
pub(crate) struct FakeLoopbackHost {
    inner: Arc<LoopbackInner>,
}

impl FakeLoopbackHost {
    pub(crate) fn with_endpoints(endpoints: Vec<LoopbackDeviceInfo>) -> Self {
        Self {
            inner: Arc::new(LoopbackInner {
                endpoints: Mutex::new(endpoints),
                control: Mutex::new(LoopbackControl::default()),
                opened: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::with_endpoints(Vec::new())
    }

    pub(crate) fn catalog_device(&self, position: usize) -> AudioDevice {
        let info = self.inner.endpoints.lock()[position].clone();
        AudioDevice::new(
            format!("[PC] {}", info.name),
            BackendKind::Blocking,
            info.is_loopback,
            info.handle,
            None,
        )
    }

    pub(crate) fn set_signal(&self, device: &AudioDevice, signal: Signal) {
        self.inner
            .control
            .lock()
            .signals
            .insert(device.native_handle().clone(), signal);
    }

    pub(crate) fn fail_open(&self, device: &AudioDevice) {
        self.inner
            .control
            .lock()
            .failing_open
            .insert(device.native_handle().clone());
    }

    /// Recorders opened on `device` fail every read after the first `reads`.
    pub(crate) fn fail_reads_after(&self, device: &AudioDevice, reads: usize) {
        self.inner
            .control
            .lock()
            .fail_after
            .insert(device.native_handle().clone(), reads);
    }

    /// Recorders opened on `device` return at most `frames` per read.
    pub(crate) fn short_reads(&self, device: &AudioDevice, frames: usize) {
        self.inner
            .control
            .lock()
            .short
            .insert(device.native_handle().clone(), frames);
    }

    pub(crate) fn fail_enumeration(&self) {
        self.inner.control.lock().enumeration_fails = true;
    }

    pub(crate) fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub(crate) fn live_recorders(&self) -> usize {
        self.opened() - self.released()
    }

    pub(crate) fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeRecorder {
    inner: Arc<LoopbackInner>,
    signal: Signal,
    sample_rate: u32,
    phase: u64,
    reads_done: usize,
    fail_after: Option<usize>,
    short: Option<usize>,
}

impl LoopbackRecorder for FakeRecorder {
    fn record(&mut self, frames: usize) -> Result<Vec<f32>, CaptureError> {
        if self.fail_after.is_some_and(|limit| self.reads_done >= limit) {
            return Err(CaptureError::ReadFailed("endpoint invalidated".into()));
        }
        self.reads_done += 1;
        self.inner.reads.fetch_add(1, Ordering::SeqCst);

        thread::sleep(Duration::from_secs_f64(frames as f64 / self.sample_rate as f64));

        let len = self.short.map_or(frames, |short| short.min(frames));
        let mut out = vec![0.0f32; len];
        self.signal.fill(&mut out, &mut self.phase, self.sample_rate);
        Ok(out)
    }
}

impl Drop for FakeRecorder {
    fn drop(&mut self) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl LoopbackHost for FakeLoopbackHost {
    type Recorder = FakeRecorder;

    fn name(&self) -> &str {
        "fake-loopback"
    }

    fn capture_endpoints(&self) -> Result<Vec<LoopbackDeviceInfo>, CaptureError> {
        if self.inner.control.lock().enumeration_fails {
            return Err(CaptureError::enumeration(self.name(), "endpoint enumerator unavailable"));
        }
        Ok(self.inner.endpoints.lock().clone())
    }

    fn open_recorder(&self, device: &AudioDevice, params: &StreamParams) -> Result<Self::Recorder, CaptureError> {
        let handle = device.native_handle();
        let control = self.inner.control.lock();
        if control.failing_open.contains(handle) {
            return Err(CaptureError::open(device.display_name(), "endpoint in exclusive use"));
        }
        self.inner.opened.fetch_add(1, Ordering::SeqCst);

        Ok(FakeRecorder {
            inner: Arc::clone(&self.inner),
            signal: control.signals.get(handle).copied().unwrap_or(Signal::Silence),
            sample_rate: params.sample_rate,
            phase: 0,
            reads_done: 0,
            fail_after: control.fail_after.get(handle).copied(),
            short: control.short.get(handle).copied(),
        })
    }
}
