//! Print bass/treble energy for every available device for a few seconds.
//!
//! ```text
//! RUST_LOG=debug cargo run -p audio-spectrum-host --example monitor [seconds] [config.json]
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_spectrum_core::{AudioDevice, CaptureDelegate, CaptureError, CoordinatorState, SpectrumConfig};

struct LogDelegate;

impl CaptureDelegate for LogDelegate {
    fn on_state_changed(&self, state: &CoordinatorState) {
        log::info!("state: {:?}", state);
    }

    fn on_device_error(&self, device: &AudioDevice, error: &CaptureError) {
        log::warn!("{}: {}", device, error);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(5);
    let config = match args.next() {
        Some(path) => SpectrumConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SpectrumConfig::default(),
    };

    let mut coordinator = audio_spectrum_host::default_coordinator(config)?;
    coordinator.set_delegate(Arc::new(LogDelegate));

    let devices = coordinator.enumerate_devices();
    for device in &devices {
        println!("{}", device);
    }
    if devices.is_empty() {
        println!("no capture devices found");
        return Ok(());
    }

    coordinator.select_devices(devices);
    coordinator.start()?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(250));
        let snapshot = coordinator.snapshot();
        println!(
            "hop {:>6}  streams {}  bass {:.3}  treble {:.3}",
            snapshot.hop,
            coordinator.state().active_streams().unwrap_or(0),
            snapshot.bass_energy,
            snapshot.high_energy
        );
    }

    coordinator.stop();
    println!("{:?}", coordinator.diagnostics());
    Ok(())
}
