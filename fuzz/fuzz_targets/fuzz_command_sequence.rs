//! Fuzz target: DeviceService command streams
//!
//! Decodes the input as a stream of one-byte opcodes (plus operands) and
//! drives a `DeviceService` with them, checking after every step:
//! - No panics under arbitrary byte inputs
//! - A locked system stays de-energised
//! - The RAFE switch matrix always equals the preset of the current mode
//!
//! cargo fuzz run fuzz_command_sequence

#![no_main]

use biosense::adapters::time::ManualClock;
use biosense::app::events::DeviceEvent;
use biosense::app::ports::EventSink;
use biosense::app::service::DeviceService;
use biosense::config::SystemConfig;
use biosense::rafe::RafeMode;
use biosense::safety::{ExecuteOptions, HardwareCommand, TelemetrySample};
use futures_lite::future::block_on;
use libfuzzer_sys::fuzz_target;

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &DeviceEvent) {}
}

const ANALYTES: [&str; 6] = ["glucose", "RADON", "Virus", "co2", "biofilm", "unknown"];

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig {
        override_key: Some("fuzz".into()),
        simulate_latency: false,
        ..SystemConfig::default()
    };
    let clock = ManualClock::new(0);
    let mut svc = DeviceService::new(&config, clock.clone());
    let mut sink = Discard;

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        let arg = bytes.next().unwrap_or(0);
        match op % 8 {
            0 => {
                let cmd = HardwareCommand::ALL[arg as usize % HardwareCommand::ALL.len()];
                let opts = if arg & 0x80 != 0 {
                    ExecuteOptions::forced_by("fuzz-admin")
                } else {
                    ExecuteOptions::default()
                };
                svc.execute(cmd, &opts, &mut sink);
            }
            1 => {
                let sample = TelemetrySample {
                    skin_contact: Some(arg & 1 != 0),
                    battery_temp_c: Some(f64::from(arg) / 4.0 - 10.0),
                    battery_level_percent: Some(f64::from(arg) / 2.55),
                    device_temp_c: Some(f64::from(arg) / 4.0),
                    ..Default::default()
                };
                let _ = svc.update_telemetry(sample, &mut sink);
            }
            2 => {
                let mode = RafeMode::ALL[arg as usize % RafeMode::ALL.len()];
                let _ = block_on(svc.set_mode(mode, &mut sink));
            }
            3 => {
                let name = ANALYTES[arg as usize % ANALYTES.len()];
                let _ = block_on(svc.select_target_analyte(name, &mut sink));
            }
            4 => clock.advance(u64::from(arg) * 20),
            5 => {
                svc.watchdog_tick(&mut sink);
            }
            6 => svc.heartbeat(),
            _ => {
                let password = if arg & 1 == 0 { "fuzz" } else { "wrong" };
                svc.unlock(password, "fuzz-admin", &mut sink);
            }
        }

        let snap = svc.snapshot();
        if snap.system_lock.locked {
            assert_eq!(snap.device.current_voltage_v, 0.0);
        }
        assert_eq!(snap.rafe.switch_matrix, snap.rafe.mode.preset().switch_matrix());
    }
});
