//! DeviceRuntime on real timers.

use std::time::Duration;

use biosense::adapters::time::{ManualClock, SystemClock};
use biosense::app::commands::RuntimeCommand;
use biosense::app::events::DeviceEvent;
use biosense::app::runtime::DeviceRuntime;
use biosense::app::service::DeviceService;
use biosense::config::SystemConfig;
use biosense::error::Error;
use biosense::rafe::RafeMode;
use biosense::safety::HardwareCommand;

use super::mock_sinks::{OVERRIDE_KEY, Recorder, bench_config};

fn runtime_with(
    config: &SystemConfig,
) -> (DeviceRuntime<ManualClock, Recorder>, ManualClock) {
    let clock = ManualClock::new(0);
    let service = DeviceService::new(config, clock.clone());
    (DeviceRuntime::new(service, Recorder::new()), clock)
}

#[test]
fn queued_commands_run_in_order() {
    let config = SystemConfig {
        simulate_latency: true,
        ..bench_config()
    };
    let (rt, _) = runtime_with(&config);
    let handle = rt.handle();

    handle.try_send(RuntimeCommand::SetMode(RafeMode::LiquidEc)).unwrap();
    handle
        .try_send(RuntimeCommand::SelectAnalyte("Virus".into()))
        .unwrap();
    handle.try_send(RuntimeCommand::Calibrate).unwrap();
    rt.run_until_idle();

    let state = rt.with_service(|svc| svc.snapshot().rafe);
    assert_eq!(state.mode, RafeMode::BioImpedance);
    assert_eq!(state.selected_analyte.as_deref(), Some("Virus"));
    assert!(state.is_calibrated);

    let modes: Vec<RafeMode> = rt.with_sink(|rec| {
        rec.events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::ModeChanged(m) => Some(m.new_mode),
                _ => None,
            })
            .collect()
    });
    assert_eq!(modes, [RafeMode::LiquidEc, RafeMode::BioImpedance]);
}

#[test]
fn stopping_mid_settle_finishes_the_command_first() {
    let config = SystemConfig {
        simulate_latency: true,
        ..bench_config()
    };
    let (rt, _) = runtime_with(&config);
    rt.handle()
        .try_send(RuntimeCommand::SetMode(RafeMode::GasHighZ))
        .unwrap();

    // Shorter than the 25 ms Idle -> Gas settle time.
    rt.run_for(Duration::from_millis(5));

    assert!(rt.is_idle());
    let snap = rt.with_service(|svc| svc.snapshot());
    assert_eq!(snap.rafe.mode, RafeMode::GasHighZ);
    assert!(snap.device.current_voltage_v > 1_000.0);

    // Nothing is left in flight, so this returns straight away.
    rt.run_until_idle();
    assert_eq!(rt.with_sink(|rec| rec.mode_changes()), 1);
}

#[test]
fn failed_commands_surface_as_events() {
    let (rt, _) = runtime_with(&bench_config());
    rt.handle().try_send(RuntimeCommand::Calibrate).unwrap();
    rt.run_until_idle();

    let failed = rt.with_sink(|rec| rec.events.last().cloned());
    assert_eq!(
        failed,
        Some(DeviceEvent::CommandFailed {
            command: "calibrate",
            error: Error::CalibrationUnavailable,
        })
    );
}

#[test]
fn stale_heartbeat_locks_the_system_on_the_next_tick() {
    let (rt, clock) = runtime_with(&bench_config());
    rt.handle()
        .try_send(RuntimeCommand::hardware(HardwareCommand::MotorStart))
        .unwrap();
    rt.run_until_idle();
    assert!(rt.with_service(|svc| svc.snapshot().device.motor_running));

    // The host went quiet long ago.
    clock.advance(10_000);
    rt.run_for(Duration::from_millis(650));

    let snap = rt.with_service(|svc| svc.snapshot());
    assert!(snap.system_lock.locked);
    assert_eq!(snap.system_lock.reason.as_deref(), Some("HEARTBEAT_TIMEOUT"));
    assert!(!snap.device.motor_running);
    assert_eq!(rt.with_sink(|rec| rec.emergency_stops()), 1);

    // Unlock through the inbox.
    rt.handle()
        .try_send(RuntimeCommand::Unlock {
            password: OVERRIDE_KEY.into(),
            admin_id: "admin-1".into(),
        })
        .unwrap();
    rt.handle().try_send(RuntimeCommand::Heartbeat).unwrap();
    rt.run_until_idle();
    assert!(!rt.with_service(|svc| svc.safety().is_locked()));
}

#[test]
fn regular_heartbeats_keep_the_device_running() {
    let service = DeviceService::new(&bench_config(), SystemClock::new());
    let rt = DeviceRuntime::new(service, Recorder::new());
    let handle = rt.handle();

    rt.run_until(async move {
        for _ in 0..6 {
            handle.send(RuntimeCommand::Heartbeat).await;
            async_io_mini::Timer::after(Duration::from_millis(200)).await;
        }
    });

    assert!(!rt.with_service(|svc| svc.safety().is_locked()));
    assert_eq!(rt.with_sink(|rec| rec.emergency_stops()), 0);
}
