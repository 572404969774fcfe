//! SafetyGuard scenarios driven through a manual clock.

use super::mock_sinks::{OVERRIDE_KEY, bench_config};

use biosense::adapters::audit::MemoryAuditSink;
use biosense::adapters::time::ManualClock;
use biosense::config::SystemConfig;
use biosense::safety::{
    AiPrediction, CheckKind, EventOrigin, ExecuteOptions, ExecutionOutcome, HardwareCommand,
    SafetyGuard, SafetyLevel, TelemetrySample, WatchdogStatus,
};

fn guard() -> (SafetyGuard<ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    (SafetyGuard::new(&bench_config(), clock.clone()), clock)
}

fn telemetry(guard: &mut SafetyGuard<ManualClock>, sample: TelemetrySample) {
    guard.update_telemetry(sample).unwrap();
}

fn run(guard: &mut SafetyGuard<ManualClock>, cmd: HardwareCommand) -> ExecutionOutcome {
    guard.execute_hardware_command(cmd, &ExecuteOptions::default())
}

// ── Critical path ─────────────────────────────────────────────

#[test]
fn high_voltage_on_skin_stops_and_locks() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            skin_contact: Some(true),
            ..Default::default()
        },
    );

    let out = run(&mut g, HardwareCommand::EhdHighVoltage);
    assert!(!out.success);
    assert_eq!(out.result.level, SafetyLevel::Critical);
    assert_eq!(out.result.check, Some(CheckKind::SkinContact));
    assert!(out.result.emergency_stop);

    assert!(g.is_locked());
    assert_eq!(g.device_state().current_voltage_v, 0.0);

    // Denial first, then the stop it caused.
    let log = g.event_log(None);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].command(), Some(HardwareCommand::EhdHighVoltage));
    assert!(log[1].is_emergency_stop());
    assert!(log[0].id < log[1].id);
}

#[test]
fn locked_system_refuses_everything_but_emergency_stop() {
    let (mut g, _) = guard();
    run(&mut g, HardwareCommand::EmergencyStop);
    assert!(g.is_locked());
    assert_eq!(g.lock_reason(), Some("REQUESTED"));

    for cmd in [
        HardwareCommand::MotorStop,
        HardwareCommand::EhdOff,
        HardwareCommand::ChargingStart,
    ] {
        let out = run(&mut g, cmd);
        assert!(!out.success, "{cmd} went through a locked system");
        assert_eq!(out.result.check, Some(CheckKind::SystemLock));
        assert_eq!(out.result.level, SafetyLevel::Critical);
        assert!(!out.result.emergency_stop);
    }

    let stop = run(&mut g, HardwareCommand::EmergencyStop);
    assert!(stop.success);
    assert!(stop.result.emergency_stop);
}

#[test]
fn most_severe_denial_is_reported_and_the_rest_suppressed() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            skin_contact: Some(true),
            battery_level_percent: Some(3.0),
            ..Default::default()
        },
    );

    let out = run(&mut g, HardwareCommand::EhdHighVoltage);
    assert_eq!(out.result.level, SafetyLevel::Critical);
    assert_eq!(out.result.check, Some(CheckKind::SkinContact));

    let denial = &g.event_log(None)[0];
    assert!(
        denial
            .suppressed
            .iter()
            .any(|r| r.check == Some(CheckKind::BatteryLevel) && r.level == SafetyLevel::Danger)
    );
}

// ── Charging ──────────────────────────────────────────────────

#[test]
fn charging_refused_on_a_hot_battery() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            battery_temp_c: Some(46.0),
            ..Default::default()
        },
    );

    let out = run(&mut g, HardwareCommand::ChargingStart);
    assert!(!out.success);
    assert_eq!(out.result.level, SafetyLevel::Danger);
    assert_eq!(out.result.check, Some(CheckKind::BatteryTemperature));
    assert!(!g.device_state().is_charging);
    assert!(!g.is_locked());
}

#[test]
fn overheating_battery_stops_an_active_charge() {
    let (mut g, _) = guard();
    assert!(run(&mut g, HardwareCommand::ChargingStart).success);
    assert!(g.device_state().is_charging);

    telemetry(
        &mut g,
        TelemetrySample {
            battery_temp_c: Some(47.5),
            ..Default::default()
        },
    );

    assert!(!g.device_state().is_charging);
    let last = g.event_log(Some(1)).pop().unwrap();
    assert_eq!(last.origin, EventOrigin::Telemetry);
    assert_eq!(last.result.level, SafetyLevel::Danger);
}

#[test]
fn emergency_stop_also_stops_charging() {
    let (mut g, _) = guard();
    run(&mut g, HardwareCommand::ChargingStart);
    run(&mut g, HardwareCommand::MotorStart);
    run(&mut g, HardwareCommand::EmergencyStop);

    let s = g.device_state();
    assert!(!s.is_charging);
    assert!(!s.motor_running);
}

// ── Force override ────────────────────────────────────────────

#[test]
fn admin_can_force_a_warning_denial() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            battery_level_percent: Some(15.0),
            ..Default::default()
        },
    );
    assert!(!run(&mut g, HardwareCommand::MotorStart).success);

    let out = g.execute_hardware_command(
        HardwareCommand::MotorStart,
        &ExecuteOptions::forced_by("admin-7"),
    );
    assert!(out.success);
    assert!(out.result.allowed);
    assert!(out.result.reason.starts_with("FORCE OVERRIDE: "));
    assert!(g.device_state().motor_running);

    let last = g.event_log(Some(1)).pop().unwrap();
    assert_eq!(last.forced_by.as_deref(), Some("admin-7"));
}

#[test]
fn force_without_admin_is_ignored() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            battery_level_percent: Some(15.0),
            ..Default::default()
        },
    );
    let opts = ExecuteOptions {
        force: true,
        admin_id: None,
    };
    assert!(!g.execute_hardware_command(HardwareCommand::MotorStart, &opts).success);
}

#[test]
fn force_never_overrides_a_critical_denial() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            skin_contact: Some(true),
            ..Default::default()
        },
    );
    let out = g.execute_hardware_command(
        HardwareCommand::EhdHighVoltage,
        &ExecuteOptions::forced_by("admin-7"),
    );
    assert!(!out.success);
    assert!(g.is_locked());
    assert_eq!(g.device_state().current_voltage_v, 0.0);
}

// ── Continuous operation ──────────────────────────────────────

#[test]
fn high_voltage_duty_limit_kicks_in_after_thirty_seconds() {
    let (mut g, clock) = guard();
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    for _ in 0..30 {
        clock.advance(1_000);
        assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    }

    clock.advance(1_000);
    let out = run(&mut g, HardwareCommand::EhdHighVoltage);
    assert!(!out.success);
    assert_eq!(out.result.level, SafetyLevel::Warning);
    assert_eq!(out.result.check, Some(CheckKind::ContinuousOperation));
    assert!(!g.is_locked());
}

#[test]
fn reissuing_high_voltage_does_not_restart_the_run() {
    let (mut g, clock) = guard();
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    for _ in 0..120 {
        clock.advance(1_000);
        g.send_heartbeat();
    }

    let out = run(&mut g, HardwareCommand::EhdHighVoltage);
    assert!(!out.success);
    assert_eq!(out.result.level, SafetyLevel::Warning);
    assert_eq!(out.result.check, Some(CheckKind::ContinuousOperation));
}

#[test]
fn switching_off_ends_the_run() {
    let (mut g, clock) = guard();
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    clock.advance(25_000);
    assert!(run(&mut g, HardwareCommand::EhdOff).success);
    clock.advance(1_000);
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    clock.advance(25_000);
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
}

#[test]
fn latched_high_voltage_is_cut_off_on_the_tick() {
    let (mut g, clock) = guard();
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
    for _ in 0..60 {
        clock.advance(500);
        g.send_heartbeat();
        assert_eq!(g.watchdog_tick(), WatchdogStatus::Healthy);
    }
    // Exactly at the limit the output is still live.
    assert!(g.device_state().current_voltage_v > 1_000.0);

    clock.advance(500);
    g.send_heartbeat();
    g.watchdog_tick();
    assert_eq!(g.device_state().current_voltage_v, 0.0);
    assert!(!g.is_locked());
    let last = g.event_log(Some(1)).pop().unwrap();
    assert_eq!(
        last.origin,
        EventOrigin::DutyLimit(HardwareCommand::EhdHighVoltage)
    );
    assert_eq!(last.result.level, SafetyLevel::Warning);

    // After the cut-off a new run may start.
    assert!(run(&mut g, HardwareCommand::EhdHighVoltage).success);
}

#[test]
fn motor_is_stopped_after_a_minute() {
    let (mut g, clock) = guard();
    assert!(run(&mut g, HardwareCommand::MotorStart).success);
    for _ in 0..121 {
        clock.advance(500);
        g.send_heartbeat();
        g.watchdog_tick();
    }
    assert!(!g.device_state().motor_running);
    assert_eq!(
        g.event_log(Some(1)).pop().unwrap().origin,
        EventOrigin::DutyLimit(HardwareCommand::MotorStart)
    );
}

// ── Watchdog ──────────────────────────────────────────────────

#[test]
fn stale_heartbeat_triggers_a_single_emergency_stop() {
    let (mut g, clock) = guard();
    run(&mut g, HardwareCommand::MotorStart);

    clock.advance(1_500);
    assert_eq!(g.watchdog_tick(), WatchdogStatus::Healthy);
    g.send_heartbeat();

    clock.advance(2_001);
    assert_eq!(
        g.watchdog_tick(),
        WatchdogStatus::Tripped {
            silent_for_ms: 2_001
        }
    );
    assert!(g.is_locked());
    assert_eq!(g.lock_reason(), Some("HEARTBEAT_TIMEOUT"));
    assert!(!g.device_state().motor_running);

    clock.advance(500);
    assert_eq!(g.watchdog_tick(), WatchdogStatus::Expired);
    let stops = g
        .event_log(None)
        .iter()
        .filter(|e| e.is_emergency_stop())
        .count();
    assert_eq!(stops, 1);
}

#[test]
fn unlocking_while_the_host_is_silent_stops_again_on_the_next_tick() {
    let (mut g, clock) = guard();
    clock.advance(2_500);
    assert!(matches!(g.watchdog_tick(), WatchdogStatus::Tripped { .. }));
    assert!(g.unlock(OVERRIDE_KEY, "admin-1"));

    clock.advance(10_000);
    assert_eq!(
        g.watchdog_tick(),
        WatchdogStatus::Tripped {
            silent_for_ms: 12_500
        }
    );
    assert!(g.is_locked());
    assert_eq!(g.lock_reason(), Some("HEARTBEAT_TIMEOUT"));
    assert!(!run(&mut g, HardwareCommand::MotorStart).success);
}

#[test]
fn a_second_stop_keeps_the_original_lock_reason() {
    let audit = MemoryAuditSink::new();
    let clock = ManualClock::new(0);
    let mut g = SafetyGuard::new(&bench_config(), clock.clone())
        .with_audit_sink(Box::new(audit.clone()));

    clock.advance(2_500);
    g.watchdog_tick();
    assert_eq!(audit.len(), 1);

    let out = run(&mut g, HardwareCommand::EmergencyStop);
    assert!(out.success);
    assert_eq!(g.lock_reason(), Some("HEARTBEAT_TIMEOUT"));
    assert_eq!(audit.len(), 1);
    let stops = g
        .event_log(None)
        .iter()
        .filter(|e| e.is_emergency_stop())
        .count();
    assert_eq!(stops, 2);
}

#[test]
fn heartbeat_within_the_window_keeps_the_system_running() {
    let (mut g, clock) = guard();
    for _ in 0..10 {
        clock.advance(1_900);
        g.send_heartbeat();
        assert_eq!(g.watchdog_tick(), WatchdogStatus::Healthy);
    }
    assert!(!g.is_locked());
}

// ── Unlock ────────────────────────────────────────────────────

#[test]
fn wrong_password_leaves_the_lock_in_place() {
    let (mut g, _) = guard();
    run(&mut g, HardwareCommand::EmergencyStop);

    let logged = g.event_log(None).len();
    assert!(!g.unlock("guess", "mallory"));
    assert!(g.is_locked());
    assert_eq!(g.event_log(None).len(), logged);

    assert!(g.unlock(OVERRIDE_KEY, "admin-1"));
    assert!(!g.is_locked());
    assert_eq!(g.lock_reason(), None);

    let last = g.event_log(Some(1)).pop().unwrap();
    assert_eq!(
        last.origin,
        EventOrigin::Unlock {
            admin_id: "admin-1".into()
        }
    );
    assert_eq!(last.result.level, SafetyLevel::Warning);
}

#[test]
fn without_an_override_key_the_lock_is_permanent() {
    let config = SystemConfig {
        override_key: None,
        ..bench_config()
    };
    let mut g = SafetyGuard::new(&config, ManualClock::new(0));
    g.emergency_stop(biosense::safety::StopReason::Requested);
    assert!(!g.unlock("", "admin"));
    assert!(!g.unlock(OVERRIDE_KEY, "admin"));
    assert!(g.is_locked());
}

#[test]
fn reinitialize_restores_telemetry_but_keeps_the_lock() {
    let (mut g, _) = guard();
    telemetry(
        &mut g,
        TelemetrySample {
            device_temp_c: Some(55.0),
            ..Default::default()
        },
    );
    run(&mut g, HardwareCommand::MotorStart);
    assert!(g.is_locked());

    g.reinitialize();
    assert_eq!(g.device_state().device_temp_c, 25.0);
    assert!(g.is_locked());
}

// ── Audit ─────────────────────────────────────────────────────

#[test]
fn critical_events_reach_the_audit_chain() {
    let audit = MemoryAuditSink::new();
    let clock = ManualClock::new(0);
    let mut g =
        SafetyGuard::new(&bench_config(), clock).with_audit_sink(Box::new(audit.clone()));

    telemetry(
        &mut g,
        TelemetrySample {
            skin_contact: Some(true),
            ..Default::default()
        },
    );
    run(&mut g, HardwareCommand::EhdHighVoltage);
    g.unlock(OVERRIDE_KEY, "admin-1");

    let actions: Vec<String> = audit.records().into_iter().map(|r| r.action_type).collect();
    assert_eq!(actions, ["CRITICAL_DENIAL", "EMERGENCY_STOP", "SYSTEM_UNLOCK"]);
    assert!(audit.verify_chain());

    let unlock = audit.records().pop().unwrap();
    assert_eq!(unlock.user_id, "admin-1");
    assert_eq!(unlock.new_val.as_deref(), Some("unlocked"));
}

#[test]
fn offline_audit_does_not_change_the_verdict() {
    let audit = MemoryAuditSink::new();
    audit.set_offline(true);
    let mut g = SafetyGuard::new(&bench_config(), ManualClock::new(0))
        .with_audit_sink(Box::new(audit.clone()));

    let out = run(&mut g, HardwareCommand::EmergencyStop);
    assert!(out.success);
    assert!(g.is_locked());
    assert!(audit.is_empty());
}

// ── AI predictions ────────────────────────────────────────────

#[test]
fn predictions_are_gated_on_confidence_and_range() {
    let (g, _) = guard();

    let weak = g.validate_ai_prediction(&AiPrediction {
        value: 5.4,
        confidence: 0.55,
        is_extreme: false,
    });
    assert!(!weak.allowed);
    assert_eq!(weak.level, SafetyLevel::Caution);

    let extreme = g.validate_ai_prediction(&AiPrediction {
        value: 42.0,
        confidence: 0.95,
        is_extreme: true,
    });
    assert!(!extreme.allowed);
    assert!(extreme.human_verification_required);

    let fine = g.validate_ai_prediction(&AiPrediction {
        value: 5.4,
        confidence: 0.9,
        is_extreme: false,
    });
    assert!(fine.allowed);
    // Predictions never touch the log.
    assert!(g.event_log(None).is_empty());
}
