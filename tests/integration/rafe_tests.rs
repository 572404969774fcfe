//! RafeController on its own: presets, analytes, the mode lock.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use biosense::adapters::time::ManualClock;
use biosense::config::SystemConfig;
use biosense::error::Error;
use biosense::rafe::{
    AnalyteCategory, RafeController, RafeMode, RafeState, SwitchId, SwitchState,
};
use futures_lite::future::block_on;

use super::mock_sinks::bench_config;

fn controller() -> (RafeController<ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    (RafeController::new(&bench_config(), clock.clone()), clock)
}

#[test]
fn radon_from_idle_closes_the_high_z_path() {
    let (mut c, _) = controller();
    let sel = block_on(c.select_target_analyte("Radon"));

    assert_eq!(sel.mode, RafeMode::GasHighZ);
    assert_eq!(sel.analyte.as_deref(), Some("Radon"));

    let event = sel.event.expect("mode change");
    assert_eq!(event.previous_mode, RafeMode::Idle);
    let rendered: Vec<String> = event.switch_changes.iter().map(ToString::to_string).collect();
    assert!(rendered.contains(&"SW5_HIGH_Z_MODE: OPEN→CLOSED".to_string()));

    let s = c.state();
    assert_eq!(s.category, AnalyteCategory::Environmental);
    assert_eq!(s.switch_matrix.get(SwitchId::HighZMode), SwitchState::Closed);
    assert_eq!(s.selected_analyte.as_deref(), Some("Radon"));
}

#[test]
fn idle_to_gas_diff_is_exactly_the_gas_switches() {
    let (mut c, _) = controller();
    let event = block_on(c.set_mode(RafeMode::GasHighZ)).unwrap();
    let switches: Vec<SwitchId> = event.switch_changes.iter().map(|ch| ch.switch).collect();
    assert_eq!(
        switches,
        [SwitchId::TiaEnable, SwitchId::HighZMode, SwitchId::GuardRing]
    );
    assert!(event.switch_changes.iter().all(|ch| ch.from == SwitchState::Open));
    assert_eq!(event.transition_time_ms, 25);
}

#[test]
fn analyte_lookup_ignores_case() {
    for spelling in ["glucose", "GLUCOSE", "Glucose", "  gLuCoSe "] {
        let (mut c, _) = controller();
        let sel = block_on(c.select_target_analyte(spelling));
        assert_eq!(sel.mode, RafeMode::LiquidEc, "{spelling:?}");
        assert_eq!(sel.analyte.as_deref(), Some("Glucose"));
    }
}

#[test]
fn unknown_analyte_goes_to_idle() {
    let (mut c, _) = controller();
    block_on(c.set_mode(RafeMode::BioImpedance));
    let sel = block_on(c.select_target_analyte("unobtainium"));
    assert_eq!(sel.mode, RafeMode::Idle);
    assert_eq!(sel.analyte.as_deref(), Some("unobtainium"));
}

#[test]
fn repeated_mode_still_logs_a_transition() {
    let (mut c, _) = controller();
    block_on(c.set_mode(RafeMode::BioImpedance));
    for _ in 0..3 {
        let ev = block_on(c.set_mode(RafeMode::BioImpedance)).unwrap();
        assert!(ev.switch_changes.is_empty());
        assert_eq!(ev.transition_time_ms, 10);
    }
    assert_eq!(c.mode_events().len(), 4);
}

#[test]
fn locked_mode_change_leaves_state_identical() {
    let (mut c, _) = controller();
    block_on(c.set_mode(RafeMode::LiquidEc));
    c.lock_mode("qc-run", "reference measurement").unwrap();

    let before = c.state();
    let events_before = c.mode_events();
    assert!(block_on(c.set_mode(RafeMode::GasHighZ)).is_none());
    let sel = block_on(c.select_target_analyte("virus"));

    assert_eq!(sel.mode, RafeMode::LiquidEc);
    assert_eq!(c.state(), before);
    assert_eq!(c.mode_events(), events_before);
}

#[test]
fn mode_lock_belongs_to_its_owner() {
    let (mut c, _) = controller();
    c.lock_mode("qc-run", "reference").unwrap();
    assert_eq!(
        c.lock_mode("intruder", "mine now"),
        Err(Error::ModeLockHeld {
            owner: "qc-run".into()
        })
    );
    assert!(!c.unlock_mode("intruder"));
    assert!(c.is_mode_locked());

    assert!(c.unlock_mode("qc-run"));
    assert!(!c.is_mode_locked());
    assert!(block_on(c.set_mode(RafeMode::LiquidEc)).is_some());
}

#[test]
fn mode_lock_lease_lapses() {
    let config = SystemConfig {
        mode_lock_lease_ms: Some(5_000),
        ..bench_config()
    };
    let clock = ManualClock::new(0);
    let mut c = RafeController::new(&config, clock.clone());

    c.lock_mode("qc-run", "reference").unwrap();
    clock.advance(4_999);
    assert!(c.mode_lock_status().locked);
    clock.advance(2);
    assert!(!c.mode_lock_status().locked);
    assert!(block_on(c.set_mode(RafeMode::GasHighZ)).is_some());
}

#[test]
fn calibration_needs_an_active_mode() {
    let (mut c, clock) = controller();
    assert_eq!(block_on(c.run_calibration()), Err(Error::CalibrationUnavailable));

    block_on(c.set_mode(RafeMode::LiquidEc));
    clock.advance(1_234);
    let report = block_on(c.run_calibration()).unwrap();
    assert_eq!(report.mode, RafeMode::LiquidEc);
    assert_eq!(c.state().last_calibration_ms, Some(1_234));
}

#[test]
fn subscribers_see_every_committed_state() {
    let (mut c, _) = controller();
    let seen: Rc<RefCell<Vec<RafeMode>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let id = c.subscribe(move |s: &RafeState| sink.borrow_mut().push(s.mode));

    block_on(c.set_mode(RafeMode::LiquidEc));
    block_on(c.set_mode(RafeMode::GasHighZ));
    assert!(c.unsubscribe(id));
    block_on(c.set_mode(RafeMode::Idle));

    assert_eq!(*seen.borrow(), [RafeMode::LiquidEc, RafeMode::GasHighZ]);
}

#[test]
fn simulated_latency_actually_waits() {
    let config = SystemConfig {
        simulate_latency: true,
        ..SystemConfig::default()
    };
    let mut c = RafeController::new(&config, ManualClock::new(0));
    let started = Instant::now();
    let ev = block_on(c.set_mode(RafeMode::BioImpedance)).unwrap();
    assert_eq!(ev.transition_time_ms, 30);
    assert!(started.elapsed().as_millis() >= 30);
}
