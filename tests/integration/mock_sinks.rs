//! Recording adapters and fixtures shared by the integration tests.

use biosense::adapters::time::ManualClock;
use biosense::app::events::DeviceEvent;
use biosense::app::ports::EventSink;
use biosense::app::service::DeviceService;
use biosense::config::SystemConfig;
use biosense::safety::SafetyEvent;

pub const OVERRIDE_KEY: &str = "bench-override-7";

/// Collects every emitted event.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<DeviceEvent>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn safety_events(&self) -> Vec<&SafetyEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Safety(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn mode_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::ModeChanged(_)))
            .count()
    }

    pub fn emergency_stops(&self) -> usize {
        self.safety_events()
            .iter()
            .filter(|e| e.is_emergency_stop())
            .count()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &DeviceEvent) {
        self.events.push(event.clone());
    }
}

/// Bench configuration: override key set, no real settle delays.
pub fn bench_config() -> SystemConfig {
    SystemConfig {
        override_key: Some(OVERRIDE_KEY.into()),
        simulate_latency: false,
        ..SystemConfig::default()
    }
}

#[allow(dead_code)]
pub fn bench_service() -> (DeviceService<ManualClock>, ManualClock) {
    let clock = ManualClock::new(0).with_epoch(1_700_000_000_000);
    (DeviceService::new(&bench_config(), clock.clone()), clock)
}
