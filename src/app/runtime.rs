//! Single-threaded async runtime around [`DeviceService`].
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                            │
//!  │  ┌──────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                        │  │
//!  │  │   ├─ watchdog_loop   (every 500 ms)                  │  │
//!  │  │   └─ command_loop    (inbox.receive().await)         │  │
//!  │  └──────────────────────────────────────────────────────┘  │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both tasks share the service through `Rc<RefCell<_>>`.  A borrow is
//! never held across an `.await`: mode changes and calibrations are
//! split into a synchronous begin, an awaited settle time and a
//! synchronous finish.  Readers therefore only see committed state, and
//! the watchdog can tick while a RAFE transition is settling.

use core::cell::{Cell, RefCell};
use core::future::Future;
use core::time::Duration;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, info};

use crate::rafe::{CALIBRATION_TIME_MS, settle};
use crate::safety::limits::WATCHDOG_TICK_MS;

use super::commands::RuntimeCommand;
use super::events::DeviceEvent;
use super::ports::{Clock, EventSink};
use super::service::{AnalyteStep, DeviceService, Gated};

/// Inbox depth for queued commands.
pub const INBOX_DEPTH: usize = 16;

type Inbox = Channel<NoopRawMutex, RuntimeCommand, INBOX_DEPTH>;

struct Core<C: Clock, S: EventSink> {
    service: DeviceService<C>,
    sink: S,
}

type Shared<C, S> = Rc<RefCell<Core<C, S>>>;

/// Cloneable sender side of the runtime inbox.
#[derive(Clone)]
pub struct RuntimeHandle {
    inbox: Rc<Inbox>,
}

impl RuntimeHandle {
    /// Queue without waiting.  Fails when the inbox is full.
    pub fn try_send(&self, cmd: RuntimeCommand) -> Result<(), TrySendError<RuntimeCommand>> {
        self.inbox.try_send(cmd)
    }

    pub async fn send(&self, cmd: RuntimeCommand) {
        self.inbox.send(cmd).await;
    }
}

pub struct DeviceRuntime<C: Clock, S: EventSink> {
    core: Shared<C, S>,
    inbox: Rc<Inbox>,
    /// A command has been taken off the inbox and is still being handled.
    busy: Rc<Cell<bool>>,
}

impl<C: Clock + 'static, S: EventSink + 'static> DeviceRuntime<C, S> {
    pub fn new(service: DeviceService<C>, sink: S) -> Self {
        Self {
            core: Rc::new(RefCell::new(Core { service, sink })),
            inbox: Rc::new(Channel::new()),
            busy: Rc::new(Cell::new(false)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inbox: Rc::clone(&self.inbox),
        }
    }

    /// Borrow the service for a synchronous read or command.
    pub fn with_service<R>(&self, f: impl FnOnce(&mut DeviceService<C>) -> R) -> R {
        f(&mut self.core.borrow_mut().service)
    }

    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.core.borrow_mut().sink)
    }

    /// Drive the watchdog and the inbox until `until` completes.  A
    /// command already taken off the inbox is always finished first.
    pub fn run_until<F: Future>(&self, until: F) -> F::Output {
        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

        executor
            .spawn(watchdog_loop(Rc::clone(&self.core)))
            .detach();
        executor
            .spawn(command_loop(
                Rc::clone(&self.core),
                Rc::clone(&self.inbox),
                Rc::clone(&self.busy),
            ))
            .detach();

        info!("runtime: started (watchdog every {WATCHDOG_TICK_MS} ms)");
        let busy = Rc::clone(&self.busy);
        futures_lite::future::block_on(executor.run(async move {
            let output = until.await;
            while busy.get() {
                async_io_mini::Timer::after(Duration::from_millis(1)).await;
            }
            output
        }))
    }

    /// True when the inbox is empty and no command is mid-flight.
    pub fn is_idle(&self) -> bool {
        self.inbox.is_empty() && !self.busy.get()
    }

    /// Run for a fixed wall-clock duration.
    pub fn run_for(&self, duration: Duration) {
        self.run_until(async move {
            async_io_mini::Timer::after(duration).await;
        });
    }

    /// Run until the inbox is empty and no command is mid-flight.
    pub fn run_until_idle(&self) {
        self.run_until(async {
            loop {
                async_io_mini::Timer::after(Duration::from_millis(1)).await;
                if self.is_idle() {
                    break;
                }
            }
        });
    }
}

/// Marks a command as in flight until dropped, even if its task is.
struct InFlight(Rc<Cell<bool>>);

impl InFlight {
    fn begin(busy: &Rc<Cell<bool>>) -> Self {
        busy.set(true);
        Self(Rc::clone(busy))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

async fn watchdog_loop<C: Clock, S: EventSink>(core: Shared<C, S>) {
    loop {
        async_io_mini::Timer::after(Duration::from_millis(WATCHDOG_TICK_MS)).await;
        let mut guard = core.borrow_mut();
        let Core { service, sink } = &mut *guard;
        service.watchdog_tick(sink);
    }
}

async fn command_loop<C: Clock, S: EventSink>(
    core: Shared<C, S>,
    inbox: Rc<Inbox>,
    busy: Rc<Cell<bool>>,
) {
    loop {
        let cmd = inbox.receive().await;
        let _in_flight = InFlight::begin(&busy);
        debug!("runtime: handling {}", cmd.name());
        handle(&core, cmd).await;
    }
}

/// Run `f` with the service and sink borrowed; the borrow ends on return.
fn with_core<C: Clock, S: EventSink, R>(
    core: &Shared<C, S>,
    f: impl FnOnce(&mut DeviceService<C>, &mut S) -> R,
) -> R {
    let mut guard = core.borrow_mut();
    let Core { service, sink } = &mut *guard;
    f(service, sink)
}

async fn handle<C: Clock, S: EventSink>(core: &Shared<C, S>, cmd: RuntimeCommand) {
    let name = cmd.name();
    match cmd {
        RuntimeCommand::Hardware { command, options } => {
            with_core(core, |svc, sink| svc.execute(command, &options, sink));
        }
        RuntimeCommand::Heartbeat => with_core(core, |svc, _| svc.heartbeat()),
        RuntimeCommand::Telemetry(sample) => with_core(core, |svc, sink| {
            if let Err(error) = svc.update_telemetry(sample, sink) {
                sink.emit(&DeviceEvent::CommandFailed {
                    command: name,
                    error,
                });
            }
        }),
        RuntimeCommand::Unlock { password, admin_id } => {
            with_core(core, |svc, sink| svc.unlock(&password, &admin_id, sink));
        }
        RuntimeCommand::SetMode(mode) => {
            let step = with_core(core, |svc, sink| {
                let simulate = svc.rafe().simulate_latency();
                (svc.begin_mode_change(mode, sink), simulate)
            });
            if let (Gated::Applied(Some(prepared)), simulate) = step {
                settle(prepared.transition_time_ms(), simulate).await;
                with_core(core, |svc, sink| svc.finish_mode_change(prepared, sink));
            }
        }
        RuntimeCommand::SelectAnalyte(analyte) => {
            let step = with_core(core, |svc, sink| {
                let simulate = svc.rafe().simulate_latency();
                (svc.begin_analyte_selection(&analyte, sink), simulate)
            });
            if let (AnalyteStep::Transition(prepared, resolved), simulate) = step {
                settle(prepared.transition_time_ms(), simulate).await;
                with_core(core, |svc, sink| {
                    svc.finish_analyte_selection(prepared, resolved, sink)
                });
            }
        }
        RuntimeCommand::Calibrate => {
            let begun = with_core(core, |svc, _| {
                (svc.begin_calibration(), svc.rafe().simulate_latency())
            });
            match begun {
                (Ok(mode), simulate) => {
                    settle(CALIBRATION_TIME_MS, simulate).await;
                    with_core(core, |svc, sink| {
                        if let Err(error) = svc.finish_calibration(mode, sink) {
                            sink.emit(&DeviceEvent::CommandFailed {
                                command: name,
                                error,
                            });
                        }
                    });
                }
                (Err(error), _) => with_core(core, |_, sink| {
                    sink.emit(&DeviceEvent::CommandFailed {
                        command: name,
                        error,
                    });
                }),
            }
        }
    }
}
