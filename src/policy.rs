//! Display-policy scheduler: composes motion, quiet hours and power
//! events into mute/unmute calls against the video-mute state machine,
//! with a re-mute timer that puts the panel back to sleep after motion
//! stops.

use crate::error::Result;
use smartmirror_proto::{QuietHoursSchedule, TimeOfDay};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// The two FSM operations this scheduler drives. Narrower than the full
/// [`crate::videomute::VideoMuteFsm`] surface so tests can supply a
/// counting double instead of a real UART round trip.
pub trait MuteControl: Send + Sync {
    fn mute(&self) -> impl Future<Output = Result<()>> + Send;
    fn unmute(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Where the scheduler gets the current wall-clock time of day. A real
/// clock reads the system clock; tests supply a fixed or scripted one so
/// quiet-hours behavior is deterministic without depending on when the
/// test happens to run.
pub trait WallClock: Send + Sync {
    fn now(&self) -> TimeOfDay;
}

/// [`WallClock`] backed by the local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> TimeOfDay {
        use chrono::Timelike;
        let now = chrono::Local::now();
        TimeOfDay::new(now.hour() as u8, now.minute() as u8)
            .expect("chrono hour/minute are always in range")
    }
}

struct State {
    desired_muted: bool,
}

pub struct DisplayPolicyScheduler<M: MuteControl + Clone + 'static, C: WallClock + 'static> {
    fsm: M,
    clock: C,
    schedule: QuietHoursSchedule,
    remute_delay: Duration,
    state: Mutex<State>,
    pending_remute: Mutex<Option<CancellationToken>>,
    running: AtomicBool,
}

impl<M: MuteControl + Clone + 'static, C: WallClock + 'static> DisplayPolicyScheduler<M, C> {
    pub fn new(fsm: M, clock: C, schedule: QuietHoursSchedule, remute_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fsm,
            clock,
            schedule,
            remute_delay,
            // the system begins quiet: desired_muted starts true.
            state: Mutex::new(State { desired_muted: true }),
            pending_remute: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel_remute_timer();
    }

    pub fn desired_muted(&self) -> bool {
        self.state.lock().unwrap().desired_muted
    }

    /// Called by the motion source's `register_on_motion` subscription.
    pub fn on_motion(self: &Arc<Self>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if !self.schedule.is_motion_allowed(self.clock.now()) {
            debug!("motion ignored: inside quiet hours");
            return;
        }

        self.cancel_remute_timer();

        let should_unmute = {
            let mut state = self.state.lock().unwrap();
            if state.desired_muted {
                state.desired_muted = false;
                true
            } else {
                false
            }
        };

        if should_unmute {
            let fsm = self.fsm.clone();
            tokio::spawn(async move {
                if let Err(e) = fsm.unmute().await {
                    error!(error = %e, "failed to unmute on motion");
                }
            });
        }

        self.arm_remute_timer();
    }

    fn arm_remute_timer(self: &Arc<Self>) {
        let token = CancellationToken::new();
        let previous = self.pending_remute.lock().unwrap().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let this = self.clone();
        let delay = self.remute_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => this.fire_remute().await,
            }
        });
    }

    async fn fire_remute(self: &Arc<Self>) {
        self.state.lock().unwrap().desired_muted = true;
        if let Err(e) = self.fsm.mute().await {
            error!(error = %e, "failed to re-mute after motion timeout");
        }
    }

    fn cancel_remute_timer(&self) {
        if let Some(token) = self.pending_remute.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Called by the power debouncer's `on_power_on` subscription: the FSM
    /// re-drives the panel to whatever the scheduler currently wants,
    /// since the FSM itself never re-applies a deferred desired state.
    pub fn on_power_on(self: &Arc<Self>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let muted = self.desired_muted();
        let fsm = self.fsm.clone();
        tokio::spawn(async move {
            let result = if muted { fsm.mute().await } else { fsm.unmute().await };
            if let Err(e) = result {
                error!(error = %e, "failed to re-drive display policy after power-on");
            }
        });
    }

    /// Called by the power debouncer's `on_power_off` subscription. The
    /// desired value is retained; only the pending re-mute timer is
    /// cancelled, since it will be re-asserted on the next power-on.
    pub fn on_power_off(&self) {
        self.cancel_remute_timer();
    }
}
