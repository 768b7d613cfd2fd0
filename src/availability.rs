//! Display-availability controller: asserts "panel must be powered on" by
//! retrying IR power pulses until the power debouncer observes it back on.

use crate::error::Result;
use crate::ir_service::IrCommandService;
use crate::hardware::gpio::IrOutputLine;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// The single capability this controller needs from the IR layer: send
/// the panel's power toggle. Narrower than the full command service, so
/// tests can supply a trivial counting double instead of driving real
/// bit-banged timing.
pub trait PowerSignal: Send + Sync {
    fn send_power(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<L: IrOutputLine + 'static> PowerSignal for IrCommandService<L> {
    async fn send_power(&self) -> Result<()> {
        self.send_command("power").await
    }
}

pub struct DisplayAvailabilityController<S: PowerSignal + 'static> {
    signal: Arc<S>,
    power_off_delay: Duration,
    power_on_timeout: Duration,
    waiting: AtomicBool,
    latch: Notify,
    pending: Mutex<Option<CancellationToken>>,
}

impl<S: PowerSignal + 'static> DisplayAvailabilityController<S> {
    pub fn new(signal: Arc<S>, power_off_delay: Duration, power_on_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            signal,
            power_off_delay,
            power_on_timeout,
            waiting: AtomicBool::new(false),
            latch: Notify::new(),
            pending: Mutex::new(None),
        })
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Called by the power debouncer's `on_power_on` subscription.
    pub fn on_power_on(&self) {
        self.waiting.store(false, Ordering::SeqCst);
        if let Some(token) = self.pending.lock().unwrap().take() {
            token.cancel();
        }
        self.latch.notify_waiters();
    }

    /// Called by the power debouncer's `on_power_off` subscription.
    pub fn on_power_off(self: &Arc<Self>) {
        self.waiting.store(true, Ordering::SeqCst);
        let token = CancellationToken::new();
        let previous = self.pending.lock().unwrap().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let this = self.clone();
        let delay = self.power_off_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            this.send_and_arm_retry(token).await;
        });
    }

    async fn send_and_arm_retry(self: &Arc<Self>, token: CancellationToken) {
        if let Err(e) = self.signal.send_power().await {
            error!(error = %e, "failed to send IR power command");
        }
        self.arm_retry(token);
    }

    fn arm_retry(self: &Arc<Self>, token: CancellationToken) {
        let this = self.clone();
        let timeout = self.power_on_timeout;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(timeout) => {
                        if !this.waiting.load(Ordering::SeqCst) {
                            return;
                        }
                        error!("display did not power on within timeout; retrying IR power command");
                        if let Err(e) = this.signal.send_power().await {
                            error!(error = %e, "failed to resend IR power command");
                        }
                    }
                }
            }
        });
    }

    /// Block until the panel is observed powered on, or the timeout
    /// elapses.
    pub async fn wait_until_powered_on(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.latch.notified();
            tokio::pin!(notified);
            if !self.waiting.load(Ordering::SeqCst) {
                return true;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return !self.waiting.load(Ordering::SeqCst),
            }
        }
    }
}
