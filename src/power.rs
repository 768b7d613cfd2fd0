//! Power-state debouncer: converts a bouncing GPIO edge stream into a
//! stable on/off signal with a 1.2 s stability window.

use crate::callback::{CallbackList, Subscription};
use crate::error::Result;
use crate::hardware::gpio::PowerStatusLine;
use crate::model::PowerState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EDGE_TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub struct PowerDebouncer<L: PowerStatusLine + 'static> {
    line: Arc<L>,
    stability_window: Duration,
    committed: std::sync::Mutex<PowerState>,
    on_power_on: Arc<CallbackList<()>>,
    on_power_off: Arc<CallbackList<()>>,
    cancel: CancellationToken,
    stability_cancel: AsyncMutex<Option<CancellationToken>>,
    edge_task: AsyncMutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl<L: PowerStatusLine + 'static> PowerDebouncer<L> {
    pub fn new(line: Arc<L>, stability_window: Duration) -> Arc<Self> {
        Arc::new(Self {
            line,
            stability_window,
            committed: std::sync::Mutex::new(PowerState::Unknown),
            on_power_on: CallbackList::new(),
            on_power_off: CallbackList::new(),
            cancel: CancellationToken::new(),
            stability_cancel: AsyncMutex::new(None),
            edge_task: AsyncMutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    pub fn register_on_power_on(
        &self,
        handler: impl Fn(()) + Send + Sync + 'static,
    ) -> Subscription<()> {
        self.on_power_on.register(handler)
    }

    pub fn register_on_power_off(
        &self,
        handler: impl Fn(()) + Send + Sync + 'static,
    ) -> Subscription<()> {
        self.on_power_off.register(handler)
    }

    pub fn state(&self) -> PowerState {
        *self.committed.lock().unwrap()
    }

    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("PowerDebouncer already running; start() ignored");
            return Ok(());
        }

        let initial = self.line.read().await?;
        info!(on = initial, "initial power gpio read");
        self.start_stability_timer(initial).await;

        let this = self.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    edge = this.line.wait_edge() => match edge {
                        Ok(level) => this.start_stability_timer(level).await,
                        Err(e) => error!(error = %e, "power gpio edge read error"),
                    }
                }
            }
            debug!("power debouncer edge loop exiting");
        });
        *self.edge_task.lock().await = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(token) = self.stability_cancel.lock().await.take() {
            token.cancel();
        }
        let handle = self.edge_task.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(EDGE_TASK_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                warn!("power debouncer edge task did not exit within timeout");
            }
        }
    }

    async fn start_stability_timer(self: &Arc<Self>, level: bool) {
        let token = CancellationToken::new();
        let previous = self.stability_cancel.lock().await.replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
            debug!("cancelled previous stability timer");
        }

        let this = self.clone();
        let window = self.stability_window;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(window) => this.commit(level),
            }
        });
    }

    fn commit(&self, level: bool) {
        let new_state = PowerState::from_bool(level);
        {
            let mut committed = self.committed.lock().unwrap();
            if *committed == new_state {
                debug!(state = ?new_state, "stability timer fired but state unchanged");
                return;
            }
            *committed = new_state;
        }

        info!(state = ?new_state, "power state stabilized");
        if level {
            self.on_power_on.fire(());
        } else {
            self.on_power_off.fire(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::gpio::dummy::DummyPowerLine;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn commits_initial_state_after_stability_window() {
        let line = Arc::new(DummyPowerLine::new(true));
        let debouncer = PowerDebouncer::new(line, Duration::from_millis(1200));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = debouncer.register_on_power_on(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.start().await.unwrap();

        tokio::time::advance(Duration::from_millis(1199)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.state(), PowerState::Unknown);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.state(), PowerState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn bouncing_edges_reset_the_stability_timer() {
        let line = Arc::new(DummyPowerLine::new(false));
        let debouncer = PowerDebouncer::new(line.clone(), Duration::from_millis(1200));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_on = fired.clone();
        let _sub_on = debouncer.register_on_power_on(move |_| {
            fired_on.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.start().await.unwrap();
        tokio::task::yield_now().await;

        // bounce: on, off, on again, each within the stability window
        line.set(true);
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(600)).await;
        line.set(false);
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(600)).await;
        line.set(true);
        tokio::task::yield_now().await;

        // not yet stable for a full window since the last edge
        tokio::time::advance(Duration::from_millis(1199)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.state(), PowerState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_stability_timer() {
        let line = Arc::new(DummyPowerLine::new(false));
        let debouncer = PowerDebouncer::new(line.clone(), Duration::from_millis(1200));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = debouncer.register_on_power_on(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.start().await.unwrap();
        tokio::task::yield_now().await;
        line.set(true);
        tokio::task::yield_now().await;

        debouncer.stop().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
