//! Video-mute convergence state machine: issues paired UART commands and
//! confirms completion from asynchronous UART telemetry, with a
//! transition timeout so a miscommunicating panel never wedges a waiter.

use crate::dispatch::LineHandler;
use crate::error::{Error, Result};
use crate::hardware::uart::UartTransport;
use crate::model::{DesiredMute, Tri};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy)]
enum Target {
    Mute,
    Unmute,
}

impl Target {
    fn desired(self) -> DesiredMute {
        match self {
            Target::Mute => DesiredMute::Mute,
            Target::Unmute => DesiredMute::Unmute,
        }
    }

    fn is_satisfied(self, state: &State) -> bool {
        match self {
            Target::Mute => state.panel_muted.is_true() && state.backlight_on.is_false(),
            Target::Unmute => state.panel_muted.is_false() && state.backlight_on.is_true(),
        }
    }

    fn sequence(self) -> [&'static str; 2] {
        match self {
            Target::Mute => ["videomute 0 1", "videomute 1 1"],
            Target::Unmute => ["videomute 1 0", "videomute 0 0"],
        }
    }
}

struct State {
    panel_muted: Tri,
    backlight_on: Tri,
    desired_muted: DesiredMute,
    power_on: bool,
    transition_active: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            panel_muted: Tri::Unknown,
            backlight_on: Tri::Unknown,
            desired_muted: DesiredMute::Unknown,
            power_on: false,
            transition_active: false,
        }
    }
}

pub struct VideoMuteFsm<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> {
    uart: Arc<UartTransport<T>>,
    state: Mutex<State>,
    convergence: Notify,
    transition_cancel: Mutex<Option<CancellationToken>>,
    transition_timeout: Duration,
    running: AtomicBool,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> VideoMuteFsm<T> {
    pub fn new(uart: Arc<UartTransport<T>>, transition_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            uart,
            state: Mutex::new(State::default()),
            convergence: Notify::new(),
            transition_cancel: Mutex::new(None),
            transition_timeout,
            running: AtomicBool::new(false),
        })
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(token) = self.transition_cancel.lock().unwrap().take() {
            token.cancel();
        }
    }

    pub async fn mute(self: &Arc<Self>) -> Result<()> {
        self.transition(Target::Mute).await
    }

    pub async fn unmute(self: &Arc<Self>) -> Result<()> {
        self.transition(Target::Unmute).await
    }

    async fn transition(self: &Arc<Self>, target: Target) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }

        enum Action {
            Deferred,
            AlreadySatisfied,
            Drive,
        }

        let action = {
            let mut state = self.state.lock().unwrap();
            state.desired_muted = target.desired();
            if !state.power_on {
                Action::Deferred
            } else if target.is_satisfied(&state) {
                Action::AlreadySatisfied
            } else {
                state.transition_active = true;
                Action::Drive
            }
        };

        match action {
            Action::Deferred => {
                debug!(?target, "deferring video mute transition: panel not powered on");
                Ok(())
            }
            Action::AlreadySatisfied => {
                self.convergence.notify_waiters();
                Ok(())
            }
            Action::Drive => {
                self.arm_transition_timeout();
                for command in target.sequence() {
                    self.uart.write(command).await?;
                }
                Ok(())
            }
        }
    }

    fn arm_transition_timeout(self: &Arc<Self>) {
        let token = CancellationToken::new();
        let previous = self.transition_cancel.lock().unwrap().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let this = self.clone();
        let timeout = self.transition_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => this.on_transition_timeout(),
            }
        });
    }

    fn on_transition_timeout(&self) {
        {
            let mut state = self.state.lock().unwrap();
            error!("video mute transition timed out; abandoning desired state");
            state.desired_muted = DesiredMute::Unknown;
            state.transition_active = false;
        }
        self.convergence.notify_waiters();
    }

    /// Called by the power debouncer's `on_power_on` subscription.
    pub fn on_power_on(&self) {
        self.state.lock().unwrap().power_on = true;
    }

    /// Called by the power debouncer's `on_power_off` subscription.
    pub fn on_power_off(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.panel_muted = Tri::Unknown;
            state.backlight_on = Tri::Unknown;
            state.desired_muted = DesiredMute::Unknown;
            state.transition_active = false;
            state.power_on = false;
        }
        if let Some(token) = self.transition_cancel.lock().unwrap().take() {
            token.cancel();
        }
        // any in-flight wait_for_convergence is deliberately left hanging
    }

    fn is_converged(&self) -> bool {
        let state = self.state.lock().unwrap();
        match state.desired_muted {
            DesiredMute::Mute => Target::Mute.is_satisfied(&state),
            DesiredMute::Unmute => Target::Unmute.is_satisfied(&state),
            DesiredMute::Unknown => false,
        }
    }

    /// Block until the observed state matches the desired state, or the
    /// timeout elapses. Also returns once the FSM's own transition
    /// timeout has abandoned the desired state, with an unmet result.
    pub async fn wait_for_convergence(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.convergence.notified();
            tokio::pin!(notified);
            if self.is_converged() {
                return true;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return self.is_converged(),
            }
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> crate::policy::MuteControl
    for Arc<VideoMuteFsm<T>>
{
    async fn mute(&self) -> Result<()> {
        VideoMuteFsm::mute(self).await
    }

    async fn unmute(&self) -> Result<()> {
        VideoMuteFsm::unmute(self).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> LineHandler for VideoMuteFsm<T> {
    fn can_handle(&self, line: &str) -> bool {
        matches!(
            line,
            "Video Mute on" | "Video Mute off" | "PORT_SW_INVERTER on" | "PORT_SW_INVERTER off"
        )
    }

    fn handle(&self, line: &str) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let converged = {
            let mut state = self.state.lock().unwrap();
            match line {
                "Video Mute on" => state.panel_muted = Tri::True,
                "Video Mute off" => state.panel_muted = Tri::False,
                "PORT_SW_INVERTER on" => state.backlight_on = Tri::True,
                "PORT_SW_INVERTER off" => state.backlight_on = Tri::False,
                _ => return,
            }
            let converged = match state.desired_muted {
                DesiredMute::Mute => Target::Mute.is_satisfied(&state),
                DesiredMute::Unmute => Target::Unmute.is_satisfied(&state),
                DesiredMute::Unknown => false,
            };
            if converged {
                state.transition_active = false;
            }
            converged
        };

        if converged {
            if let Some(token) = self.transition_cancel.lock().unwrap().take() {
                token.cancel();
            }
            self.convergence.notify_waiters();
        }
    }
}
