//! Tri-valued state used where "unknown" is a distinct, load-bearing case
//! from "true"/"false", not a boolean, not an `Option<bool>` treated as a
//! default-false flag.

use std::time::Duration;

/// A tri-valued observation: `Unknown` only before the first stable
/// reading, or after it has been explicitly cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tri {
    #[default]
    Unknown,
    True,
    False,
}

impl Tri {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Tri::True
        } else {
            Tri::False
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, Tri::True)
    }

    pub fn is_false(self) -> bool {
        matches!(self, Tri::False)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Tri::Unknown)
    }
}

/// The panel's observed power state, as committed by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Unknown,
    On,
    Off,
}

impl PowerState {
    pub fn from_bool(is_on: bool) -> Self {
        if is_on {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

/// `(panel_muted, backlight_on)` as observed from UART telemetry. Only the
/// UART listener writes this; every other component only reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoMuteState {
    pub panel_muted: Tri,
    pub backlight_on: Tri,
}

impl VideoMuteState {
    pub fn is_muted(&self) -> bool {
        self.panel_muted.is_true() && self.backlight_on.is_false()
    }

    pub fn is_unmuted(&self) -> bool {
        self.panel_muted.is_false() && self.backlight_on.is_true()
    }
}

/// What the policy layer currently wants the panel to be doing.
/// `Unknown` means no target has been set, or one was just cleared by a
/// timeout or a power-loss edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredMute {
    #[default]
    Unknown,
    Mute,
    Unmute,
}

/// Tunable timing constants gathered in one place.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub power_stability_window: Duration,
    pub transition_timeout: Duration,
    pub power_on_timeout: Duration,
    pub power_off_delay: Duration,
    pub remute_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            power_stability_window: Duration::from_millis(1200),
            transition_timeout: Duration::from_secs(8),
            power_on_timeout: Duration::from_secs(20),
            power_off_delay: Duration::from_secs(2),
            remute_delay: Duration::from_secs(15),
        }
    }
}
