//! Quiet-hours schedule: a set of wall-clock windows during which motion
//! events are ignored by the display policy.

use crate::helpers::parse_hh_mm;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// A wall-clock time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour >= 24 || minute >= 60 {
            return Err(anyhow!("time of day out of range: {hour:02}:{minute:02}"));
        }
        Ok(Self { hour, minute })
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

/// Parse a `"HH:MM"` string, e.g. from a schedule config entry.
pub fn parse_time_of_day(input: &str) -> Result<TimeOfDay> {
    let (_, (hour, minute)) = parse_hh_mm(input.trim())
        .map_err(|e| anyhow!("invalid time of day {input:?}: {e}"))?;
    TimeOfDay::new(hour, minute)
}

/// One `[start, end)` window, wrapping past midnight when `start >= end`.
#[derive(Debug, Clone, Copy)]
pub struct QuietWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl QuietWindow {
    pub fn contains(&self, t: TimeOfDay) -> bool {
        let start = self.start.minutes_since_midnight();
        let end = self.end.minutes_since_midnight();
        let now = t.minutes_since_midnight();
        if start < end {
            now >= start && now < end
        } else {
            now >= start || now < end
        }
    }
}

/// The full set of quiet-hours windows.
#[derive(Debug, Clone, Default)]
pub struct QuietHoursSchedule {
    pub windows: Vec<QuietWindow>,
}

impl QuietHoursSchedule {
    /// Parse the `SCHEDULE_JSON` config value, e.g.
    /// `{"quiet_hours":[{"start":"23:00","end":"06:00"}]}`.
    pub fn from_json(input: &str) -> Result<Self> {
        let wire: ScheduleWire =
            serde_json::from_str(input).context("malformed schedule JSON")?;
        let mut windows = Vec::with_capacity(wire.quiet_hours.len());
        for w in wire.quiet_hours {
            windows.push(QuietWindow {
                start: parse_time_of_day(&w.start)?,
                end: parse_time_of_day(&w.end)?,
            });
        }
        Ok(Self { windows })
    }

    /// True iff no configured window covers `t`.
    pub fn is_motion_allowed(&self, t: TimeOfDay) -> bool {
        !self.windows.iter().any(|w| w.contains(t))
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleWire {
    quiet_hours: Vec<WindowWire>,
}

#[derive(Debug, Deserialize)]
struct WindowWire {
    start: String,
    end: String,
}
