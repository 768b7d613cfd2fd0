//! Environment-backed configuration. No config file, only env vars with
//! defaults, read through small hand-rolled `getenv` helpers.

use crate::error::{Error, Result};
use smartmirror_proto::QuietHoursSchedule;
use std::time::Duration;

fn get_bool_env(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn get_int_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn get_string_env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

const DEFAULT_SCHEDULE_JSON: &str = r#"{"quiet_hours":[{"start":"23:00","end":"06:00"}]}"#;

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_to_console: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
    pub uart_debug: bool,

    pub gpio_chip_path: String,
    pub gpio_power_status_pin: u32,
    pub gpio_ir_input_pin: u32,

    pub camera_width: u32,
    pub camera_height: u32,
    pub motion_width: u32,
    pub motion_height: u32,
    pub motion_threshold: u32,
    pub motion_cooldown: Duration,

    pub uart_port: String,
    pub uart_baudrate: u32,

    pub display_policy_timeout: Duration,

    pub schedule: QuietHoursSchedule,
}

impl Config {
    /// Read every recognized env var, applying defaults where unset or
    /// unparsable. Only a malformed `SCHEDULE_JSON` is fatal.
    pub fn from_env() -> Result<Self> {
        let schedule_json = get_string_env("SCHEDULE_JSON", DEFAULT_SCHEDULE_JSON);
        let schedule = QuietHoursSchedule::from_json(&schedule_json)
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            log_level: get_string_env("LOG_LEVEL", "INFO"),
            log_to_console: get_bool_env("LOG_TO_CONSOLE", true),
            log_to_file: get_bool_env("LOG_TO_FILE", true),
            log_file_path: get_string_env("LOG_FILE_PATH", "../log/smartmirrord.log"),
            uart_debug: get_bool_env("UART_DEBUG", false),

            gpio_chip_path: get_string_env("GPIO_CHIP_PATH", "/dev/gpiochip0"),
            gpio_power_status_pin: get_int_env("GPIO_POWER_STATUS_PIN", 23),
            gpio_ir_input_pin: get_int_env("GPIO_IR_INPUT_PIN", 27),

            camera_width: get_int_env("CAMERA_WIDTH", 640),
            camera_height: get_int_env("CAMERA_HEIGHT", 480),
            motion_width: get_int_env("MOTION_WIDTH", 320),
            motion_height: get_int_env("MOTION_HEIGHT", 240),
            motion_threshold: get_int_env("MOTION_THRESHOLD", 150),
            motion_cooldown: Duration::from_secs(get_int_env("MOTION_COOLDOWN_SEC", 6)),

            uart_port: get_string_env("UART_PORT", "/dev/serial0"),
            uart_baudrate: get_int_env("UART_BAUDRATE", 115200),

            display_policy_timeout: Duration::from_secs(get_int_env(
                "DISPLAY_POLICY_TIMEOUT",
                15,
            )),

            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_env_recognizes_common_truthy_spellings() {
        assert!(get_bool_env("SMARTMIRROR_TEST_NONEXISTENT_BOOL", true));
        assert!(!get_bool_env("SMARTMIRROR_TEST_NONEXISTENT_BOOL", false));
    }

    #[test]
    fn int_env_falls_back_on_unset() {
        let v: u32 = get_int_env("SMARTMIRROR_TEST_NONEXISTENT_INT", 42);
        assert_eq!(v, 42);
    }

    #[test]
    fn default_schedule_json_parses() {
        let schedule = QuietHoursSchedule::from_json(DEFAULT_SCHEDULE_JSON).unwrap();
        assert_eq!(schedule.windows.len(), 1);
    }
}
