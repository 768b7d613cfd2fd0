//! GPIO lines: the power-status input (panel's power LED) and the IR
//! output (bit-banged to the panel's IR receiver).
//!
//! Both are modeled as small traits so the services above them can be
//! tested against in-memory doubles instead of a real character device.

use crate::error::{Error, Result};
use gpiod::{Chip, EdgeDetect, Input, Lines, Options, Output};
use std::future::Future;
use std::sync::{Arc, Mutex};

fn io_err(e: std::io::Error) -> Error {
    Error::Io(e)
}

/// A GPIO input line carrying the panel's power-status LED.
///
/// Hardware convention: the LED is active-low, so a raw level of `false`
/// (line pulled low) means the panel is on.
pub trait PowerStatusLine: Send + Sync {
    /// Read the current level once, with no edge semantics.
    fn read(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Block until the next edge, returning the new raw level.
    fn wait_edge(&self) -> impl Future<Output = Result<bool>> + Send;
}

/// A GPIO output line driving the IR LED.
pub trait IrOutputLine: Send + Sync {
    fn set_high(&self) -> Result<()>;
    fn set_low(&self) -> Result<()>;
}

/// [`PowerStatusLine`] backed by a real `/dev/gpiochipN` character device.
pub struct GpiodPowerStatusLine {
    lines: Arc<Mutex<Lines<Input>>>,
}

impl GpiodPowerStatusLine {
    pub fn open(chip_path: &str, offset: u32) -> Result<Self> {
        let chip = Chip::new(chip_path).map_err(io_err)?;
        let options = Options::input([offset])
            .edge(EdgeDetect::Both)
            .consumer("smartmirrord-power");
        let lines = chip.request_lines(options).map_err(io_err)?;
        Ok(Self {
            lines: Arc::new(Mutex::new(lines)),
        })
    }
}

impl PowerStatusLine for GpiodPowerStatusLine {
    async fn read(&self) -> Result<bool> {
        let lines = self.lines.clone();
        tokio::task::spawn_blocking(move || {
            let lines = lines.lock().unwrap();
            let values = lines.get_values().map_err(io_err)?;
            Ok::<bool, Error>(!values[0])
        })
        .await
        .map_err(join_err)?
    }

    async fn wait_edge(&self) -> Result<bool> {
        let lines = self.lines.clone();
        tokio::task::spawn_blocking(move || {
            let lines = lines.lock().unwrap();
            let event = lines.read_event().map_err(io_err)?;
            Ok::<bool, Error>(event.edge == gpiod::Edge::Falling)
        })
        .await
        .map_err(join_err)?
    }
}

/// [`IrOutputLine`] backed by a real `/dev/gpiochipN` character device.
pub struct GpiodIrOutputLine {
    lines: Lines<Output>,
}

impl GpiodIrOutputLine {
    pub fn open(chip_path: &str, offset: u32) -> Result<Self> {
        let chip = Chip::new(chip_path).map_err(io_err)?;
        let options = Options::output([offset])
            .values([true]) // idle high
            .consumer("smartmirrord-ir");
        let lines = chip.request_lines(options).map_err(io_err)?;
        Ok(Self { lines })
    }
}

impl IrOutputLine for GpiodIrOutputLine {
    fn set_high(&self) -> Result<()> {
        self.lines.set_values([true]).map_err(io_err)
    }

    fn set_low(&self) -> Result<()> {
        self.lines.set_values([false]).map_err(io_err)
    }
}

fn join_err(_: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other("blocking GPIO task panicked"))
}
