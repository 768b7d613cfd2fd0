//! Named IR commands: a thin, lifecycle-gated facade mapping command
//! names to IR frames and delegating to the bit-banging emitter.

use crate::error::{Error, Result};
use crate::hardware::gpio::IrOutputLine;
use crate::hardware::ir::IrEmitter;
use smartmirror_proto::frame_value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Command service over a configured name → command-value table.
pub struct IrCommandService<L: IrOutputLine + 'static> {
    emitter: IrEmitter<L>,
    prefix: u16,
    commands: BTreeMap<String, u16>,
    running: AtomicBool,
}

impl<L: IrOutputLine + 'static> IrCommandService<L> {
    pub fn new(emitter: IrEmitter<L>, prefix: u16, commands: BTreeMap<String, u16>) -> Self {
        Self {
            emitter,
            prefix,
            commands,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("IrCommandService already running; start() ignored");
            return;
        }
        self.emitter.start();
        info!("IrCommandService started");
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.emitter.stop();
        info!("IrCommandService stopped");
    }

    pub fn list_commands(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub async fn send_command(&self, name: &str) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            warn!(command = name, "attempted IR send while service not running");
            return Err(Error::NotRunning);
        }

        let normalized = name.to_ascii_lowercase();
        let Some(&command) = self.commands.get(&normalized) else {
            return Err(Error::UnknownCommand(normalized));
        };

        debug!(command = normalized, "sending IR command");
        self.emitter.send(frame_value(self.prefix, command)).await
    }
}
