//! IR frame transmission: bit-bangs the pulse train produced by
//! [`smartmirror_proto::generate_pulses`] on a GPIO output line.

use crate::error::{Error, Result};
use crate::hardware::gpio::IrOutputLine;
use smartmirror_proto::{generate_pulses, IrTiming, Level};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::task;

const REPEAT_COUNT: usize = 5;
const INTER_FRAME_GAP: Duration = Duration::from_millis(5);

/// Bit-bangs IR frames with microsecond-precision busy-wait timing.
/// `tokio::time::sleep` is too coarse for pulse widths this short, so the
/// whole transmission runs on a blocking thread rather than the async
/// runtime's worker threads.
pub struct IrEmitter<L: IrOutputLine + 'static> {
    line: Arc<L>,
    timing: IrTiming,
    running: AtomicBool,
}

impl<L: IrOutputLine + 'static> IrEmitter<L> {
    pub fn new(line: Arc<L>, timing: IrTiming) -> Self {
        Self {
            line,
            timing,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Transmit `value` five times with a 5 ms gap between repetitions.
    pub async fn send(&self, value: u32) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }

        let line = self.line.clone();
        let timing = self.timing;
        task::spawn_blocking(move || transmit(&*line, &timing, value))
            .await
            .map_err(|_| Error::Io(std::io::Error::other("IR transmit task panicked")))??;

        Ok(())
    }
}

fn transmit<L: IrOutputLine>(line: &L, timing: &IrTiming, value: u32) -> Result<()> {
    let pulses = generate_pulses(timing, value);
    for rep in 0..REPEAT_COUNT {
        for pulse in &pulses {
            match pulse.level {
                Level::Low => line.set_low()?,
                Level::High => line.set_high()?,
            }
            busy_wait(Duration::from_micros(pulse.micros as u64));
        }
        line.set_high()?; // release the line to idle between frames
        if rep + 1 < REPEAT_COUNT {
            std::thread::sleep(INTER_FRAME_GAP);
        }
    }
    Ok(())
}

fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::gpio::dummy::DummyIrLine;
    use smartmirror_proto::frame_value;

    #[tokio::test]
    async fn send_fails_before_start() {
        let line = Arc::new(DummyIrLine::default());
        let emitter = IrEmitter::new(line, IrTiming::SAMSUNG);
        let err = emitter.send(0).await.unwrap_err();
        assert!(matches!(err, Error::NotRunning));
    }

    #[tokio::test]
    async fn send_transmits_frame_five_times() {
        let line = Arc::new(DummyIrLine::default());
        let emitter = IrEmitter::new(line.clone(), IrTiming::SAMSUNG);
        emitter.start();

        let value = frame_value(smartmirror_proto::PREFIX_SAMSUNG, 0x0002);
        emitter.send(value).await.unwrap();

        let transitions = line.transitions.lock().unwrap();
        // 67 pulses + 1 idle-release transition, five times over.
        assert_eq!(transitions.len(), (67 + 1) * 5);
        assert_eq!(transitions[0], false); // leader starts low
    }

    #[tokio::test]
    async fn stop_then_send_fails() {
        let line = Arc::new(DummyIrLine::default());
        let emitter = IrEmitter::new(line, IrTiming::SAMSUNG);
        emitter.start();
        emitter.stop();
        let err = emitter.send(0).await.unwrap_err();
        assert!(matches!(err, Error::NotRunning));
    }
}
