//! Motion source: grayscale-diff motion scoring over an opaque stream of
//! already-reduced camera frames. Camera capture and colorspace
//! conversion are external collaborators; this module only sees
//! single-channel luma samples via [`FrameSource`].

use crate::callback::{CallbackList, Subscription};
use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A single-channel frame already sized and converted by whatever camera
/// backend sits behind [`FrameSource`]. `luma.len()` must equal
/// `width * height`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

/// Per-pixel absolute-difference threshold above which a pixel counts
/// toward the motion score. Not exposed as configuration, only the
/// resulting score threshold is.
const PIXEL_DIFF_THRESHOLD: u8 = 25;

/// Producer of camera frames. Capture, resize and grayscale conversion
/// are a concrete backend's job; this crate depends on no camera or
/// image library.
pub trait FrameSource: Send + Sync {
    fn read_frame(&self) -> impl Future<Output = Result<Frame>> + Send;
}

/// Grayscale-diff motion detector: fires `on_motion` when the count of
/// pixels that changed by more than [`PIXEL_DIFF_THRESHOLD`] exceeds
/// `threshold`, no more often than once per `cooldown`.
pub struct MotionSource<F: FrameSource + 'static> {
    source: Arc<F>,
    threshold: u32,
    cooldown: Duration,
    last_frame: Mutex<Option<Frame>>,
    last_fired: Mutex<Option<Instant>>,
    on_motion: Arc<CallbackList<()>>,
    cancel: CancellationToken,
    task: AsyncMutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl<F: FrameSource + 'static> MotionSource<F> {
    pub fn new(source: Arc<F>, threshold: u32, cooldown: Duration) -> Arc<Self> {
        Arc::new(Self {
            source,
            threshold,
            cooldown,
            last_frame: Mutex::new(None),
            last_fired: Mutex::new(None),
            on_motion: CallbackList::new(),
            cancel: CancellationToken::new(),
            task: AsyncMutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    pub fn register_on_motion(&self, handler: impl Fn(()) + Send + Sync + 'static) -> Subscription<()> {
        self.on_motion.register(handler)
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("MotionSource already running; start() ignored");
            return;
        }

        let this = self.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = this.source.read_frame() => match frame {
                        Ok(frame) => this.observe(frame),
                        Err(e) => error!(error = %e, "motion source frame read error"),
                    }
                }
            }
            debug!("motion source loop exiting");
        });
        *self.task.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
        *self.last_frame.lock().unwrap() = None;
    }

    fn observe(&self, frame: Frame) {
        let previous = self.last_frame.lock().unwrap().replace(frame.clone());
        let Some(previous) = previous else {
            // first frame after start only seeds last_frame
            return;
        };

        let score = diff_score(&previous, &frame);
        if score <= self.threshold {
            return;
        }

        let now = Instant::now();
        let mut last_fired = self.last_fired.lock().unwrap();
        if let Some(last) = *last_fired {
            if now.duration_since(last) < self.cooldown {
                return;
            }
        }
        *last_fired = Some(now);
        drop(last_fired);

        debug!(score, threshold = self.threshold, "motion detected");
        self.on_motion.fire(());
    }
}

/// Count pixels whose absolute difference exceeds [`PIXEL_DIFF_THRESHOLD`].
/// Frames of mismatched dimensions score zero rather than panicking, so a
/// backend that changes resolution mid-stream does not crash the daemon.
fn diff_score(a: &Frame, b: &Frame) -> u32 {
    if a.width != b.width || a.height != b.height || a.luma.len() != b.luma.len() {
        return 0;
    }
    a.luma
        .iter()
        .zip(b.luma.iter())
        .filter(|(x, y)| x.abs_diff(**y) > PIXEL_DIFF_THRESHOLD)
        .count() as u32
}

/// A [`FrameSource`] that never reports motion: constant frames, forever.
/// Plugs in where a real camera backend (V4L2, libcamera, ...) would sit.
pub struct NullFrameSource {
    width: u32,
    height: u32,
    poll_interval: Duration,
}

impl NullFrameSource {
    pub fn new(width: u32, height: u32, poll_interval: Duration) -> Self {
        Self {
            width,
            height,
            poll_interval,
        }
    }
}

impl FrameSource for NullFrameSource {
    async fn read_frame(&self) -> Result<Frame> {
        tokio::time::sleep(self.poll_interval).await;
        Ok(Frame {
            width: self.width,
            height: self.height,
            luma: vec![0u8; (self.width * self.height) as usize],
        })
    }
}
