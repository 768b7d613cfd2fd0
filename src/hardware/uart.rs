//! Shared UART transport: a single reader task fans inbound lines out to
//! registered listeners, and writes are serialized through a mutex so
//! concurrent callers never interleave a command's bytes onto the wire.

use crate::callback::{CallbackList, Subscription};
use crate::error::{Error, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use smartmirror_proto::UartLineCodec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub struct UartTransport<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> {
    write_half: Arc<AsyncMutex<SplitSink<Framed<T, UartLineCodec>, String>>>,
    read_half: AsyncMutex<Option<SplitStream<Framed<T, UartLineCodec>>>>,
    listeners: Arc<CallbackList<Arc<str>>>,
    cancel: CancellationToken,
    reader_task: AsyncMutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> UartTransport<T> {
    pub fn new(port: T) -> Self {
        let framed = Framed::new(port, UartLineCodec);
        let (write_half, read_half) = framed.split();
        Self {
            write_half: Arc::new(AsyncMutex::new(write_half)),
            read_half: AsyncMutex::new(Some(read_half)),
            listeners: CallbackList::new(),
            cancel: CancellationToken::new(),
            reader_task: AsyncMutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Register a listener invoked with every non-empty inbound line, in
    /// wire order. Dropping the returned subscription deregisters it.
    pub fn register_listener(
        &self,
        listener: impl Fn(Arc<str>) + Send + Sync + 'static,
    ) -> Subscription<Arc<str>> {
        self.listeners.register(listener)
    }

    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("UartTransport already running; start() ignored");
            return Ok(());
        }

        let Some(mut read_half) = self.read_half.lock().await.take() else {
            // already consumed by a prior start/stop cycle; nothing to do
            return Ok(());
        };
        let listeners = self.listeners.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = read_half.next() => match item {
                        Some(Ok(line)) => {
                            debug!(%line, "uart rx");
                            listeners.fire(Arc::from(line.as_str()));
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "uart read error");
                        }
                        None => break,
                    }
                }
            }
            debug!("uart reader loop exiting");
        });

        *self.reader_task.lock().await = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Some(handle) = self.reader_task.lock().await.take() {
            if tokio::time::timeout(READER_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                warn!("uart reader task did not exit within timeout");
            }
        }
    }

    /// Write a single command line. Concurrent writers are serialized;
    /// no two commands' bytes interleave on the wire.
    pub async fn write(&self, command: &str) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }
        self.write_half
            .lock()
            .await
            .send(command.to_string())
            .await
            .map_err(Error::Io)
    }
}
