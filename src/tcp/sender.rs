//! Write side of a PSX connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncWrite, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::codec::PsxLineCodec;
use crate::message::WireMsg;
use crate::types::{keys, PsxError};

type LineSink<T> = FramedWrite<WriteHalf<T>, PsxLineCodec>;

/// Cloneable handle for writing lines to a connection.
///
/// Obtained from [`Connection::sender`](crate::tcp::Connection::sender);
/// lets other tasks send while the listener owns the connection. Writes
/// from all clones go through one lock, so lines never interleave.
pub struct LineSender<T> {
    sink: Arc<Mutex<Option<LineSink<T>>>>,
    open: Arc<AtomicBool>,
}

impl<T> Clone for LineSender<T> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            open: self.open.clone(),
        }
    }
}

impl<T> LineSender<T> {
    /// Whether the write half is still open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<T: AsyncWrite> LineSender<T> {
    pub(crate) fn new(write_half: WriteHalf<T>, codec: PsxLineCodec) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(FramedWrite::new(write_half, codec)))),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Send a message in wire form
    pub async fn send(&self, msg: &WireMsg) -> Result<(), PsxError> {
        self.send_line(msg.wire_string()).await
    }

    /// Send a raw line; CRLF is appended.
    ///
    /// Partial writes are retried until the whole line is out. A
    /// transport that accepts zero bytes yields [`PsxError::ShortWrite`],
    /// and the caller must treat the connection as dead.
    pub async fn send_line(&self, line: String) -> Result<(), PsxError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(PsxError::NotConnected)?;
        debug!("Sending: {}", line);
        sink.send(line).await
    }

    /// Say `exit` and shut the write half down. Further sends on any
    /// clone fail with [`PsxError::NotConnected`].
    pub async fn close(&self) -> Result<(), PsxError> {
        self.open.store(false, Ordering::Release);
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        let said_exit = sink.send(keys::EXIT.to_string()).await;
        let closed = sink.close().await;
        said_exit.and(closed)
    }
}
