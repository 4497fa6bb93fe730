//! Hand-off from the audio hardware callback thread to async consumers.
//!
//! The producer half never blocks: a full or closed queue rejects the chunk
//! and counts it as dropped, so the device callback returns immediately.
//! Dropping the producer closes the queue; the consumer drains whatever is
//! left and then ends.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

pub fn chunk_queue(capacity: usize) -> (ChunkProducer, ChunkStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ChunkProducer {
            tx,
            dropped: dropped.clone(),
        },
        ChunkStream { rx, dropped },
    )
}

/// Sending half, safe to move into a device callback.
pub struct ChunkProducer {
    tx: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl ChunkProducer {
    /// Enqueues `chunk` without blocking. Returns false when the chunk was dropped.
    pub fn push(&self, chunk: Bytes) -> bool {
        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half. Yields chunks in capture order.
pub struct ChunkStream {
    rx: mpsc::Receiver<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl ChunkStream {
    /// Refuses further chunks. Already queued chunks are still yielded.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Chunks rejected by the producer because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Stream for ChunkStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
