//! Bounded packet queue between the reader task and the consumer.
//!
//! ```text
//! socket ─► Demuxer ─► decode ─► PacketSender ═══► PacketReceiver ─► consumer
//!                                   (awaits when full)   (awaits when empty)
//! ```
//!
//! Backed by a bounded `tokio::sync::mpsc` channel: a full queue makes the
//! producer wait (no drops, no polling), an empty queue makes the consumer
//! wait. FIFO order is the channel's order, so packets come out in receive
//! index order. A shared atomic counter tracks the queued length for
//! statistics.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Result, RtspError};
use crate::protocol::Packet;
use crate::shutdown::ShutdownSignal;

/// Counters shared by both ends.
#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    pushed: AtomicU64,
    blocked: AtomicU64,
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    /// Configured bound.
    pub capacity: usize,
    /// Packets currently waiting for the consumer.
    pub queued: usize,
    /// Packets accepted since creation.
    pub pushed: u64,
    /// Pushes that had to wait for space.
    pub blocked_pushes: u64,
}

/// Create a queue holding at most `capacity` packets.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub fn packet_queue(capacity: usize) -> (PacketSender, PacketReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let counters = Arc::new(Counters::default());
    (
        PacketSender {
            tx,
            shutdown: None,
            counters: counters.clone(),
            capacity,
        },
        PacketReceiver {
            rx,
            counters,
            capacity,
        },
    )
}

/// Producer end.
#[derive(Debug)]
pub struct PacketSender {
    tx: mpsc::Sender<Packet>,
    shutdown: Option<ShutdownSignal>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl PacketSender {
    /// Abort pending pushes when `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Push a packet, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the consumer is gone or shutdown was triggered
    /// while waiting. The packet is not delivered in either case.
    pub async fn push(&mut self, packet: Packet) -> Result<()> {
        match self.tx.try_reserve() {
            Ok(permit) => {
                self.counters.queued.fetch_add(1, Ordering::AcqRel);
                permit.send(packet);
                self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(mpsc::error::TrySendError::Closed(())) => return Err(RtspError::ConnectionClosed),
            Err(mpsc::error::TrySendError::Full(())) => {}
        }

        self.counters.blocked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(capacity = self.capacity, "packet queue full, waiting");

        let permit = match &mut self.shutdown {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.wait() => return Err(RtspError::ConnectionClosed),
                permit = self.tx.reserve() => permit,
            },
            None => self.tx.reserve().await,
        }
        .map_err(|_| RtspError::ConnectionClosed)?;

        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        permit.send(packet);
        self.counters.pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Whether the consumer dropped its end.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the consumer drops its end.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Counter snapshot.
    pub fn stats(&self) -> QueueStats {
        snapshot(&self.counters, self.capacity)
    }
}

/// Consumer end.
#[derive(Debug)]
pub struct PacketReceiver {
    rx: mpsc::Receiver<Packet>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl PacketReceiver {
    /// Take the next packet, waiting while the queue is empty.
    ///
    /// Returns `None` once the producer is gone and the queue is drained.
    pub async fn pop(&mut self) -> Option<Packet> {
        let packet = self.rx.recv().await?;
        self.counters.queued.fetch_sub(1, Ordering::AcqRel);
        Some(packet)
    }

    /// Take the next packet if one is queued.
    pub fn try_pop(&mut self) -> Option<Packet> {
        let packet = self.rx.try_recv().ok()?;
        self.counters.queued.fetch_sub(1, Ordering::AcqRel);
        Some(packet)
    }

    /// Packets currently queued.
    pub fn len(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot.
    pub fn stats(&self) -> QueueStats {
        snapshot(&self.counters, self.capacity)
    }
}

fn snapshot(counters: &Counters, capacity: usize) -> QueueStats {
    QueueStats {
        capacity,
        queued: counters.queued.load(Ordering::Acquire),
        pushed: counters.pushed.load(Ordering::Relaxed),
        blocked_pushes: counters.blocked.load(Ordering::Relaxed),
    }
}
