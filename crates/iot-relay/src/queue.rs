// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO shared by the producers and the single consumer.
//!
//! Items flow through a tokio bounded `mpsc` channel. Alongside it a `watch` counter
//! tracks items that were enqueued but not yet acknowledged by the consumer:
//!
//! ```text
//!  enqueue ──> [ mpsc, capacity N ] ──> dequeue ──> InFlight ──> ack / drop
//!     │                                                              │
//!     └─ pending += 1                                  pending -= 1 ─┘
//! ```
//!
//! The counter is incremented in the same synchronous step that places an item, and
//! decremented only after the consumer is done with it, so `pending >= len` always
//! holds and `await_drained` cannot observe zero while an item is still queued or
//! being processed.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::message::Message;

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be greater than 0")]
    ZeroCapacity,
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
    #[error("operation cancelled")]
    Cancelled,
    #[error("queue closed")]
    Closed,
}

/// Creates a queue holding at most `capacity` items.
pub fn bounded(capacity: usize) -> Result<(QueueHandle, QueueReceiver), QueueError> {
    if capacity == 0 {
        return Err(QueueError::ZeroCapacity);
    }
    let (tx, rx) = mpsc::channel(capacity);
    let (pending, _) = watch::channel(0usize);
    let pending = Arc::new(pending);

    Ok((
        QueueHandle {
            tx,
            pending: Arc::clone(&pending),
        },
        QueueReceiver { rx, pending },
    ))
}

/// Producer side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Message>,
    pending: Arc<watch::Sender<usize>>,
}

impl QueueHandle {
    /// Appends `message`, waiting while the queue is full.
    ///
    /// If a slot is free the message is enqueued even when `cancel` has already fired.
    /// Returns `Cancelled` only when the call was blocked on a full queue.
    pub async fn enqueue(
        &self,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let permit = tokio::select! {
            biased;
            permit = self.tx.reserve() => permit.map_err(|_| QueueError::Closed)?,
            () = cancel.cancelled() => return Err(QueueError::Cancelled),
        };
        self.pending.send_modify(|pending| *pending += 1);
        permit.send(message);
        Ok(())
    }

    /// Non-blocking variant of [`QueueHandle::enqueue`] for callers that cannot wait.
    pub fn try_enqueue(&self, message: Message) -> Result<(), QueueError> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => QueueError::Full,
            TrySendError::Closed(()) => QueueError::Closed,
        })?;
        self.pending.send_modify(|pending| *pending += 1);
        permit.send(message);
        Ok(())
    }

    /// Resolves once every enqueued item has been acknowledged.
    pub async fn await_drained(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        let mut rx = self.pending.subscribe();
        tokio::select! {
            biased;
            drained = rx.wait_for(|pending| *pending == 0) => {
                drained.map(|_| ()).map_err(|_| QueueError::Closed)
            }
            () = cancel.cancelled() => Err(QueueError::Cancelled),
        }
    }

    /// Items enqueued and not yet acknowledged, including the one being processed.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Slots currently taken in the queue.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True once the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the queue. Exactly one exists per queue.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Message>,
    pending: Arc<watch::Sender<usize>>,
}

impl QueueReceiver {
    /// Removes the oldest item, waiting while the queue is empty.
    ///
    /// Returns `Cancelled` when `cancel` fires and `Closed` when every handle is gone
    /// and nothing is left to read.
    pub async fn dequeue(&mut self, cancel: &CancellationToken) -> Result<InFlight, QueueError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(QueueError::Cancelled),
            message = self.rx.recv() => match message {
                Some(message) => Ok(self.in_flight(message)),
                None => Err(QueueError::Closed),
            },
        }
    }

    pub fn try_dequeue(&mut self) -> Result<InFlight, QueueError> {
        match self.rx.try_recv() {
            Ok(message) => Ok(self.in_flight(message)),
            Err(TryRecvError::Empty) => Err(QueueError::Empty),
            Err(TryRecvError::Disconnected) => Err(QueueError::Closed),
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    fn in_flight(&self, message: Message) -> InFlight {
        InFlight {
            message,
            pending: Arc::clone(&self.pending),
        }
    }
}

/// A dequeued item that still counts as pending.
///
/// Acknowledging (or dropping) the guard marks the item as processed. Ownership makes
/// the acknowledgment happen exactly once per dequeued item.
#[derive(Debug)]
#[must_use = "dropping an InFlight acknowledges it immediately"]
pub struct InFlight {
    message: Message,
    pending: Arc<watch::Sender<usize>>,
}

impl InFlight {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn acknowledge(self) {
        drop(self);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.pending
            .send_modify(|pending| *pending = pending.saturating_sub(1));
    }
}
