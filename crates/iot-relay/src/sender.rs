// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single consumer of the relay queue.
//!
//! [`Sender`] owns the consumer side of the queue and forwards every item to a
//! [`TelemetrySink`]. [`SenderHandle`] is what producers and the shutdown path hold.
//! A failed delivery is logged and the item is acknowledged anyway: delivery is
//! best-effort and at most once, and one bad data point never stalls the loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::message::{Message, MessageError, Value};
use crate::queue::{self, QueueError, QueueHandle, QueueReceiver};
use crate::sink::{SinkError, TelemetrySink};

pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub delivered: u64,
    pub failed: u64,
}

impl RunStats {
    pub fn attempted(&self) -> u64 {
        self.delivered + self.failed
    }
}

/// How [`Sender::run`] stopped. Both variants are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run token was cancelled.
    Cancelled(RunStats),
    /// Every handle was dropped and the queue was empty.
    Closed(RunStats),
}

impl RunOutcome {
    pub fn stats(&self) -> RunStats {
        match self {
            Self::Cancelled(stats) | Self::Closed(stats) => *stats,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct Sender {
    receiver: QueueReceiver,
    sink: Arc<dyn TelemetrySink>,
    state: watch::Sender<SenderState>,
}

/// Producer-facing side of a [`Sender`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SenderHandle {
    queue: QueueHandle,
    state: watch::Receiver<SenderState>,
}

impl SenderHandle {
    /// Queues a data point for publishing, waiting while the queue is full.
    pub async fn send(
        &self,
        channel: impl Into<String>,
        value: impl Into<Value>,
        cancel: &CancellationToken,
    ) -> Result<(), SendError> {
        let message = Message::new(channel, value)?;
        self.queue.enqueue(message, cancel).await?;
        Ok(())
    }

    /// Waits until every queued data point has been processed.
    ///
    /// Only meaningful once producers have been told to stop, otherwise a producer
    /// may enqueue again right after this returns.
    pub async fn wait_for_drain(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        self.queue.await_drained(cancel).await
    }

    pub fn state(&self) -> SenderState {
        *self.state.borrow()
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl Sender {
    pub fn new(
        sink: Arc<dyn TelemetrySink>,
        capacity: usize,
    ) -> Result<(Self, SenderHandle), QueueError> {
        let (queue, receiver) = queue::bounded(capacity)?;
        let (state, state_rx) = watch::channel(SenderState::Idle);

        let sender = Self {
            receiver,
            sink,
            state,
        };
        let handle = SenderHandle {
            queue,
            state: state_rx,
        };
        Ok((sender, handle))
    }

    /// Forwards queued data points to the sink until `cancel` fires or every handle is
    /// dropped. A delivery already in progress always completes before the loop
    /// observes cancellation.
    pub async fn run(mut self, cancel: CancellationToken) -> RunOutcome {
        info!("Telemetry sender started");
        self.state.send_replace(SenderState::Running);

        let mut stats = RunStats::default();
        let outcome = loop {
            let item = match self.receiver.dequeue(&cancel).await {
                Ok(item) => item,
                Err(QueueError::Closed) => break RunOutcome::Closed(stats),
                Err(_) => break RunOutcome::Cancelled(stats),
            };
            self.deliver(item.message(), &mut stats).await;
            item.acknowledge();
        };

        self.state.send_replace(SenderState::Stopped);
        info!(
            "Telemetry sender stopped: {} delivered, {} failed",
            stats.delivered, stats.failed
        );
        outcome
    }

    async fn deliver(&self, message: &Message, stats: &mut RunStats) {
        match self
            .sink
            .send_datapoint(message.channel(), message.value())
            .await
        {
            Ok(()) => {
                stats.delivered += 1;
                debug!("Sent {}/{}", message.channel(), message.value());
            }
            Err(e @ SinkError::Request { .. }) => {
                stats.failed += 1;
                error!("Request error sending {}: {}", message.channel(), e);
            }
            Err(e @ SinkError::General(_)) => {
                stats.failed += 1;
                error!("General error sending {}: {}", message.channel(), e);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct FakeSink {
        calls: Mutex<Vec<String>>,
        reject: Option<&'static str>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TelemetrySink for FakeSink {
        async fn send_datapoint(&self, channel: &str, value: &Value) -> Result<(), SinkError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}={}", channel, value));
            if self.reject == Some(channel) {
                return Err(SinkError::Request {
                    status: 429,
                    message: "throttled".to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let sink = Arc::new(FakeSink::default());
        let (sender, handle) = Sender::new(sink, 2).unwrap();
        assert_eq!(handle.state(), SenderState::Idle);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(sender.run(cancel.clone()));
        handle.send("a", 1.0, &cancel).await.unwrap();
        handle.wait_for_drain(&CancellationToken::new()).await.unwrap();
        assert_eq!(handle.state(), SenderState::Running);

        cancel.cancel();
        let outcome = task.await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Cancelled(RunStats {
                delivered: 1,
                failed: 0
            })
        );
        assert_eq!(handle.state(), SenderState::Stopped);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_sink_failure_is_isolated() {
        let sink = Arc::new(FakeSink {
            reject: Some("b"),
            ..Default::default()
        });
        let (sender, handle) = Sender::new(sink.clone(), 8).unwrap();
        let cancel = CancellationToken::new();

        for channel in ["a", "b", "c"] {
            handle.send(channel, 1, &cancel).await.unwrap();
        }

        // drive the loop on this task so its events land in the test span
        let drive = async {
            handle.wait_for_drain(&CancellationToken::new()).await.unwrap();
            assert_eq!(handle.state(), SenderState::Running);
            cancel.cancel();
        };
        let (outcome, ()) = tokio::join!(sender.run(cancel.clone()), drive);

        assert_eq!(*sink.calls.lock().unwrap(), vec!["a=1", "b=1", "c=1"]);
        assert_eq!(handle.pending(), 0);
        assert!(logs_contain("Request error sending b"));

        let stats = outcome.stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_send_rejects_empty_channel() {
        let (_sender, handle) = Sender::new(Arc::new(FakeSink::default()), 1).unwrap();
        let result = handle.send("", 1.0, &CancellationToken::new()).await;
        assert_eq!(result, Err(SendError::Message(MessageError::EmptyChannel)));
        assert_eq!(handle.pending(), 0);
    }

    #[tokio::test]
    async fn test_run_ends_when_handles_dropped() {
        let sink = Arc::new(FakeSink::default());
        let (sender, handle) = Sender::new(sink.clone(), 4).unwrap();
        let cancel = CancellationToken::new();

        handle.send("a", 1.0, &cancel).await.unwrap();
        handle.send("b", 2.0, &cancel).await.unwrap();
        drop(handle);

        let outcome = timeout(Duration::from_secs(1), sender.run(cancel))
            .await
            .expect("run should end once the queue is closed and empty");
        assert_eq!(
            outcome,
            RunOutcome::Closed(RunStats {
                delivered: 2,
                failed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_waits_for_in_flight_delivery() {
        let sink = Arc::new(FakeSink {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let (sender, handle) = Sender::new(sink.clone(), 4).unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sender.run(cancel.clone()));

        handle.send("slow", 1.0, &cancel).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = task.await.unwrap();
        assert_eq!(outcome.stats().delivered, 1);
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
        assert_eq!(handle.pending(), 0);
    }
}
