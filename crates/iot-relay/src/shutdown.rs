// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Task ownership and the ordered shutdown sequence.
//!
//! [`Supervisor`] runs the [`Sender`] loop and every producer as tokio tasks, each
//! with its own cancellation token. [`Supervisor::shutdown`] stops them in an order
//! that never leaves queued data behind:
//!
//! 1. cancel the producer token, so no new readings are queued;
//! 2. join the producer tasks, so no enqueue can still be in flight;
//! 3. wait for the queue to drain, bounded by a timeout;
//! 4. cancel the sender token and join the sender task.
//!
//! Draining before producers have stopped could observe an empty queue right before a
//! producer queues more, and the sender would then be cancelled with data still queued.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::RelayError;
use crate::sender::{RunOutcome, Sender, SenderHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// How the sender loop ended.
    pub outcome: RunOutcome,
    /// Number of producer tasks that were stopped.
    pub producers: usize,
}

pub struct Supervisor {
    handle: SenderHandle,
    producer_token: CancellationToken,
    sender_token: CancellationToken,
    producers: JoinSet<()>,
    sender: JoinHandle<RunOutcome>,
}

impl Supervisor {
    /// Spawns the sender loop. Must be called from within a tokio runtime.
    pub fn start(sender: Sender, handle: SenderHandle) -> Self {
        let sender_token = CancellationToken::new();
        let sender = tokio::spawn(sender.run(sender_token.clone()));

        Self {
            handle,
            producer_token: CancellationToken::new(),
            sender_token,
            producers: JoinSet::new(),
            sender,
        }
    }

    /// Spawns a producer. It receives its own handle to the queue and a token that is
    /// cancelled at the start of shutdown.
    pub fn spawn_producer<F, Fut>(&mut self, producer: F)
    where
        F: FnOnce(SenderHandle, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = producer(self.handle.clone(), self.producer_token.child_token());
        self.producers.spawn(task);
    }

    pub fn handle(&self) -> &SenderHandle {
        &self.handle
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Stops producers, waits up to `drain_timeout` for queued items to be processed,
    /// then stops the sender.
    ///
    /// On a drain timeout the sender is still stopped and joined, and the number of
    /// items that were never processed is reported in the error.
    pub async fn shutdown(
        mut self,
        drain_timeout: Duration,
    ) -> Result<ShutdownReport, RelayError> {
        let producers = self.producers.len();
        info!("Shutdown initiated, stopping {} producers", producers);

        self.producer_token.cancel();
        while let Some(joined) = self.producers.join_next().await {
            if let Err(e) = joined {
                error!("Producer task failed: {}", e);
            }
        }

        debug!("Waiting for {} pending items to drain", self.handle.pending());
        let drained = match timeout(
            drain_timeout,
            self.handle.wait_for_drain(&CancellationToken::new()),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::Runtime(format!("drain failed: {}", e))),
            Err(_) => {
                let pending = self.handle.pending();
                error!("Timed out draining queue, {} items undelivered", pending);
                Err(RelayError::DrainTimeout { pending })
            }
        };

        self.sender_token.cancel();
        let outcome = self
            .sender
            .await
            .map_err(|e| RelayError::Runtime(format!("sender task failed: {}", e)))?;
        drained?;

        let stats = outcome.stats();
        info!(
            "Shutdown complete: {} delivered, {} failed",
            stats.delivered, stats.failed
        );
        Ok(ShutdownReport {
            outcome,
            producers,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::sender::SenderState;
    use crate::sink::{SinkError, TelemetrySink};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct SlowSink(Duration);

    #[async_trait]
    impl TelemetrySink for SlowSink {
        async fn send_datapoint(&self, _channel: &str, _value: &Value) -> Result<(), SinkError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_without_producers() {
        let (sender, handle) = Sender::new(Arc::new(SlowSink(Duration::ZERO)), 8).unwrap();
        let supervisor = Supervisor::start(sender, handle.clone());

        let report = supervisor.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.producers, 0);
        assert!(matches!(report.outcome, RunOutcome::Cancelled(_)));
        assert_eq!(handle.state(), SenderState::Stopped);
    }

    #[tokio::test]
    async fn test_producers_stop_before_drain() {
        let sink = Arc::new(SlowSink(Duration::from_millis(1)));
        let (sender, handle) = Sender::new(sink, 2).unwrap();
        let mut supervisor = Supervisor::start(sender, handle);

        // keeps the queue busy until told to stop
        supervisor.spawn_producer(|handle, cancel| async move {
            let mut i = 0;
            while !cancel.is_cancelled() && handle.send("busy", i, &cancel).await.is_ok() {
                i += 1;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = supervisor.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(report.producers, 1);
        assert!(report.outcome.stats().delivered > 0);
        assert_eq!(report.outcome.stats().failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_is_reported() {
        let sink = Arc::new(SlowSink(Duration::from_secs(60)));
        let (sender, handle) = Sender::new(sink, 4).unwrap();
        let supervisor = Supervisor::start(sender, handle.clone());

        let cancel = CancellationToken::new();
        for i in 0..3 {
            handle.send("slow", i, &cancel).await.unwrap();
        }

        let result = supervisor.shutdown(Duration::from_secs(1)).await;
        match result {
            Err(RelayError::DrainTimeout { pending }) => assert_eq!(pending, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(handle.state(), SenderState::Stopped);
    }
}
