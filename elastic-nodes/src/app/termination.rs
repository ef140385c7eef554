// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::app::errors::{AppError, AppErrorKind, codes};
use crate::app::node::ElasticNode;
use crate::app::ports::{OperatorAlertPort, TerminationAlert};
use crate::app::types::TerminationState;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Asynchronous attempts made after a failed synchronous terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay before the n-th asynchronous attempt (1-based), doubling each time.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

/// Result of one run of the retry-terminate procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The node was never bound to a remote instance.
    Skipped,
    /// A terminate for this node was already accepted earlier.
    AlreadyIssued,
    /// An earlier attempt or its retry chain is still running.
    InProgress,
    /// An earlier retry chain gave up and alerted an operator.
    Exhausted,
    Terminated,
    /// The remote instance no longer exists.
    AlreadyGone,
    /// The node's cloud or endpoint is broken; retrying cannot help.
    Abandoned,
    RetryScheduled,
}

/// Retry message for one node.
pub struct TerminationTask {
    pub node: Arc<ElasticNode>,
    pub attempts_remaining: u32,
    /// Attempts made so far, including the synchronous one.
    pub attempts_made: u32,
    pub last_error: String,
    pub on_exhausted: Arc<dyn OperatorAlertPort>,
}

/// Sending side of the termination worker. Cheap to clone.
#[derive(Clone)]
pub struct TerminationQueue {
    tx: mpsc::UnboundedSender<TerminationTask>,
    policy: RetryPolicy,
    alerts: Arc<dyn OperatorAlertPort>,
}

impl TerminationQueue {
    /// Hands `node` to the worker after a failed synchronous attempt.
    pub fn schedule(&self, node: Arc<ElasticNode>, last_error: String) -> bool {
        let node_name = node.name().to_string();
        let task = TerminationTask {
            node,
            attempts_remaining: self.policy.attempts,
            attempts_made: 1,
            last_error,
            on_exhausted: self.alerts.clone(),
        };
        if self.tx.send(task).is_err() {
            tracing::error!(node = %node_name, "termination worker is gone; retry dropped");
            return false;
        }
        true
    }
}

pub struct TerminationWorker {
    rx: mpsc::UnboundedReceiver<TerminationTask>,
    policy: RetryPolicy,
}

impl TerminationWorker {
    pub fn new(
        policy: RetryPolicy,
        alerts: Arc<dyn OperatorAlertPort>,
    ) -> (TerminationQueue, TerminationWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TerminationQueue { tx, policy, alerts },
            TerminationWorker { rx, policy },
        )
    }

    pub fn spawn(
        policy: RetryPolicy,
        alerts: Arc<dyn OperatorAlertPort>,
    ) -> (TerminationQueue, JoinHandle<()>) {
        let (queue, worker) = Self::new(policy, alerts);
        (queue, tokio::spawn(worker.run()))
    }

    /// Runs until every queue handle is dropped and in-flight retries finish.
    pub async fn run(mut self) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                task = self.rx.recv() => match task {
                    Some(task) => {
                        in_flight.spawn(drive(task, self.policy));
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next() => log_join(joined),
            }
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::error!(error = %err, "termination retry task failed");
    }
}

async fn drive(mut task: TerminationTask, policy: RetryPolicy) {
    let mut attempt = 0;
    while task.attempts_remaining > 0 {
        attempt += 1;
        task.attempts_remaining -= 1;
        tokio::time::sleep(policy.delay_before(attempt)).await;
        task.attempts_made += 1;
        match task.node.terminate().await {
            Ok(()) => {
                tracing::info!(
                    node = %task.node.name(),
                    attempt = task.attempts_made,
                    "node terminated on retry"
                );
                return;
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(node = %task.node.name(), "instance already gone");
                task.node.finish_termination(TerminationState::Issued);
                return;
            }
            Err(err) if err.is_unreachable() => {
                task.node.finish_termination(TerminationState::Idle);
                tracing::warn!(
                    node = %task.node.name(),
                    error = %err,
                    "abandoning termination retries"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(
                    node = %task.node.name(),
                    attempt = task.attempts_made,
                    error = %err,
                    "terminate retry failed"
                );
                task.last_error = err.to_string();
            }
        }
    }
    report_exhausted(task);
}

/// Terminal error for a node whose retries all failed.
fn exhausted_error(task: &TerminationTask) -> AppError {
    AppError::with_message(
        AppErrorKind::RetriesExhausted,
        codes::RETRIES_EXHAUSTED,
        format!(
            "unable to terminate node {} after {} attempts",
            task.node.name(),
            task.attempts_made
        ),
    )
    .with_context(task.last_error.clone())
}

fn report_exhausted(task: TerminationTask) {
    task.node.finish_termination(TerminationState::Exhausted);
    let err = exhausted_error(&task);
    tracing::debug!(
        node = %task.node.name(),
        code = err.code(),
        error = %err,
        "termination retries exhausted"
    );
    let instance_location = task
        .node
        .instance_page_url()
        .ok()
        .or_else(|| task.node.instance_url());
    task.on_exhausted.termination_failed(TerminationAlert {
        node_name: task.node.name().to_string(),
        instance_location,
        attempts: task.attempts_made,
        last_error: task.last_error,
    });
}
