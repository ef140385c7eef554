// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

use crate::app::node::ElasticNode;
use crate::app::ports::{AgentConnectionPort, DisconnectHandle};
use crate::app::services::locks::lock;
use crate::app::termination::{TerminationOutcome, TerminationQueue};
use crate::app::types::{OfflineCause, TerminationState};

#[derive(Debug, Default)]
struct ConnectionState {
    online: bool,
    idle_since: Option<OffsetDateTime>,
}

/// Runtime facet of an [`ElasticNode`]: connection state, idle tracking and
/// the disconnect/terminate state machine.
pub struct NodeComputer {
    node: Arc<ElasticNode>,
    connection: Arc<dyn AgentConnectionPort>,
    terminations: TerminationQueue,
    state: Mutex<ConnectionState>,
    terminate_on_offline: AtomicBool,
}

impl NodeComputer {
    pub fn new(
        node: Arc<ElasticNode>,
        connection: Arc<dyn AgentConnectionPort>,
        terminations: TerminationQueue,
    ) -> Self {
        Self {
            node,
            connection,
            terminations,
            state: Mutex::new(ConnectionState::default()),
            terminate_on_offline: AtomicBool::new(false),
        }
    }

    pub fn node(&self) -> &Arc<ElasticNode> {
        &self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    fn now(&self) -> OffsetDateTime {
        self.node.context().clock().now_utc()
    }

    pub fn is_online(&self) -> bool {
        lock(&self.state).online
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.state).idle_since.is_some()
    }

    /// Agent connected. A fresh connection starts idle.
    pub fn mark_online(&self) {
        let now = self.now();
        let mut state = lock(&self.state);
        state.online = true;
        state.idle_since.get_or_insert(now);
    }

    pub fn mark_offline(&self) {
        lock(&self.state).online = false;
    }

    pub fn mark_busy(&self) {
        lock(&self.state).idle_since = None;
    }

    pub fn mark_idle(&self) {
        let now = self.now();
        lock(&self.state).idle_since.get_or_insert(now);
    }

    /// Time spent idle while online; zero otherwise.
    pub fn idle_time(&self) -> Duration {
        let (online, idle_since) = {
            let state = lock(&self.state);
            (state.online, state.idle_since)
        };
        match idle_since {
            Some(since) if online => (self.now() - since).max(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    pub fn can_terminate(&self) -> bool {
        self.node.can_terminate(self.idle_time())
    }

    pub fn terminate_on_offline(&self) -> bool {
        self.terminate_on_offline.load(Ordering::Acquire)
    }

    /// Clears the deferred-termination flag, returning whether it was set.
    pub fn take_terminate_on_offline(&self) -> bool {
        self.terminate_on_offline.swap(false, Ordering::AcqRel)
    }

    #[tracing::instrument(
        name = "computer",
        level = "debug",
        skip(self, cause),
        fields(op = "disconnect", node = %self.node.name(), cause = %cause)
    )]
    pub async fn disconnect(&self, cause: OfflineCause) -> DisconnectHandle {
        let online = self.is_online();
        let mut terminate_now = false;
        if cause.is_node_removal() {
            let cancelled = self.cancel_pending_launches();
            if cancelled > 0 {
                tracing::debug!(cancelled, "cancelled pending launches");
            }
            if online {
                self.terminate_on_offline.store(true, Ordering::Release);
            } else {
                terminate_now = true;
            }
        }

        let handle = self.connection.disconnect(self.node.name(), &cause);
        if terminate_now {
            self.terminate().await;
        }
        handle
    }

    /// Cancels launches still pending for this node under any label it serves.
    fn cancel_pending_launches(&self) -> usize {
        let provisioner = &self.node.context().provisioner;
        let mut cancelled = 0;
        for label in provisioner.capacity_labels(&self.node) {
            for launch in provisioner.pending_launches(&label) {
                if launch.display_name() == self.node.name() && launch.cancel() {
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    /// Terminates the bound instance once and hands any failure other than
    /// "not found" to the termination worker for bounded retries. At most one
    /// attempt or retry chain runs per node; once it settles, later calls
    /// report the settled state instead of retrying.
    pub async fn terminate(&self) -> TerminationOutcome {
        let node = &self.node;
        if node.instance_url().is_none() {
            return TerminationOutcome::Skipped;
        }
        if let Err(state) = node.begin_termination() {
            tracing::debug!(node = %node.name(), state = ?state, "termination already handled");
            return match state {
                TerminationState::Issued => TerminationOutcome::AlreadyIssued,
                TerminationState::Exhausted => TerminationOutcome::Exhausted,
                _ => TerminationOutcome::InProgress,
            };
        }
        if let Err(err) = node.check_instance_reachable() {
            tracing::debug!(node = %node.name(), error = %err, "node is unreachable, not terminating");
            node.finish_termination(TerminationState::Idle);
            return TerminationOutcome::Abandoned;
        }

        match node.terminate().await {
            Ok(()) => TerminationOutcome::Terminated,
            Err(err) if err.is_not_found() => {
                tracing::debug!(node = %node.name(), "instance already gone");
                node.finish_termination(TerminationState::Issued);
                TerminationOutcome::AlreadyGone
            }
            Err(err) => {
                tracing::warn!(
                    node = %node.name(),
                    error = %err,
                    "error terminating node, scheduling retries"
                );
                if self.terminations.schedule(node.clone(), err.to_string()) {
                    TerminationOutcome::RetryScheduled
                } else {
                    node.finish_termination(TerminationState::Idle);
                    TerminationOutcome::Abandoned
                }
            }
        }
    }
}
