// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::computer::NodeComputer;

/// Connection events the orchestrator reports for managed computers.
#[async_trait]
pub trait ComputerListener: Send + Sync {
    async fn on_offline(&self, computer: &NodeComputer);
}

/// Finishes terminations deferred because the node was online when its
/// removal was requested.
#[derive(Clone, Default)]
pub struct NodeRemovalListener;

impl NodeRemovalListener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComputerListener for NodeRemovalListener {
    async fn on_offline(&self, computer: &NodeComputer) {
        if computer.take_terminate_on_offline() {
            tracing::info!(node = %computer.name(), "node went offline after removal, terminating");
            computer.terminate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::termination::RetryPolicy;
    use crate::app::types::OfflineCause;
    use crate::testing::Harness;

    #[tokio::test]
    async fn deferred_removal_terminates_once_on_offline() {
        let harness = Harness::new();
        let (computer, _worker) = harness.computer(harness.node(5), RetryPolicy::default());
        let listener = NodeRemovalListener::new();
        computer.mark_online();

        computer.disconnect(OfflineCause::NodeBeingRemoved).await;
        assert_eq!(harness.client.count("terminate"), 0);

        computer.mark_offline();
        listener.on_offline(&computer).await;
        listener.on_offline(&computer).await;

        assert_eq!(harness.client.count("terminate"), 1);
        assert!(!computer.terminate_on_offline());
    }

    #[tokio::test]
    async fn plain_offline_transitions_are_ignored() {
        let harness = Harness::new();
        let (computer, _worker) = harness.computer(harness.node(5), RetryPolicy::default());
        computer.mark_online();
        computer.mark_offline();

        NodeRemovalListener::new().on_offline(&computer).await;

        assert!(harness.client.calls().is_empty());
    }
}
