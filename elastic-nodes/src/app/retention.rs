// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::computer::NodeComputer;
use crate::app::node::{ElasticNode, retention_window};

/// Minutes between two retention checks of the same node.
pub const CHECK_INTERVAL_MINUTES: u32 = 1;

/// Periodic policy the scheduler evaluates for each registered node.
#[async_trait]
pub trait NodeLifecycle: Send + Sync {
    /// Evaluates `computer` and returns the minutes until the next check.
    async fn check(&self, computer: &NodeComputer) -> u32;
}

/// Terminates a node once it has been idle longer than its retention time.
/// A retention time of zero keeps the node forever.
pub struct RetentionStrategy {
    retention_time: u32,
    checking: Mutex<()>,
}

impl RetentionStrategy {
    pub fn new(retention_time: u32) -> Self {
        Self {
            retention_time,
            checking: Mutex::new(()),
        }
    }

    pub fn for_node(node: &ElasticNode) -> Self {
        Self::new(node.retention_time())
    }

    pub fn retention_time(&self) -> u32 {
        self.retention_time
    }
}

#[async_trait]
impl NodeLifecycle for RetentionStrategy {
    async fn check(&self, computer: &NodeComputer) -> u32 {
        let _checking = self.checking.lock().await;
        if self.retention_time == 0 {
            return CHECK_INTERVAL_MINUTES;
        }

        let idle_time = computer.idle_time();
        if idle_time > retention_window(self.retention_time)
            && !computer.node().has_active_builds()
        {
            tracing::info!(
                node = %computer.name(),
                retention_minutes = self.retention_time,
                "retention time elapsed, terminating node"
            );
            computer.terminate().await;
        }
        CHECK_INTERVAL_MINUTES
    }
}
