// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use crate::app::node::ElasticNode;
use crate::app::types::PendingLaunch;

pub trait ProvisionerPort: Send + Sync {
    /// Capacity labels the node could satisfy.
    fn capacity_labels(&self, node: &ElasticNode) -> Vec<String>;
    fn pending_launches(&self, label: &str) -> Vec<Arc<PendingLaunch>>;
    /// Records a node whose instance teardown was just requested.
    fn track_terminated(&self, node: &ElasticNode);
}
