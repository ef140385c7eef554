// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use tokio::sync::oneshot;

use crate::app::types::OfflineCause;

/// Resolves once the agent connection has been torn down.
pub type DisconnectHandle = oneshot::Receiver<()>;

/// The orchestrator's own disconnect mechanism for a node's agent channel.
pub trait AgentConnectionPort: Send + Sync {
    fn disconnect(&self, node_name: &str, cause: &OfflineCause) -> DisconnectHandle;
}
