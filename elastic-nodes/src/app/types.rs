// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Operations after which a `done` instance counts as terminated.
pub const TERMINATE_OPERATIONS: &[&str] = &["terminate", "terminate_service", "force_terminate"];

/// One remote control-plane account, keyed by `name` in the cloud registry.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CloudDescriptor {
    pub name: String,
    pub endpoint_url: String,
    pub username: String,
    pub password: String,
    /// Default retention for nodes provisioned from this cloud, in minutes.
    pub retention_time: u32,
}

impl CloudDescriptor {
    pub fn matches_credentials(&self, endpoint_url: &str, username: &str, password: &str) -> bool {
        self.endpoint_url == endpoint_url && self.username == username && self.password == password
    }
}

impl fmt::Debug for CloudDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudDescriptor")
            .field("name", &self.name)
            .field("endpoint_url", &self.endpoint_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("retention_time", &self.retention_time)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Processing,
    Done,
    Unavailable,
    #[serde(other)]
    Unknown,
}

/// The slice of a remote instance document the lifecycle cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResource {
    pub id: String,
    pub state: InstanceState,
    #[serde(default)]
    pub operation: Option<String>,
}

impl InstanceResource {
    /// A `done` instance is only terminated when its last operation was a terminate.
    pub fn is_terminated(&self) -> bool {
        self.state == InstanceState::Done
            && self
                .operation
                .as_deref()
                .is_some_and(|op| TERMINATE_OPERATIONS.contains(&op))
    }
}

/// Why a node's agent connection is being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineCause {
    NodeBeingRemoved,
    ChannelTerminated(String),
    UserRequested(String),
    IdleOffline,
    Other(String),
}

impl OfflineCause {
    pub fn is_node_removal(&self) -> bool {
        matches!(self, OfflineCause::NodeBeingRemoved)
    }
}

impl fmt::Display for OfflineCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineCause::NodeBeingRemoved => write!(f, "node is being removed"),
            OfflineCause::ChannelTerminated(reason) => write!(f, "channel terminated: {reason}"),
            OfflineCause::UserRequested(reason) => write!(f, "disconnected by user: {reason}"),
            OfflineCause::IdleOffline => write!(f, "idle"),
            OfflineCause::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    Normal,
    #[default]
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    SingleUse,
    PerProject,
    Global,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::SingleUse => "Single-use",
            NodeKind::PerProject => "Per project configured",
            NodeKind::Global => "Globally configured",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-supplied template for a globally configured node.
#[derive(Debug, Clone, Default)]
pub struct NodeConfiguration {
    pub description: String,
    pub profile_id: String,
    pub box_version: String,
    pub remote_fs: Option<String>,
    pub executors: u32,
    pub mode: NodeMode,
    pub labels: String,
    pub retention_time: u32,
    pub launch_timeout: u32,
    pub environment: String,
}

/// Persisted attribute set of a node. Runtime-only state is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub profile_id: String,
    pub box_version: String,
    pub single_use: bool,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub instance_status_message: Option<String>,
    pub retention_time: u32,
    #[serde(default)]
    pub cloud_name: Option<String>,
    pub remote_fs: String,
    pub executors: u32,
    #[serde(default)]
    pub mode: NodeMode,
    #[serde(default)]
    pub labels: String,
}

/// A unit of work the orchestrator associated with a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub id: String,
    pub building: bool,
}

/// Progress of the retry-terminate procedure for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TerminationState {
    Idle = 0,
    /// A synchronous attempt or its retry chain is running.
    InFlight = 1,
    /// The control plane accepted a terminate, or the instance is gone.
    Issued = 2,
    /// Every attempt failed and an operator was alerted.
    Exhausted = 3,
}

impl TerminationState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => TerminationState::InFlight,
            2 => TerminationState::Issued,
            3 => TerminationState::Exhausted,
            _ => TerminationState::Idle,
        }
    }
}

const LAUNCH_PENDING: u8 = 0;
const LAUNCH_STARTED: u8 = 1;
const LAUNCH_CANCELLED: u8 = 2;

/// A provisioning request that has been planned but may not have launched yet.
#[derive(Debug)]
pub struct PendingLaunch {
    display_name: String,
    state: AtomicU8,
}

impl PendingLaunch {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            state: AtomicU8::new(LAUNCH_PENDING),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Cancels the launch if it has not started. Returns whether it is now cancelled.
    pub fn cancel(&self) -> bool {
        match self.state.compare_exchange(
            LAUNCH_PENDING,
            LAUNCH_CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == LAUNCH_CANCELLED,
        }
    }

    /// Called by the provisioner before launching. Fails if already cancelled.
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(
                LAUNCH_PENDING,
                LAUNCH_STARTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == LAUNCH_CANCELLED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(state: InstanceState, operation: Option<&str>) -> InstanceResource {
        InstanceResource {
            id: "i-1".to_string(),
            state,
            operation: operation.map(str::to_string),
        }
    }

    #[test]
    fn terminated_requires_done_and_terminate_operation() {
        assert!(instance(InstanceState::Done, Some("terminate")).is_terminated());
        assert!(instance(InstanceState::Done, Some("force_terminate")).is_terminated());
        assert!(!instance(InstanceState::Done, Some("reinstall")).is_terminated());
        assert!(!instance(InstanceState::Done, None).is_terminated());
        assert!(!instance(InstanceState::Processing, Some("terminate")).is_terminated());
    }

    #[test]
    fn instance_state_parses_unknown_values() {
        let parsed: InstanceResource =
            serde_json::from_str(r#"{"id":"i-9","state":"migrating","operation":"deploy"}"#)
                .expect("instance should parse");
        assert_eq!(parsed.state, InstanceState::Unknown);
        assert!(!parsed.is_terminated());
    }

    #[test]
    fn pending_launch_cancels_only_before_start() {
        let launch = PendingLaunch::new("node-a");
        assert!(launch.cancel());
        assert!(launch.is_cancelled());
        assert!(!launch.try_start());

        let started = PendingLaunch::new("node-b");
        assert!(started.try_start());
        assert!(!started.cancel());
        assert!(!started.is_cancelled());
    }

    #[test]
    fn cloud_debug_redacts_password() {
        let cloud = CloudDescriptor {
            name: "prod".to_string(),
            endpoint_url: "https://eb.example.com".to_string(),
            username: "ops".to_string(),
            password: "hunter2".to_string(),
            retention_time: 30,
        };
        let rendered = format!("{cloud:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(cloud.matches_credentials("https://eb.example.com", "ops", "hunter2"));
        assert!(!cloud.matches_credentials("https://eb.example.com", "ops", "other"));
    }
}
