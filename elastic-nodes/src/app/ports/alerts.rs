// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// Raised when automatic termination gave up on a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminationAlert {
    pub node_name: String,
    /// Page where an operator can terminate the instance by hand.
    pub instance_location: Option<String>,
    pub attempts: u32,
    pub last_error: String,
}

pub trait OperatorAlertPort: Send + Sync {
    fn termination_failed(&self, alert: TerminationAlert);
}
