// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Lifecycle management for build nodes backed by cloud-provisioned
//! instances: retention-driven termination, removal handling with bounded
//! retries, and a self-healing cache of authenticated control-plane clients.

pub mod adapters;
pub mod app;
pub mod config;
pub mod logging;
pub mod service;

#[cfg(test)]
mod testing;

pub use adapters::remote::{CachedClient, RemoteClientCache};
pub use app::computer::NodeComputer;
pub use app::errors::{AppError, AppErrorKind, AppResult};
pub use app::listener::{ComputerListener, NodeRemovalListener};
pub use app::node::ElasticNode;
pub use app::retention::{NodeLifecycle, RetentionStrategy};
pub use app::termination::{RetryPolicy, TerminationOutcome};
pub use service::{Collaborators, LifecycleService};
