// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::types::CloudDescriptor;

/// The orchestrator's view of configured clouds.
pub trait CloudRegistryPort: Send + Sync {
    fn get(&self, name: &str) -> Option<CloudDescriptor>;
    fn list(&self) -> Vec<CloudDescriptor>;
    /// The single globally configured cloud, used by nodes without a cloud name.
    fn default_cloud(&self) -> Option<CloudDescriptor>;
}
