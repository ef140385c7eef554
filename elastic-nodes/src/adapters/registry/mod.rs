// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::RwLock;

use crate::app::ports::CloudRegistryPort;
use crate::app::services::locks::{read, write};
use crate::app::types::CloudDescriptor;
use crate::config::Config;

#[derive(Debug, Default)]
struct RegistryState {
    clouds: Vec<CloudDescriptor>,
    default_cloud: Option<String>,
}

/// In-memory cloud registry seeded from configuration.
///
/// Editing or removing a cloud does not touch connected clients; callers
/// should follow a change with `RemoteClientCache::remove_client`.
#[derive(Debug, Default)]
pub struct StaticCloudRegistry {
    state: RwLock<RegistryState>,
}

impl StaticCloudRegistry {
    pub fn new(clouds: Vec<CloudDescriptor>, default_cloud: Option<String>) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                clouds,
                default_cloud,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.clouds.clone(), config.default_cloud.clone())
    }

    /// Adds `cloud` or replaces the entry with the same name. Returns whether
    /// the registry changed.
    pub fn upsert(&self, cloud: CloudDescriptor) -> bool {
        let mut state = write(&self.state);
        match state.clouds.iter_mut().find(|existing| existing.name == cloud.name) {
            Some(existing) if *existing == cloud => false,
            Some(existing) => {
                *existing = cloud;
                true
            }
            None => {
                state.clouds.push(cloud);
                true
            }
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut state = write(&self.state);
        let before = state.clouds.len();
        state.clouds.retain(|cloud| cloud.name != name);
        if state.default_cloud.as_deref() == Some(name) {
            state.default_cloud = None;
        }
        state.clouds.len() != before
    }

    pub fn set_default_cloud(&self, name: Option<String>) {
        write(&self.state).default_cloud = name;
    }
}

impl CloudRegistryPort for StaticCloudRegistry {
    fn get(&self, name: &str) -> Option<CloudDescriptor> {
        read(&self.state)
            .clouds
            .iter()
            .find(|cloud| cloud.name == name)
            .cloned()
    }

    fn list(&self) -> Vec<CloudDescriptor> {
        read(&self.state).clouds.clone()
    }

    fn default_cloud(&self) -> Option<CloudDescriptor> {
        let state = read(&self.state);
        match state.default_cloud.as_deref() {
            Some(name) => state.clouds.iter().find(|cloud| cloud.name == name).cloned(),
            None => match state.clouds.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            },
        }
    }
}
