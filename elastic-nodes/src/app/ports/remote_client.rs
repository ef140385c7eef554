// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::app::errors::AppResult;
use crate::app::types::{CloudDescriptor, InstanceResource};

pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Conflict,
    NotFound,
    Unauthorized,
    Other,
}

/// Failure reported by the cloud control plane. `status` is `None` when no
/// HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("remote request failed (status {}): {message}", status_label(.status))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |code| code.to_string())
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn class(&self) -> RemoteStatus {
        match self.status {
            Some(STATUS_CONFLICT) => RemoteStatus::Conflict,
            Some(STATUS_NOT_FOUND) => RemoteStatus::NotFound,
            Some(STATUS_UNAUTHORIZED) => RemoteStatus::Unauthorized,
            _ => RemoteStatus::Other,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == RemoteStatus::Conflict
    }

    pub fn is_unauthorized(&self) -> bool {
        self.class() == RemoteStatus::Unauthorized
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authenticated session against one cloud control plane.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn connect(&self) -> RemoteResult<()>;
    async fn get_instance(&self, instance_id: &str) -> RemoteResult<InstanceResource>;
    async fn get_profile(&self, profile_id: &str) -> RemoteResult<serde_json::Value>;
    async fn terminate(&self, instance_id: &str) -> RemoteResult<()>;
    async fn force_terminate(&self, instance_id: &str) -> RemoteResult<()>;
    async fn delete(&self, instance_id: &str) -> RemoteResult<()>;
}

/// Builds unconnected clients for a cloud's endpoint and credentials.
pub trait RemoteClientFactory: Send + Sync {
    fn build(&self, cloud: &CloudDescriptor) -> Arc<dyn RemoteClient>;
}

/// How lifecycle operations obtain a client for a named cloud.
#[async_trait]
pub trait ClientProviderPort: Send + Sync {
    async fn client_for(&self, cloud_name: &str) -> AppResult<Arc<dyn RemoteClient>>;
}
