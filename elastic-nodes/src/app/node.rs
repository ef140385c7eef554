// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use time::Duration;
use uuid::Uuid;

use crate::app::context::LifecycleContext;
use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::services::instance_url::{belongs_to_endpoint, page_url, resource_id};
use crate::app::services::locks::{read, write};
use crate::app::services::remote_fs;
use crate::app::types::{
    CloudDescriptor, InstanceResource, NodeConfiguration, NodeKind, NodeMode, NodeRecord,
    TerminationState,
};

pub const DEFAULT_LAUNCH_TIMEOUT_MINUTES: u32 = 60;
pub const ENVIRONMENT_MAX_LEN: usize = 30;

/// Idle span after which a node with `retention_minutes` may be terminated.
pub fn retention_window(retention_minutes: u32) -> Duration {
    Duration::minutes(i64::from(retention_minutes))
}

fn truncate_environment(value: &str) -> String {
    value.chars().take(ENVIRONMENT_MAX_LEN).collect()
}

/// One provisioned remote instance attached to the orchestrator as a worker.
pub struct ElasticNode {
    name: String,
    description: String,
    box_version: String,
    single_use: bool,
    retention_time: u32,
    cloud_name: Option<String>,
    remote_fs: String,
    executors: u32,
    mode: NodeMode,
    labels: String,
    profile_id: RwLock<String>,
    instance_url: RwLock<Option<String>>,
    instance_status_message: RwLock<Option<String>>,
    // Runtime-only state, rebuilt by `from_record`.
    in_use: AtomicBool,
    termination: AtomicU8,
    launch_timeout: u32,
    environment: String,
    ctx: LifecycleContext,
}

impl ElasticNode {
    /// Node requested by the provisioner for a profile of `cloud`.
    pub fn for_profile(
        profile_id: impl Into<String>,
        box_version: impl Into<String>,
        single_use: bool,
        cloud: &CloudDescriptor,
        box_service: &str,
        ctx: LifecycleContext,
    ) -> AppResult<Self> {
        let remote_fs = remote_fs::for_service(box_service)?;
        let name = Uuid::new_v4().to_string();
        let environment = truncate_environment(&name);
        Ok(Self {
            name,
            description: String::new(),
            box_version: box_version.into(),
            single_use,
            retention_time: cloud.retention_time,
            cloud_name: Some(cloud.name.clone()),
            remote_fs: remote_fs.to_string(),
            executors: 1,
            mode: NodeMode::Exclusive,
            labels: String::new(),
            profile_id: RwLock::new(profile_id.into()),
            instance_url: RwLock::new(None),
            instance_status_message: RwLock::new(None),
            in_use: AtomicBool::new(false),
            termination: AtomicU8::new(TerminationState::Idle as u8),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT_MINUTES,
            environment,
            ctx,
        })
    }

    /// Node described by an operator-supplied configuration.
    pub fn from_configuration(
        config: &NodeConfiguration,
        cloud: &CloudDescriptor,
        box_service: &str,
        ctx: LifecycleContext,
    ) -> AppResult<Self> {
        let remote_fs = match config.remote_fs.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => remote_fs::for_service(box_service)?.to_string(),
        };
        let name = Uuid::new_v4().to_string();
        let environment = if config.environment.trim().is_empty() {
            truncate_environment(&name)
        } else {
            truncate_environment(config.environment.trim())
        };
        Ok(Self {
            name,
            description: config.description.clone(),
            box_version: config.box_version.clone(),
            single_use: false,
            retention_time: config.retention_time,
            cloud_name: Some(cloud.name.clone()),
            remote_fs,
            executors: config.executors.max(1),
            mode: config.mode,
            labels: config.labels.clone(),
            profile_id: RwLock::new(config.profile_id.clone()),
            instance_url: RwLock::new(None),
            instance_status_message: RwLock::new(None),
            in_use: AtomicBool::new(false),
            termination: AtomicU8::new(TerminationState::Idle as u8),
            launch_timeout: if config.launch_timeout == 0 {
                DEFAULT_LAUNCH_TIMEOUT_MINUTES
            } else {
                config.launch_timeout
            },
            environment,
            ctx,
        })
    }

    /// Rebuilds a node from its persisted attributes.
    pub fn from_record(record: NodeRecord, ctx: LifecycleContext) -> Self {
        let environment = truncate_environment(&record.name);
        Self {
            name: record.name,
            description: record.description,
            box_version: record.box_version,
            single_use: record.single_use,
            retention_time: record.retention_time,
            cloud_name: record.cloud_name.filter(|name| !name.trim().is_empty()),
            remote_fs: record.remote_fs,
            executors: record.executors,
            mode: record.mode,
            labels: record.labels,
            profile_id: RwLock::new(record.profile_id),
            instance_url: RwLock::new(record.instance_url),
            instance_status_message: RwLock::new(record.instance_status_message),
            in_use: AtomicBool::new(false),
            termination: AtomicU8::new(TerminationState::Idle as u8),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT_MINUTES,
            environment,
            ctx,
        }
    }

    pub fn record(&self) -> NodeRecord {
        NodeRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            profile_id: self.profile_id(),
            box_version: self.box_version.clone(),
            single_use: self.single_use,
            instance_url: self.instance_url(),
            instance_status_message: self.instance_status_message(),
            retention_time: self.retention_time,
            cloud_name: self.cloud_name.clone(),
            remote_fs: self.remote_fs.clone(),
            executors: self.executors,
            mode: self.mode,
            labels: self.labels.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn box_version(&self) -> &str {
        &self.box_version
    }

    pub fn is_single_use(&self) -> bool {
        self.single_use
    }

    pub fn retention_time(&self) -> u32 {
        self.retention_time
    }

    pub fn cloud_name(&self) -> Option<&str> {
        self.cloud_name.as_deref()
    }

    pub fn remote_fs(&self) -> &str {
        &self.remote_fs
    }

    pub fn executors(&self) -> u32 {
        self.executors
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub fn labels(&self) -> &str {
        &self.labels
    }

    pub fn launch_timeout(&self) -> u32 {
        self.launch_timeout
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn kind(&self) -> NodeKind {
        if self.single_use {
            NodeKind::SingleUse
        } else if self.labels.trim().is_empty() {
            NodeKind::PerProject
        } else {
            NodeKind::Global
        }
    }

    pub fn profile_id(&self) -> String {
        read(&self.profile_id).clone()
    }

    pub fn set_profile_id(&self, profile_id: impl Into<String>) {
        *write(&self.profile_id) = profile_id.into();
    }

    pub fn instance_url(&self) -> Option<String> {
        read(&self.instance_url).clone()
    }

    pub fn set_instance_url(&self, instance_url: Option<String>) {
        *write(&self.instance_url) = instance_url;
    }

    pub fn instance_id(&self) -> Option<String> {
        read(&self.instance_url)
            .as_deref()
            .map(|url| resource_id(url).to_string())
    }

    pub fn instance_status_message(&self) -> Option<String> {
        read(&self.instance_status_message).clone()
    }

    pub fn set_instance_status_message(&self, message: Option<String>) {
        *write(&self.instance_status_message) = message;
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn set_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Ordering::Release);
    }

    /// Whether a terminate for the bound instance has been accepted.
    pub fn is_termination_issued(&self) -> bool {
        self.termination_state() == TerminationState::Issued
    }

    pub fn termination_state(&self) -> TerminationState {
        TerminationState::from_u8(self.termination.load(Ordering::Acquire))
    }

    /// Moves `Idle` to `InFlight`. Returns the current state when another
    /// termination owns the node.
    pub(crate) fn begin_termination(&self) -> Result<(), TerminationState> {
        self.termination
            .compare_exchange(
                TerminationState::Idle as u8,
                TerminationState::InFlight as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(TerminationState::from_u8)
    }

    pub(crate) fn finish_termination(&self, state: TerminationState) {
        self.termination.store(state as u8, Ordering::Release);
    }

    pub(crate) fn context(&self) -> &LifecycleContext {
        &self.ctx
    }

    /// Cloud this node belongs to, read from the registry on every call so
    /// endpoint edits reach the reachability check.
    pub fn cloud(&self) -> AppResult<Option<CloudDescriptor>> {
        if let Some(name) = self.cloud_name.as_deref() {
            let cloud = self.ctx.clouds.get(name).ok_or_else(|| {
                AppError::with_message(
                    AppErrorKind::NotFound,
                    codes::CLOUD_NOT_FOUND,
                    format!("cannot find any cloud named '{name}'"),
                )
            })?;
            return Ok(Some(cloud));
        }
        Ok(self.ctx.clouds.default_cloud())
    }

    pub fn check_instance_reachable(&self) -> AppResult<CloudDescriptor> {
        self.reachable_instance().map(|(cloud, _)| cloud)
    }

    /// Resolved cloud plus the bound instance id, when the instance lives on
    /// that cloud's current endpoint.
    fn reachable_instance(&self) -> AppResult<(CloudDescriptor, String)> {
        let cloud = match self.cloud() {
            Ok(Some(cloud)) => cloud,
            Ok(None) => return Err(AppError::unreachable("no cloud is configured")),
            Err(err) => {
                return Err(AppError::unreachable(err.message().to_string())
                    .with_context(format!("node {}", self.name)));
            }
        };
        let Some(url) = self.instance_url() else {
            return Err(AppError::unreachable("node does not have a deployed instance")
                .with_context(format!("node {}", self.name)));
        };
        if !belongs_to_endpoint(&url, &cloud.endpoint_url) {
            return Err(AppError::unreachable(format!(
                "instance {url} was created at a different endpoint than the one currently configured; open {url} in a browser to terminate it"
            )));
        }
        let instance_id = resource_id(&url).to_string();
        Ok((cloud, instance_id))
    }

    pub fn instance_page_url(&self) -> AppResult<String> {
        let cloud = self.check_instance_reachable()?;
        let url = self.instance_url().unwrap_or_default();
        Ok(page_url(&cloud.endpoint_url, &url))
    }

    /// Whether retention allows terminating this node after `idle_time`.
    pub fn can_terminate(&self, idle_time: Duration) -> bool {
        if self.retention_time == 0 {
            return false;
        }
        let Ok(Some(cloud)) = self.cloud() else {
            return false;
        };
        let bound = self
            .instance_url()
            .is_some_and(|url| belongs_to_endpoint(&url, &cloud.endpoint_url));
        if !bound || idle_time <= retention_window(self.retention_time) {
            return false;
        }
        !self.has_active_builds()
    }

    pub fn has_active_builds(&self) -> bool {
        self.ctx
            .builds
            .builds_for(&self.name)
            .iter()
            .any(|build| build.building)
    }

    #[tracing::instrument(
        name = "node",
        level = "debug",
        skip(self),
        fields(op = "terminate", node = %self.name)
    )]
    pub async fn terminate(&self) -> AppResult<()> {
        let (cloud, instance_id) = self.reachable_instance()?;
        let client = self.ctx.clients.client_for(&cloud.name).await?;
        match client.terminate(&instance_id).await {
            Ok(()) => {}
            Err(err) if err.is_conflict() => {
                tracing::debug!(
                    instance = %instance_id,
                    "terminate refused with conflict, forcing termination"
                );
                client.force_terminate(&instance_id).await?;
            }
            Err(err) => return Err(err.into()),
        }
        self.finish_termination(TerminationState::Issued);
        self.ctx.provisioner.track_terminated(self);
        Ok(())
    }

    pub async fn delete(&self) -> AppResult<()> {
        let (cloud, instance_id) = self.reachable_instance()?;
        let client = self.ctx.clients.client_for(&cloud.name).await?;
        client.delete(&instance_id).await?;
        Ok(())
    }

    pub async fn is_terminated(&self) -> AppResult<bool> {
        Ok(self.instance().await?.is_terminated())
    }

    pub async fn instance(&self) -> AppResult<InstanceResource> {
        let (cloud, instance_id) = self.reachable_instance()?;
        let client = self.ctx.clients.client_for(&cloud.name).await?;
        Ok(client.get_instance(&instance_id).await?)
    }

    pub async fn profile(&self) -> AppResult<serde_json::Value> {
        let (cloud, _) = self.reachable_instance()?;
        let client = self.ctx.clients.client_for(&cloud.name).await?;
        Ok(client.get_profile(&self.profile_id()).await?)
    }
}
