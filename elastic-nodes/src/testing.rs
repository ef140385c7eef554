// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! In-memory doubles for the lifecycle ports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::app::computer::NodeComputer;
use crate::app::context::LifecycleContext;
use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::node::ElasticNode;
use crate::app::ports::{
    AgentConnectionPort, BuildQueryPort, ClientProviderPort, ClockPort, CloudRegistryPort,
    DisconnectHandle, OperatorAlertPort, ProvisionerPort, RemoteClient, RemoteClientFactory,
    RemoteError, RemoteResult, TerminationAlert,
};
use crate::app::termination::{RetryPolicy, TerminationWorker};
use crate::app::types::{
    BuildRecord, CloudDescriptor, InstanceResource, InstanceState, NodeMode, NodeRecord,
    OfflineCause, PendingLaunch,
};

pub const NODE_NAME: &str = "3f1c9a52-7d4e-4b1a-9c0f-5e2d8b7a6c13";
pub const INSTANCE_URL: &str = "https://eb.example.com/services/instances/i-42";

pub fn cloud(name: &str, endpoint_url: &str) -> CloudDescriptor {
    CloudDescriptor {
        name: name.to_string(),
        endpoint_url: endpoint_url.to_string(),
        username: "ops".to_string(),
        password: "secret".to_string(),
        retention_time: 30,
    }
}

pub fn sample_cloud() -> CloudDescriptor {
    cloud("prod", "https://eb.example.com")
}

pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(datetime!(2026-01-05 09:00 UTC)),
        }
    }

    pub fn advance(&self, by: time::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl ClockPort for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

pub struct FakeClouds {
    clouds: Mutex<Vec<CloudDescriptor>>,
}

impl FakeClouds {
    pub fn new(clouds: Vec<CloudDescriptor>) -> Self {
        Self {
            clouds: Mutex::new(clouds),
        }
    }

    /// Adds `cloud` or replaces the cloud with the same name.
    pub fn insert(&self, cloud: CloudDescriptor) {
        let mut clouds = self.clouds.lock().unwrap();
        clouds.retain(|existing| existing.name != cloud.name);
        clouds.push(cloud);
    }

    pub fn remove(&self, name: &str) {
        self.clouds.lock().unwrap().retain(|cloud| cloud.name != name);
    }
}

impl CloudRegistryPort for FakeClouds {
    fn get(&self, name: &str) -> Option<CloudDescriptor> {
        self.clouds
            .lock()
            .unwrap()
            .iter()
            .find(|cloud| cloud.name == name)
            .cloned()
    }

    fn list(&self) -> Vec<CloudDescriptor> {
        self.clouds.lock().unwrap().clone()
    }

    fn default_cloud(&self) -> Option<CloudDescriptor> {
        match self.clouds.lock().unwrap().as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

/// Remote client that replays queued results and records every call as
/// `op:argument`. Empty queues answer with success.
#[derive(Default)]
pub struct ScriptedClient {
    connect: Mutex<VecDeque<RemoteResult<()>>>,
    terminate: Mutex<VecDeque<RemoteResult<()>>>,
    instance: Mutex<VecDeque<RemoteResult<InstanceResource>>>,
    current: Mutex<Option<(InstanceState, Option<String>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&self, result: RemoteResult<()>) {
        self.connect.lock().unwrap().push_back(result);
    }

    pub fn push_terminate(&self, result: RemoteResult<()>) {
        self.terminate.lock().unwrap().push_back(result);
    }

    pub fn push_instance_error(&self, err: RemoteError) {
        self.instance.lock().unwrap().push_back(Err(err));
    }

    pub fn set_instance(&self, state: InstanceState, operation: Option<&str>) {
        *self.current.lock().unwrap() = Some((state, operation.map(str::to_string)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{op}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    fn record(&self, op: &str, argument: &str) {
        self.calls.lock().unwrap().push(format!("{op}:{argument}"));
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn connect(&self) -> RemoteResult<()> {
        self.connect.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn get_instance(&self, instance_id: &str) -> RemoteResult<InstanceResource> {
        self.record("get_instance", instance_id);
        if let Some(result) = self.instance.lock().unwrap().pop_front() {
            return result;
        }
        let (state, operation) = self
            .current
            .lock()
            .unwrap()
            .clone()
            .unwrap_or((InstanceState::Processing, None));
        Ok(InstanceResource {
            id: instance_id.to_string(),
            state,
            operation,
        })
    }

    async fn get_profile(&self, profile_id: &str) -> RemoteResult<serde_json::Value> {
        self.record("get_profile", profile_id);
        Ok(json!({ "id": profile_id }))
    }

    async fn terminate(&self, instance_id: &str) -> RemoteResult<()> {
        self.record("terminate", instance_id);
        self.terminate.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn force_terminate(&self, instance_id: &str) -> RemoteResult<()> {
        self.record("force_terminate", instance_id);
        Ok(())
    }

    async fn delete(&self, instance_id: &str) -> RemoteResult<()> {
        self.record("delete", instance_id);
        Ok(())
    }
}

/// Hands out queued clients per build, falling back to fresh ones.
#[derive(Default)]
pub struct ScriptedFactory {
    queued: Mutex<VecDeque<Arc<ScriptedClient>>>,
    built: Mutex<Vec<(String, Arc<ScriptedClient>)>>,
    builds: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, client: Arc<ScriptedClient>) {
        self.queued.lock().unwrap().push_back(client);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn built_for(&self, cloud_name: &str) -> Vec<Arc<ScriptedClient>> {
        self.built
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == cloud_name)
            .map(|(_, client)| client.clone())
            .collect()
    }
}

impl RemoteClientFactory for ScriptedFactory {
    fn build(&self, cloud: &CloudDescriptor) -> Arc<dyn RemoteClient> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let client = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(ScriptedClient::new()));
        self.built
            .lock()
            .unwrap()
            .push((cloud.name.clone(), client.clone()));
        client
    }
}

/// Serves the same client for every cloud the registry knows.
pub struct FixedClientProvider {
    clouds: Arc<FakeClouds>,
    client: Arc<ScriptedClient>,
}

#[async_trait]
impl ClientProviderPort for FixedClientProvider {
    async fn client_for(&self, cloud_name: &str) -> AppResult<Arc<dyn RemoteClient>> {
        if self.clouds.get(cloud_name).is_none() {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_CLOUD,
                format!("invalid cloud name: {cloud_name}"),
            ));
        }
        Ok(self.client.clone())
    }
}

pub struct RecordingProvisioner {
    labels: Vec<String>,
    launches: Mutex<HashMap<String, Vec<Arc<PendingLaunch>>>>,
    terminated: Mutex<Vec<String>>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self {
            labels: vec!["linux".to_string()],
            launches: Mutex::new(HashMap::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn add_launch(&self, label: &str, launch: Arc<PendingLaunch>) {
        self.launches
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push(launch);
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }
}

impl ProvisionerPort for RecordingProvisioner {
    fn capacity_labels(&self, _node: &ElasticNode) -> Vec<String> {
        self.labels.clone()
    }

    fn pending_launches(&self, label: &str) -> Vec<Arc<PendingLaunch>> {
        self.launches
            .lock()
            .unwrap()
            .get(label)
            .cloned()
            .unwrap_or_default()
    }

    fn track_terminated(&self, node: &ElasticNode) {
        self.terminated.lock().unwrap().push(node.name().to_string());
    }
}

#[derive(Default)]
pub struct FakeBuilds {
    builds: Mutex<Vec<BuildRecord>>,
}

impl FakeBuilds {
    pub fn set(&self, builds: Vec<BuildRecord>) {
        *self.builds.lock().unwrap() = builds;
    }
}

impl BuildQueryPort for FakeBuilds {
    fn builds_for(&self, _node_name: &str) -> Vec<BuildRecord> {
        self.builds.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingConnection {
    causes: Mutex<Vec<OfflineCause>>,
}

impl RecordingConnection {
    pub fn causes(&self) -> Vec<OfflineCause> {
        self.causes.lock().unwrap().clone()
    }
}

impl AgentConnectionPort for RecordingConnection {
    fn disconnect(&self, _node_name: &str, cause: &OfflineCause) -> DisconnectHandle {
        self.causes.lock().unwrap().push(cause.clone());
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<TerminationAlert>>,
}

impl RecordingAlerts {
    pub fn alerts(&self) -> Vec<TerminationAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl OperatorAlertPort for RecordingAlerts {
    fn termination_failed(&self, alert: TerminationAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

/// One cloud named `prod` and a client shared by every node.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub clouds: Arc<FakeClouds>,
    pub client: Arc<ScriptedClient>,
    pub provisioner: Arc<RecordingProvisioner>,
    pub builds: Arc<FakeBuilds>,
    pub connection: Arc<RecordingConnection>,
    pub alerts: Arc<RecordingAlerts>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new()),
            clouds: Arc::new(FakeClouds::new(vec![sample_cloud()])),
            client: Arc::new(ScriptedClient::new()),
            provisioner: Arc::new(RecordingProvisioner::new()),
            builds: Arc::new(FakeBuilds::default()),
            connection: Arc::new(RecordingConnection::default()),
            alerts: Arc::new(RecordingAlerts::default()),
        }
    }

    pub fn context(&self) -> LifecycleContext {
        LifecycleContext::new(
            self.clouds.clone(),
            Arc::new(FixedClientProvider {
                clouds: self.clouds.clone(),
                client: self.client.clone(),
            }),
            self.provisioner.clone(),
            self.builds.clone(),
            self.clock.clone(),
        )
    }

    pub fn record(&self, retention_time: u32) -> NodeRecord {
        NodeRecord {
            name: NODE_NAME.to_string(),
            description: String::new(),
            profile_id: "p-1".to_string(),
            box_version: "latest".to_string(),
            single_use: false,
            instance_url: Some(INSTANCE_URL.to_string()),
            instance_status_message: None,
            retention_time,
            cloud_name: Some("prod".to_string()),
            remote_fs: "/var/jenkins".to_string(),
            executors: 1,
            mode: NodeMode::Exclusive,
            labels: String::new(),
        }
    }

    pub fn node(&self, retention_time: u32) -> Arc<ElasticNode> {
        Arc::new(ElasticNode::from_record(
            self.record(retention_time),
            self.context(),
        ))
    }

    /// Computer for `node` plus the handle of its termination worker. The
    /// worker stops once the computer is dropped and its retries finish.
    pub fn computer(
        &self,
        node: Arc<ElasticNode>,
        policy: RetryPolicy,
    ) -> (Arc<NodeComputer>, JoinHandle<()>) {
        let (queue, worker) = TerminationWorker::spawn(policy, self.alerts.clone());
        let computer = Arc::new(NodeComputer::new(node, self.connection.clone(), queue));
        (computer, worker)
    }
}
