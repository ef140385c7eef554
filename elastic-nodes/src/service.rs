// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::adapters::registry::StaticCloudRegistry;
use crate::adapters::remote::RemoteClientCache;
use crate::adapters::time::SystemClock;
use crate::app::computer::NodeComputer;
use crate::app::context::LifecycleContext;
use crate::app::listener::{ComputerListener, NodeRemovalListener};
use crate::app::node::ElasticNode;
use crate::app::ports::{
    AgentConnectionPort, BuildQueryPort, ClockPort, OperatorAlertPort, ProvisionerPort,
    RemoteClientFactory,
};
use crate::app::retention::RetentionStrategy;
use crate::app::scheduler::RetentionScheduler;
use crate::app::termination::{TerminationQueue, TerminationWorker};
use crate::app::types::CloudDescriptor;
use crate::config::Config;

/// Host-side collaborators the lifecycle core calls into.
pub struct Collaborators {
    pub factory: Arc<dyn RemoteClientFactory>,
    pub provisioner: Arc<dyn ProvisionerPort>,
    pub builds: Arc<dyn BuildQueryPort>,
    pub connection: Arc<dyn AgentConnectionPort>,
    pub alerts: Arc<dyn OperatorAlertPort>,
}

/// Owns the cloud registry, the client cache, the termination worker and
/// the retention scheduler for one orchestrator.
pub struct LifecycleService {
    registry: Arc<StaticCloudRegistry>,
    clients: RemoteClientCache,
    context: LifecycleContext,
    connection: Arc<dyn AgentConnectionPort>,
    terminations: TerminationQueue,
    scheduler: Arc<RetentionScheduler>,
    listener: NodeRemovalListener,
    worker: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl LifecycleService {
    /// Wires the core from `config` and starts its background tasks on the
    /// current tokio runtime.
    pub fn start(config: &Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            factory,
            provisioner,
            builds,
            connection,
            alerts,
        } = collaborators;
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let registry = Arc::new(StaticCloudRegistry::from_config(config));
        let clients = RemoteClientCache::new(registry.clone(), factory);
        let context = LifecycleContext::new(
            registry.clone(),
            Arc::new(clients.clone()),
            provisioner,
            builds,
            clock.clone(),
        );
        let (terminations, worker) = TerminationWorker::spawn(config.retry_policy(), alerts);
        let scheduler = Arc::new(RetentionScheduler::new(clock));
        let ticker = scheduler.clone().spawn(config.retention_check_interval());
        tracing::info!(
            clouds = config.clouds.len(),
            check_interval_secs = config.retention_check_interval_secs,
            "elastic node lifecycle started"
        );

        Self {
            registry,
            clients,
            context,
            connection,
            terminations,
            scheduler,
            listener: NodeRemovalListener::new(),
            worker,
            ticker,
        }
    }

    /// Context new nodes are built with.
    pub fn context(&self) -> LifecycleContext {
        self.context.clone()
    }

    pub fn registry(&self) -> &Arc<StaticCloudRegistry> {
        &self.registry
    }

    pub fn clients(&self) -> &RemoteClientCache {
        &self.clients
    }

    /// Creates the computer of `node` and puts it under retention checks.
    pub fn attach(&self, node: Arc<ElasticNode>) -> Arc<NodeComputer> {
        let strategy = Arc::new(RetentionStrategy::for_node(&node));
        let computer = Arc::new(NodeComputer::new(
            node,
            self.connection.clone(),
            self.terminations.clone(),
        ));
        self.scheduler.register(computer.clone(), strategy);
        computer
    }

    pub fn detach(&self, node_name: &str) -> bool {
        self.scheduler.unregister(node_name)
    }

    pub fn attached(&self) -> usize {
        self.scheduler.len()
    }

    /// Forwards an offline transition reported by the orchestrator.
    pub async fn node_offline(&self, computer: &NodeComputer) {
        computer.mark_offline();
        self.listener.on_offline(computer).await;
    }

    /// Adds or edits a cloud and drops any client holding stale credentials.
    pub async fn update_cloud(&self, cloud: CloudDescriptor) {
        let name = cloud.name.clone();
        if self.registry.upsert(cloud) {
            self.clients.remove_client(&name).await;
        }
    }

    pub async fn remove_cloud(&self, name: &str) -> bool {
        let removed = self.registry.remove(name);
        self.clients.remove_client(name).await;
        removed
    }

    /// Stops retention checks and pending retries and drops every client.
    pub async fn shutdown(self) {
        self.ticker.abort();
        self.worker.abort();
        self.clients.clear().await;
        tracing::info!("elastic node lifecycle stopped");
    }
}
