// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{
    ClientProviderPort, CloudRegistryPort, RemoteClient, RemoteClientFactory, RemoteResult,
};
use crate::app::services::locks::lock;
use crate::app::types::InstanceResource;

struct CacheInner {
    clients: RwLock<HashMap<String, Arc<CachedClient>>>,
    // One creation lock per cloud name so unrelated clouds connect in parallel.
    flights: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    generation: AtomicU64,
    clouds: Arc<dyn CloudRegistryPort>,
    factory: Arc<dyn RemoteClientFactory>,
}

impl CacheInner {
    /// Removes `cloud_name` only while it still maps to the client of `generation`.
    async fn evict(&self, cloud_name: &str, generation: u64) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get(cloud_name) {
            Some(cached) if cached.generation == generation => {
                clients.remove(cloud_name);
                true
            }
            _ => false,
        }
    }
}

/// Connected clients keyed by cloud name. Clients evict themselves on any
/// authentication failure so the next lookup reconnects with current
/// credentials.
#[derive(Clone)]
pub struct RemoteClientCache {
    inner: Arc<CacheInner>,
}

impl RemoteClientCache {
    pub fn new(clouds: Arc<dyn CloudRegistryPort>, factory: Arc<dyn RemoteClientFactory>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                clients: RwLock::new(HashMap::new()),
                flights: StdMutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                clouds,
                factory,
            }),
        }
    }

    async fn cached(&self, cloud_name: &str) -> Option<Arc<CachedClient>> {
        self.inner.clients.read().await.get(cloud_name).cloned()
    }

    fn flight(&self, cloud_name: &str) -> Arc<Mutex<()>> {
        lock(&self.inner.flights)
            .entry(cloud_name.to_string())
            .or_default()
            .clone()
    }

    /// Returns the cached client for `cloud_name`, connecting a new one on a
    /// miss. A blank name yields `None`; a name the registry does not know
    /// is an error.
    pub async fn find_or_create(&self, cloud_name: &str) -> AppResult<Option<Arc<CachedClient>>> {
        if let Some(client) = self.cached(cloud_name).await {
            return Ok(Some(client));
        }

        let flight = self.flight(cloud_name);
        let _creating = flight.lock().await;
        self.purge_stale().await;

        if let Some(client) = self.cached(cloud_name).await {
            return Ok(Some(client));
        }
        if cloud_name.trim().is_empty() {
            return Ok(None);
        }
        let Some(cloud) = self.inner.clouds.get(cloud_name) else {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_CLOUD,
                format!("invalid cloud name '{cloud_name}'"),
            ));
        };

        let client = Arc::new(CachedClient {
            cloud_name: cloud.name.clone(),
            generation: self.inner.generation.fetch_add(1, Ordering::Relaxed),
            inner: self.inner.factory.build(&cloud),
            cache: Arc::downgrade(&self.inner),
        });
        client.connect().await.map_err(|err| {
            AppError::from(err).with_context(format!("connecting to cloud {cloud_name}"))
        })?;
        self.inner
            .clients
            .write()
            .await
            .insert(cloud.name.clone(), client.clone());
        tracing::debug!(cloud = %cloud.name, endpoint = %cloud.endpoint_url, "connected remote client");
        Ok(Some(client))
    }

    /// Like [`find_or_create`](Self::find_or_create) but logs failures and
    /// returns `None` instead.
    pub async fn get_client(&self, cloud_name: &str) -> Option<Arc<CachedClient>> {
        match self.find_or_create(cloud_name).await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(cloud = %cloud_name, error = %err, "error creating remote client");
                None
            }
        }
    }

    /// Looks a client up by the endpoint and credentials of a registered cloud.
    pub async fn get_client_for_credentials(
        &self,
        endpoint_url: &str,
        username: &str,
        password: &str,
    ) -> Option<Arc<CachedClient>> {
        let cloud = self
            .inner
            .clouds
            .list()
            .into_iter()
            .find(|cloud| cloud.matches_credentials(endpoint_url, username, password))?;
        self.get_client(&cloud.name).await
    }

    /// Drops the cached client of `cloud_name`, e.g. after its configuration changed.
    pub async fn remove_client(&self, cloud_name: &str) -> bool {
        self.inner
            .clients
            .write()
            .await
            .remove(cloud_name)
            .is_some()
    }

    /// Drops every client. Flights still held by a creator survive so later
    /// callers keep waiting on the same lock.
    pub async fn clear(&self) {
        self.inner.clients.write().await.clear();
        lock(&self.inner.flights).retain(|_, flight| Arc::strong_count(flight) > 1);
    }

    pub async fn len(&self) -> usize {
        self.inner.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn purge_stale(&self) {
        let clouds = &self.inner.clouds;
        let mut clients = self.inner.clients.write().await;
        clients.retain(|name, _| {
            let known = clouds.get(name).is_some();
            if !known {
                tracing::debug!(cloud = %name, "dropping client of removed cloud");
            }
            known
        });
        drop(clients);
        lock(&self.inner.flights)
            .retain(|name, flight| Arc::strong_count(flight) > 1 || clouds.get(name).is_some());
    }
}

#[async_trait]
impl ClientProviderPort for RemoteClientCache {
    async fn client_for(&self, cloud_name: &str) -> AppResult<Arc<dyn RemoteClient>> {
        match self.find_or_create(cloud_name).await? {
            Some(client) => {
                let client: Arc<dyn RemoteClient> = client;
                Ok(client)
            }
            None => Err(AppError::unreachable("no cloud is configured")),
        }
    }
}

/// Client handed out by [`RemoteClientCache`]. Evicts its own cache entry
/// whenever the control plane answers 401.
pub struct CachedClient {
    cloud_name: String,
    generation: u64,
    inner: Arc<dyn RemoteClient>,
    cache: Weak<CacheInner>,
}

impl CachedClient {
    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    async fn observe<T: Send>(&self, result: RemoteResult<T>) -> RemoteResult<T> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.evict().await;
            }
        }
        result
    }

    async fn evict(&self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        if cache.evict(&self.cloud_name, self.generation).await {
            tracing::warn!(cloud = %self.cloud_name, "authentication failed, evicted cached client");
        }
    }
}

#[async_trait]
impl RemoteClient for CachedClient {
    async fn connect(&self) -> RemoteResult<()> {
        let result = self.inner.connect().await;
        self.observe(result).await
    }

    async fn get_instance(&self, instance_id: &str) -> RemoteResult<InstanceResource> {
        let result = self.inner.get_instance(instance_id).await;
        self.observe(result).await
    }

    async fn get_profile(&self, profile_id: &str) -> RemoteResult<serde_json::Value> {
        let result = self.inner.get_profile(profile_id).await;
        self.observe(result).await
    }

    async fn terminate(&self, instance_id: &str) -> RemoteResult<()> {
        let result = self.inner.terminate(instance_id).await;
        self.observe(result).await
    }

    async fn force_terminate(&self, instance_id: &str) -> RemoteResult<()> {
        let result = self.inner.force_terminate(instance_id).await;
        self.observe(result).await
    }

    async fn delete(&self, instance_id: &str) -> RemoteResult<()> {
        let result = self.inner.delete(instance_id).await;
        self.observe(result).await
    }
}

impl std::fmt::Debug for CachedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedClient")
            .field("cloud_name", &self.cloud_name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
