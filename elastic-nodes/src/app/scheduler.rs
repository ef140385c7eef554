// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::app::computer::NodeComputer;
use crate::app::ports::ClockPort;
use crate::app::retention::NodeLifecycle;
use crate::app::services::locks::lock;

struct Registration {
    computer: Arc<NodeComputer>,
    strategy: Arc<dyn NodeLifecycle>,
    next_check: OffsetDateTime,
}

/// Drives the lifecycle policy of every registered computer, honouring the
/// delay each check asks for.
pub struct RetentionScheduler {
    clock: Arc<dyn ClockPort>,
    registrations: Mutex<HashMap<String, Registration>>,
}

impl RetentionScheduler {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            clock,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `computer`, replacing any previous registration of the same
    /// node. The first check is due immediately.
    pub fn register(&self, computer: Arc<NodeComputer>, strategy: Arc<dyn NodeLifecycle>) {
        let name = computer.name().to_string();
        let next_check = self.clock.now_utc();
        lock(&self.registrations).insert(
            name,
            Registration {
                computer,
                strategy,
                next_check,
            },
        );
    }

    pub fn unregister(&self, node_name: &str) -> bool {
        lock(&self.registrations).remove(node_name).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.registrations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every check that is due and returns how many ran.
    pub async fn tick(&self) -> usize {
        let now = self.clock.now_utc();
        let due: Vec<(String, Arc<NodeComputer>, Arc<dyn NodeLifecycle>)> =
            lock(&self.registrations)
                .iter()
                .filter(|(_, registration)| registration.next_check <= now)
                .map(|(name, registration)| {
                    (
                        name.clone(),
                        registration.computer.clone(),
                        registration.strategy.clone(),
                    )
                })
                .collect();

        for (name, computer, strategy) in &due {
            let minutes = strategy.check(computer).await;
            let next_check = self.clock.now_utc() + time::Duration::minutes(i64::from(minutes));
            if let Some(registration) = lock(&self.registrations).get_mut(name) {
                // Skip registrations replaced while the check ran.
                if Arc::ptr_eq(&registration.computer, computer) {
                    registration.next_check = next_check;
                }
            }
        }
        due.len()
    }

    /// Ticks every `interval` until the returned task is aborted.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let checked = self.tick().await;
                if checked > 0 {
                    tracing::trace!(checked, "retention checks ran");
                }
            }
        })
    }
}
