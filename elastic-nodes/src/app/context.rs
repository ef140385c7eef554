// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use crate::app::ports::{
    BuildQueryPort, ClientProviderPort, ClockPort, CloudRegistryPort, ProvisionerPort,
};

/// Collaborators shared by every node of one orchestrator.
#[derive(Clone)]
pub struct LifecycleContext {
    pub(crate) clouds: Arc<dyn CloudRegistryPort>,
    pub(crate) clients: Arc<dyn ClientProviderPort>,
    pub(crate) provisioner: Arc<dyn ProvisionerPort>,
    pub(crate) builds: Arc<dyn BuildQueryPort>,
    pub(crate) clock: Arc<dyn ClockPort>,
}

impl LifecycleContext {
    pub fn new(
        clouds: Arc<dyn CloudRegistryPort>,
        clients: Arc<dyn ClientProviderPort>,
        provisioner: Arc<dyn ProvisionerPort>,
        builds: Arc<dyn BuildQueryPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            clouds,
            clients,
            provisioner,
            builds,
            clock,
        }
    }

    pub fn clock(&self) -> &dyn ClockPort {
        self.clock.as_ref()
    }
}
