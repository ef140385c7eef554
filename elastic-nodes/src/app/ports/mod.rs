// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod alerts;
pub mod builds;
pub mod clock;
pub mod cloud_registry;
pub mod connection;
pub mod provisioner;
pub mod remote_client;

pub use alerts::{OperatorAlertPort, TerminationAlert};
pub use builds::BuildQueryPort;
pub use clock::ClockPort;
pub use cloud_registry::CloudRegistryPort;
pub use connection::{AgentConnectionPort, DisconnectHandle};
pub use provisioner::ProvisionerPort;
pub use remote_client::{
    ClientProviderPort, RemoteClient, RemoteClientFactory, RemoteError, RemoteResult,
    RemoteStatus,
};
