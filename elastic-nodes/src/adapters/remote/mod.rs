// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod client_cache;

pub use client_cache::{CachedClient, RemoteClientCache};
