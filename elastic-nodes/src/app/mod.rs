// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod computer;
pub mod context;
pub mod errors;
pub mod listener;
pub mod node;
pub mod ports;
pub mod retention;
pub mod scheduler;
pub mod services;
pub mod termination;
pub mod types;
