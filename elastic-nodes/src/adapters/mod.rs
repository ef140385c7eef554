// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod alerts;
pub mod registry;
pub mod remote;
pub mod time;
