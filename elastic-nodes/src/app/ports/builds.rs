// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::types::BuildRecord;

pub trait BuildQueryPort: Send + Sync {
    fn builds_for(&self, node_name: &str) -> Vec<BuildRecord>;
}
