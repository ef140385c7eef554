// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod instance_url;
pub mod locks;
pub mod remote_fs;
