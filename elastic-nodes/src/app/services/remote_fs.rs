// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};

const LINUX_SERVICE: &str = "Linux Compute";
const WINDOWS_SERVICE: &str = "Windows Compute";
const LINUX_REMOTE_FS: &str = "/var/jenkins";
const WINDOWS_REMOTE_FS: &str = "C:\\Jenkins";

/// Agent working directory for the compute service a box runs on.
pub fn for_service(service: &str) -> AppResult<&'static str> {
    match service.trim() {
        LINUX_SERVICE => Ok(LINUX_REMOTE_FS),
        WINDOWS_SERVICE => Ok(WINDOWS_REMOTE_FS),
        other => Err(AppError::with_message(
            AppErrorKind::InvalidArgument,
            codes::INVALID_ARGUMENT,
            format!("cannot create a node for a box with service '{other}'"),
        )),
    }
}
