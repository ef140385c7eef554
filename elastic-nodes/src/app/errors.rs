// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;

use crate::app::ports::{RemoteError, RemoteStatus};

pub mod codes {
    pub const AUTHENTICATION_FAILURE: &str = "authentication_failure";
    pub const INSTANCE_UNREACHABLE: &str = "instance_unreachable";
    pub const CLOUD_NOT_FOUND: &str = "cloud_not_found";
    pub const INVALID_CLOUD: &str = "invalid_cloud";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const REMOTE_ERROR: &str = "remote_error";
    pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Cloud unresolved, instance unbound or bound to another endpoint.
    Unreachable,
    NotFound,
    Conflict,
    Unauthorized,
    /// Any other remote failure, including transport errors.
    Remote,
    InvalidArgument,
    /// Every retry failed; an operator was alerted.
    RetriesExhausted,
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
    context: Option<String>,
    status: Option<u16>,
}

impl AppError {
    pub fn with_message(
        kind: AppErrorKind,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: None,
            status: None,
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::with_message(
            AppErrorKind::Unreachable,
            codes::INSTANCE_UNREACHABLE,
            message,
        )
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == AppErrorKind::NotFound
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind == AppErrorKind::Unreachable
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{} ({})", self.message, ctx)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for AppError {}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        let (kind, code) = match err.class() {
            RemoteStatus::Conflict => (AppErrorKind::Conflict, codes::CONFLICT),
            RemoteStatus::NotFound => (AppErrorKind::NotFound, codes::NOT_FOUND),
            RemoteStatus::Unauthorized => {
                (AppErrorKind::Unauthorized, codes::AUTHENTICATION_FAILURE)
            }
            RemoteStatus::Other => (AppErrorKind::Remote, codes::REMOTE_ERROR),
        };
        Self {
            kind,
            code,
            message: err.to_string(),
            context: None,
            status: err.status,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
