// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::app::termination::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF, RetryPolicy};
use crate::app::types::CloudDescriptor;

const APP_DIR_NAME: &str = "elastic-nodes";
const CONFIG_FILE_NAME: &str = "elastic-nodes.toml";
pub const CONFIG_ENV_VAR: &str = "ELASTIC_NODES_CONFIG_PATH";
pub const DEFAULT_RETENTION_TIME: u32 = 30;
pub const DEFAULT_RETENTION_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct FileCloud {
    name: String,
    endpoint_url: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    retention_time: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    clouds: Vec<FileCloud>,
    default_cloud: Option<String>,
    retention_check_interval_secs: Option<u64>,
    terminate_retry_attempts: Option<u32>,
    terminate_retry_backoff_secs: Option<u64>,
    verbose: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub clouds: Vec<CloudDescriptor>,
    pub default_cloud: Option<String>,
    pub retention_check_interval_secs: u64,
    pub terminate_retry_attempts: u32,
    pub terminate_retry_backoff_secs: u64,
    pub verbose: bool,
    pub config_path: Option<PathBuf>,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.terminate_retry_attempts,
            backoff: Duration::from_secs(self.terminate_retry_backoff_secs),
        }
    }

    pub fn retention_check_interval(&self) -> Duration {
        Duration::from_secs(self.retention_check_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub cloud_count: usize,
    pub default_cloud: ConfigValue<Option<String>>,
    pub retention_check_interval_secs: ConfigValue<u64>,
    pub terminate_retry_attempts: ConfigValue<u32>,
    pub terminate_retry_backoff_secs: ConfigValue<u64>,
    pub verbose: ConfigValue<bool>,
}

impl ConfigReport {
    pub fn log(&self) {
        match (&self.config_path, self.config_path_source) {
            (Some(path), Some(source)) => tracing::info!(
                path = %path.display(),
                source = source.as_str(),
                present = self.config_file_present,
                "config path"
            ),
            (Some(path), None) => tracing::info!(
                path = %path.display(),
                present = self.config_file_present,
                "config path"
            ),
            (None, _) => tracing::info!("config path: (none)"),
        }
        tracing::info!(count = self.cloud_count, "config clouds");
        tracing::info!(
            value = self.default_cloud.value.as_deref().unwrap_or("(none)"),
            source = self.default_cloud.source.as_str(),
            "config default_cloud"
        );
        tracing::info!(
            value = self.retention_check_interval_secs.value,
            source = self.retention_check_interval_secs.source.as_str(),
            "config retention_check_interval_secs"
        );
        tracing::info!(
            value = self.terminate_retry_attempts.value,
            source = self.terminate_retry_attempts.source.as_str(),
            "config terminate_retry_attempts"
        );
        tracing::info!(
            value = self.terminate_retry_backoff_secs.value,
            source = self.terminate_retry_backoff_secs.source.as_str(),
            "config terminate_retry_backoff_secs"
        );
        tracing::info!(
            value = self.verbose.value,
            source = self.verbose.source.as_str(),
            "config verbose"
        );
    }
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub default_cloud: Option<String>,
    pub retention_check_interval_secs: Option<u64>,
    pub terminate_retry_attempts: Option<u32>,
    pub terminate_retry_backoff_secs: Option<u64>,
    pub verbose: Option<bool>,
}

pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

/// Picks the value from the first layer that has one.
fn layered<T>(overridden: Option<T>, from_file: Option<T>, default: T) -> (T, ConfigSource) {
    match (overridden, from_file) {
        (Some(value), _) => (value, ConfigSource::Override),
        (None, Some(value)) => (value, ConfigSource::ConfigFile),
        (None, None) => (default, ConfigSource::Default),
    }
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };

    let clouds = build_clouds(file_config.clouds)?;

    let (default_cloud, default_cloud_source) = match overrides.default_cloud {
        Some(name) => (Some(name), ConfigSource::Override),
        None => match file_config.default_cloud {
            Some(name) => (Some(name), ConfigSource::ConfigFile),
            None => (None, ConfigSource::Default),
        },
    };
    let default_cloud = default_cloud
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if let Some(name) = default_cloud.as_deref() {
        if !clouds.iter().any(|cloud| cloud.name == name) {
            anyhow::bail!("default_cloud '{name}' does not name a configured cloud");
        }
    }

    let (retention_check_interval_secs, retention_check_interval_source) = layered(
        overrides.retention_check_interval_secs,
        file_config.retention_check_interval_secs,
        DEFAULT_RETENTION_CHECK_INTERVAL_SECS,
    );
    if retention_check_interval_secs == 0 {
        anyhow::bail!("retention_check_interval_secs must be at least 1");
    }
    let (terminate_retry_attempts, terminate_retry_attempts_source) = layered(
        overrides.terminate_retry_attempts,
        file_config.terminate_retry_attempts,
        DEFAULT_RETRY_ATTEMPTS,
    );
    let (terminate_retry_backoff_secs, terminate_retry_backoff_source) = layered(
        overrides.terminate_retry_backoff_secs,
        file_config.terminate_retry_backoff_secs,
        DEFAULT_RETRY_BACKOFF.as_secs(),
    );
    let (verbose, verbose_source) = layered(overrides.verbose, file_config.verbose, false);

    let config = Config {
        clouds,
        default_cloud,
        retention_check_interval_secs,
        terminate_retry_attempts,
        terminate_retry_backoff_secs,
        verbose,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        cloud_count: config.clouds.len(),
        default_cloud: ConfigValue {
            value: config.default_cloud.clone(),
            source: default_cloud_source,
        },
        retention_check_interval_secs: ConfigValue {
            value: config.retention_check_interval_secs,
            source: retention_check_interval_source,
        },
        terminate_retry_attempts: ConfigValue {
            value: config.terminate_retry_attempts,
            source: terminate_retry_attempts_source,
        },
        terminate_retry_backoff_secs: ConfigValue {
            value: config.terminate_retry_backoff_secs,
            source: terminate_retry_backoff_source,
        },
        verbose: ConfigValue {
            value: config.verbose,
            source: verbose_source,
        },
    };

    Ok(LoadResult { config, report })
}

fn build_clouds(raw: Vec<FileCloud>) -> Result<Vec<CloudDescriptor>> {
    let mut seen = HashSet::new();
    let mut clouds = Vec::with_capacity(raw.len());
    for (index, cloud) in raw.into_iter().enumerate() {
        let name = cloud.name.trim().to_string();
        if name.is_empty() {
            anyhow::bail!("clouds[{index}]: name must not be blank");
        }
        let endpoint_url = cloud.endpoint_url.trim().trim_end_matches('/').to_string();
        if endpoint_url.is_empty() {
            anyhow::bail!("cloud '{name}': endpoint_url must not be blank");
        }
        if !seen.insert(name.clone()) {
            anyhow::bail!("cloud '{name}' is configured more than once");
        }
        clouds.push(CloudDescriptor {
            name,
            endpoint_url,
            username: cloud.username,
            password: cloud.password,
            retention_time: cloud.retention_time.unwrap_or(DEFAULT_RETENTION_TIME),
        });
    }
    Ok(clouds)
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
