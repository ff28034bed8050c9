// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! The file holds one [`InputConfig`] in YAML, TOML or JSON, chosen by
//! extension. Environment variables prefixed with `UABRIDGE_` override file
//! values; nested keys use a double underscore:
//!
//! ```text
//! UABRIDGE_ENDPOINT=opc.tcp://plc:4840
//! UABRIDGE_CREDENTIALS__PASSWORD=secret
//! UABRIDGE_REQUEST_TIMEOUT=5s
//! ```

use std::path::Path;

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};
use uabridge_opcua::InputConfig;

use crate::error::{BinError, BinResult};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "UABRIDGE";

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Determines the format from the file extension.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(BinError::config(format!(
                "unsupported configuration format '.{}'",
                other
            ))),
            None => Err(BinError::config(format!(
                "cannot determine format of '{}' (no extension)",
                path.display()
            ))),
        }
    }

    fn file_format(self) -> FileFormat {
        match self {
            Self::Yaml => FileFormat::Yaml,
            Self::Toml => FileFormat::Toml,
            Self::Json => FileFormat::Json,
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads and validates an [`InputConfig`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader reading `UABRIDGE_` overrides.
    pub fn new() -> Self {
        Self {
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Disables environment overrides.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Loads the configuration file at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> BinResult<InputConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(BinError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let config = self
            .load_from_str(&content, format)
            .map_err(|e| e.with_context(path.display().to_string()))?;

        debug!(
            endpoint = %config.endpoint,
            nodes = config.node_ids.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads a configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> BinResult<InputConfig> {
        self.finish(Config::builder().add_source(File::from_str(content, format.file_format())))
    }

    fn finish(
        &self,
        mut builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> BinResult<InputConfig> {
        if let Some(ref prefix) = self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: InputConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Loads a configuration file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> BinResult<InputConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================
