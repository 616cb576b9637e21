//! # Service Configuration
//!
//! `AppConfig` is read from a YAML file (`config/config.yaml` by default).
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ```yaml
//! server:
//!   addr: "0.0.0.0:8080"
//!   spec_endpoint: /swagger.json
//!   stack_size: 0x4000
//! spec:
//!   base_document: doc/swagger.yml
//!   base_path: /api/v1
//! validation:
//!   responses: true
//!   schema_cache: true
//! ```
//!
//! ## Environment Overrides
//!
//! Applied after the file is read:
//!
//! - `SWAGGERWARE_ADDR`
//! - `SWAGGERWARE_SPEC_ENDPOINT`
//! - `SWAGGERWARE_BASE_PATH`
//! - `SWAGGERWARE_SCHEMA_CACHE` (`off` disables the compiled-validator cache)
//! - `SWAGGERWARE_STACK_SIZE` (decimal or `0x` hexadecimal bytes)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

/// Coroutine stack size used when none is configured (16 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Path the merged specification is served on
    pub spec_endpoint: String,
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            spec_endpoint: "/swagger.json".to_string(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecConfig {
    /// Base Swagger document: info, definitions, security definitions
    pub base_document: PathBuf,
    pub base_path: String,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            base_document: PathBuf::from("doc/swagger.yml"),
            base_path: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Replace non-conforming responses with a 500. When false they are only logged.
    pub responses: bool,
    pub schema_cache: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            responses: true,
            schema_cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub spec: SpecConfig,
    pub validation: ValidationConfig,
}

impl AppConfig {
    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `SWAGGERWARE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("SWAGGERWARE_ADDR") {
            self.server.addr = addr;
        }
        if let Some(endpoint) = lookup("SWAGGERWARE_SPEC_ENDPOINT") {
            self.server.spec_endpoint = endpoint;
        }
        if let Some(base_path) = lookup("SWAGGERWARE_BASE_PATH") {
            self.spec.base_path = base_path;
        }
        if let Some(cache) = lookup("SWAGGERWARE_SCHEMA_CACHE") {
            self.validation.schema_cache = !matches!(
                cache.trim().to_lowercase().as_str(),
                "off" | "false" | "0"
            );
        }
        if let Some(size) = lookup("SWAGGERWARE_STACK_SIZE") {
            self.server.stack_size = parse_stack_size(&size).unwrap_or(DEFAULT_STACK_SIZE);
        }
    }
}

/// Parse a byte count given in decimal or `0x` hexadecimal.
#[must_use]
pub fn parse_stack_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn deserialize_stack_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => parse_stack_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size `{s}`"))),
    }
}
