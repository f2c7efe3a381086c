// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for an llmbox gateway, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Yandex Cloud service-account credentials and IAM endpoint
// - Assertion/token lifetimes and the expiry safety buffer
// - Background renewal cadence
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;

use super::credentials::{CredentialError, CredentialPolicy, KeyMaterial};

pub const API_VERSION: &str = "llmbox/v1";
pub const KIND: &str = "GatewayConfig";

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "llmbox/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    /// Service-account credentials for the IAM token flow
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Authorized key identifier (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Service account that owns the key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_id: Option<String>,

    /// PEM private key (supports "env:VAR_NAME"; quotes and literal \n are tolerated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// IAM endpoint that exchanges a signed assertion for a bearer token
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_lifetime")]
    pub assertion_lifetime_seconds: u64,

    #[serde(default = "default_lifetime")]
    pub token_lifetime_seconds: u64,

    /// Margin subtracted from every expiry before a credential is handed out
    #[serde(default = "default_expiry_buffer")]
    pub expiry_buffer_seconds: u64,

    #[serde(default)]
    pub renewal: RenewalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay before the first proactive renewal
    #[serde(default = "default_renewal_interval")]
    pub initial_delay_seconds: u64,

    /// Delay between successful renewals
    #[serde(default = "default_renewal_interval")]
    pub interval_seconds: u64,

    /// First retry delay after a failed renewal; doubles per consecutive failure
    #[serde(default = "default_retry_base")]
    pub retry_base_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_token_endpoint() -> String {
    "https://iam.api.cloud.yandex.net/iam/v1/tokens".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_lifetime() -> u64 {
    3600
}

fn default_expiry_buffer() -> u64 {
    60
}

fn default_renewal_interval() -> u64 {
    3000
}

fn default_retry_base() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            service_account_id: None,
            private_key: None,
            token_endpoint: default_token_endpoint(),
            request_timeout_seconds: default_request_timeout(),
            assertion_lifetime_seconds: default_lifetime(),
            token_lifetime_seconds: default_lifetime(),
            expiry_buffer_seconds: default_expiry_buffer(),
            renewal: RenewalConfig::default(),
        }
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_seconds: default_renewal_interval(),
            interval_seconds: default_renewal_interval(),
            retry_base_seconds: default_retry_base(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "llmbox".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl CredentialsConfig {
    /// Resolve `env:` references and build normalized key material.
    pub fn key_material(&self) -> anyhow::Result<KeyMaterial> {
        let key_id = resolve_value(&self.key_id)?;
        let service_account_id = resolve_value(&self.service_account_id)?;
        let private_key = resolve_value(&self.private_key)?;
        Ok(KeyMaterial::new(key_id, service_account_id, private_key)?)
    }

    pub fn policy(&self) -> Result<CredentialPolicy, CredentialError> {
        Ok(CredentialPolicy {
            assertion_lifetime: seconds_field("assertion_lifetime_seconds", self.assertion_lifetime_seconds)?,
            token_lifetime: seconds_field("token_lifetime_seconds", self.token_lifetime_seconds)?,
            expiry_buffer: seconds_field("expiry_buffer_seconds", self.expiry_buffer_seconds)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Copy safe to print: inline private keys are replaced, `env:` references kept.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.private_key = copy.private_key.map(|k| {
            if k.starts_with("env:") {
                k
            } else {
                "<redacted>".to_string()
            }
        });
        copy
    }
}

/// Longest accepted lifetime or buffer (30 days)
pub const MAX_DURATION_SECONDS: u64 = 30 * 24 * 3600;

fn seconds_field(name: &str, value: u64) -> Result<TimeDelta, CredentialError> {
    if value > MAX_DURATION_SECONDS {
        return Err(CredentialError::Configuration(format!(
            "{} ({}) exceeds the maximum of {} seconds",
            name, value, MAX_DURATION_SECONDS
        )));
    }
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| CredentialError::Configuration(format!("{} is out of range: {}", name, value)))
}

/// Resolve a config value (supports "env:VAR_NAME" syntax)
fn resolve_value(value: &Option<String>) -> anyhow::Result<String> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(v.clone()),
        },
        None => Ok(String::new()),
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. LLMBOX_CONFIG_PATH environment variable
    /// 2. ./llmbox-config.yaml (working directory)
    /// 3. ~/.llmbox/config.yaml (user home)
    /// 4. /etc/llmbox/config.yaml (system, Unix) or C:\ProgramData\llmbox\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LLMBOX_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./llmbox-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".llmbox").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/llmbox/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\llmbox\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration.
    /// Variable names match what container deployments already export.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = &mut self.spec.credentials;

        if let Some(val) = lookup("YANDEX_KEY_ID").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: YANDEX_KEY_ID");
            credentials.key_id = Some(val);
        }
        if let Some(val) = lookup("YANDEX_SERVICE_ACCOUNT_ID").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: YANDEX_SERVICE_ACCOUNT_ID");
            credentials.service_account_id = Some(val);
        }
        if let Some(val) = lookup("YANDEX_PRIVATE_KEY").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: YANDEX_PRIVATE_KEY");
            credentials.private_key = Some(val);
        }
        if let Some(val) = lookup("YANDEX_IAM_TOKEN_URL").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: YANDEX_IAM_TOKEN_URL={}", val);
            credentials.token_endpoint = val;
        }

        let log_level = lookup("LOG_LEVEL").filter(|v| !v.is_empty());
        // LOG_FORMAT may still hold a logging pattern string from older deployments
        let log_format = lookup("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .map(|v| v.to_lowercase())
            .filter(|v| {
                let known = v == "text" || v == "json";
                if !known {
                    tracing::warn!("Ignoring LOG_FORMAT override: '{}' is not 'text' or 'json'", v);
                }
                known
            });
        if log_level.is_some() || log_format.is_some() {
            let logging = self
                .spec
                .observability
                .get_or_insert_with(ObservabilityConfig::default)
                .logging
                .get_or_insert_with(LoggingConfig::default);
            if let Some(level) = log_level {
                logging.level = level.to_lowercase();
            }
            if let Some(format) = log_format {
                logging.format = format;
            }
        }
    }

    /// Effective logging settings
    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.clone())
            .unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let credentials = &self.spec.credentials;

        let mut missing = Vec::new();
        if credentials.key_id.as_deref().map_or(true, str::is_empty) {
            missing.push("key_id");
        }
        if credentials.service_account_id.as_deref().map_or(true, str::is_empty) {
            missing.push("service_account_id");
        }
        if credentials.private_key.as_deref().map_or(true, str::is_empty) {
            missing.push("private_key");
        }
        if !missing.is_empty() {
            anyhow::bail!("spec.credentials is missing: {}", missing.join(", "));
        }

        if !(credentials.token_endpoint.starts_with("https://")
            || credentials.token_endpoint.starts_with("http://"))
        {
            anyhow::bail!(
                "spec.credentials.token_endpoint must be an http(s) URL: '{}'",
                credentials.token_endpoint
            );
        }

        if credentials.request_timeout_seconds == 0 {
            anyhow::bail!("spec.credentials.request_timeout_seconds must be greater than zero");
        }

        credentials.policy()?;

        let buffer = credentials.expiry_buffer_seconds;
        if buffer >= credentials.assertion_lifetime_seconds {
            anyhow::bail!(
                "expiry_buffer_seconds ({}) must be shorter than assertion_lifetime_seconds ({})",
                buffer,
                credentials.assertion_lifetime_seconds
            );
        }
        if buffer >= credentials.token_lifetime_seconds {
            anyhow::bail!(
                "expiry_buffer_seconds ({}) must be shorter than token_lifetime_seconds ({})",
                buffer,
                credentials.token_lifetime_seconds
            );
        }

        let renewal = &credentials.renewal;
        if renewal.enabled {
            if renewal.interval_seconds == 0 || renewal.retry_base_seconds == 0 {
                anyhow::bail!("renewal interval_seconds and retry_base_seconds must be greater than zero");
            }
            let usable_window = credentials
                .token_lifetime_seconds
                .min(credentials.assertion_lifetime_seconds)
                - buffer;
            if renewal.interval_seconds >= usable_window {
                anyhow::bail!(
                    "renewal.interval_seconds ({}) must fire before credentials go stale ({}s)",
                    renewal.interval_seconds,
                    usable_window
                );
            }
            if renewal.initial_delay_seconds >= usable_window {
                anyhow::bail!(
                    "renewal.initial_delay_seconds ({}) must fire before credentials go stale ({}s)",
                    renewal.initial_delay_seconds,
                    usable_window
                );
            }
            if renewal.retry_base_seconds > renewal.interval_seconds {
                anyhow::bail!("renewal.retry_base_seconds cannot exceed renewal.interval_seconds");
            }
        }

        let logging = self.logging();
        if logging.format != "text" && logging.format != "json" {
            anyhow::bail!("Invalid log format: '{}'. Must be 'text' or 'json'", logging.format);
        }

        Ok(())
    }
}
