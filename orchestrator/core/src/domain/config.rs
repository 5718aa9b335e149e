// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Defines the configuration schema for a Conduit orchestrator process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Orchestrator identity, test mode and correlation timeouts
// - Event bus dispatch mode and transport selection
// - AI provider used for intent extraction
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::event::DispatchMode;

pub const API_VERSION: &str = "conduit.dev/v1";
pub const CONFIG_KIND: &str = "OrchestratorConfig";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfigManifest {
    /// API version (must be "conduit.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OrchestratorConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfigSpec {
    #[serde(default)]
    pub orchestrator: OrchestratorSettingsConfig,

    #[serde(default)]
    pub bus: BusConfig,

    /// AI provider used for intent and parameter extraction.
    /// When absent the keyword extractor is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiProviderConfig>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettingsConfig {
    /// Identifier the orchestrator uses as event source; never routed to
    #[serde(default = "default_orchestrator_id")]
    pub id: String,

    /// Skip waiting for agent responses and synthesize a simulated result
    #[serde(default)]
    pub test_mode: bool,

    /// How long to wait for a correlated response
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub response_timeout: Duration,

    /// How long a timed-out request keeps absorbing late responses
    #[serde(default = "default_late_response_grace", with = "humantime_serde")]
    pub late_response_grace: Duration,
}

impl Default for OrchestratorSettingsConfig {
    fn default() -> Self {
        Self {
            id: default_orchestrator_id(),
            test_mode: false,
            response_timeout: default_response_timeout(),
            late_response_grace: default_late_response_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    #[serde(default)]
    pub transport: TransportKind,

    /// Per-topic buffer for the in-memory transport
    #[serde(default = "default_transport_capacity")]
    pub transport_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            transport: TransportKind::default(),
            transport_capacity: default_transport_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Local dispatch only
    #[default]
    None,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderConfig {
    /// Provider type: "openai" or "openai-compatible"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AiProviderConfig {
    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        match &self.api_key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Prometheus scrape port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_orchestrator_id() -> String {
    "orchestrator".to_string()
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_late_response_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_transport_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for OrchestratorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            metadata: ManifestMetadata {
                name: "conduit".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorConfigSpec::default(),
        }
    }
}

impl OrchestratorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONDUIT_CONFIG_PATH environment variable
    /// 2. ./conduit-config.yaml (working directory)
    /// 3. ~/.conduit/config.yaml (user home)
    /// 4. /etc/conduit/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONDUIT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./conduit-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".conduit").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/conduit/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing/invalid
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
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONDUIT_TEST_MODE") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: CONDUIT_TEST_MODE=true");
                    self.spec.orchestrator.test_mode = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: CONDUIT_TEST_MODE=false");
                    self.spec.orchestrator.test_mode = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for CONDUIT_TEST_MODE: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("CONDUIT_RESPONSE_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: CONDUIT_RESPONSE_TIMEOUT_SECS={}", secs);
                    self.spec.orchestrator.response_timeout = Duration::from_secs(secs);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONDUIT_RESPONSE_TIMEOUT_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("CONDUIT_BUS_MODE") {
            match val.parse::<DispatchMode>() {
                Ok(mode) => {
                    tracing::info!("Environment override: CONDUIT_BUS_MODE={:?}", mode);
                    self.spec.bus.mode = mode;
                }
                Err(e) => tracing::warn!("Invalid value for CONDUIT_BUS_MODE: {}. Ignoring.", e),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != CONFIG_KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, CONFIG_KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let orchestrator = &self.spec.orchestrator;
        if orchestrator.id.trim().is_empty() {
            anyhow::bail!("spec.orchestrator.id cannot be empty");
        }
        if orchestrator.response_timeout.is_zero() {
            anyhow::bail!("spec.orchestrator.response_timeout must be greater than zero");
        }

        if self.spec.bus.transport == TransportKind::InMemory && self.spec.bus.transport_capacity == 0 {
            anyhow::bail!("spec.bus.transport_capacity must be greater than zero");
        }

        if let Some(ai) = &self.spec.ai {
            match ai.provider_type.as_str() {
                "openai" | "openai-compatible" => {}
                other => anyhow::bail!("Unsupported AI provider type: {}", other),
            }
            if ai.endpoint.is_empty() {
                anyhow::bail!("AI provider endpoint cannot be empty");
            }
            if ai.model.is_empty() {
                anyhow::bail!("AI provider model cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = OrchestratorConfigManifest::default();
        assert_eq!(manifest.api_version, "conduit.dev/v1");
        assert_eq!(manifest.kind, "OrchestratorConfig");
        assert_eq!(manifest.spec.orchestrator.id, "orchestrator");
        assert_eq!(manifest.spec.orchestrator.response_timeout, Duration::from_secs(30));
        assert_eq!(manifest.spec.bus.mode, DispatchMode::Async);
        assert!(manifest.spec.ai.is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing_with_humantime_durations() {
        let yaml = r#"
apiVersion: conduit.dev/v1
kind: OrchestratorConfig
metadata:
  name: staging
spec:
  orchestrator:
    id: conduit-orchestrator
    test_mode: true
    response_timeout: 5s
    late_response_grace: 1m
  bus:
    mode: sync
    transport: in-memory
  ai:
    type: openai-compatible
    endpoint: http://localhost:1234/v1
    model: local-model
"#;
        let manifest = OrchestratorConfigManifest::from_yaml_str(yaml).unwrap();

        assert_eq!(manifest.spec.orchestrator.id, "conduit-orchestrator");
        assert!(manifest.spec.orchestrator.test_mode);
        assert_eq!(manifest.spec.orchestrator.response_timeout, Duration::from_secs(5));
        assert_eq!(manifest.spec.orchestrator.late_response_grace, Duration::from_secs(60));
        assert_eq!(manifest.spec.bus.mode, DispatchMode::Sync);
        assert_eq!(manifest.spec.bus.transport, TransportKind::InMemory);
        assert_eq!(manifest.spec.bus.transport_capacity, 256);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit-config.yaml");

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.metadata.name = "roundtrip".to_string();
        manifest.spec.orchestrator.response_timeout = Duration::from_millis(1500);
        manifest.to_yaml_file(&path).unwrap();

        let loaded = OrchestratorConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "roundtrip");
        assert_eq!(loaded.spec.orchestrator.response_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_validation() {
        let mut manifest = OrchestratorConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.orchestrator.id = "  ".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.orchestrator.id = "orchestrator".to_string();

        manifest.spec.orchestrator.response_timeout = Duration::ZERO;
        assert!(manifest.validate().is_err());
        manifest.spec.orchestrator.response_timeout = Duration::from_secs(1);

        manifest.spec.ai = Some(AiProviderConfig {
            provider_type: "carrier-pigeon".to_string(),
            endpoint: "http://localhost".to_string(),
            api_key: None,
            model: "m".to_string(),
            enabled: true,
        });
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let result = OrchestratorConfigManifest::load_or_default(Some(PathBuf::from(
            "/nonexistent/conduit-config.yaml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_resolution() {
        let mut ai = AiProviderConfig {
            provider_type: "openai".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: Some("sk-inline".to_string()),
            model: "gpt-4o-mini".to_string(),
            enabled: true,
        };
        assert_eq!(ai.resolve_api_key().unwrap(), "sk-inline");

        ai.api_key = Some("env:CONDUIT_TEST_UNSET_KEY_VAR".to_string());
        assert!(ai.resolve_api_key().is_err());

        ai.api_key = None;
        assert_eq!(ai.resolve_api_key().unwrap(), "");
    }
}
