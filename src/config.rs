use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    audit::log::{AuditLimits, DEFAULT_MAX_RECORDS, DEFAULT_RETENTION_DAYS},
    delivery::types::{DEFAULT_MAX_PER_DAY, PolicySnapshot, TransportKind},
    escalation::types::InterruptAllowance,
    sealed::ApnsEnvironment,
    transport::http_common::DEFAULT_TIMEOUT_MS,
};

const SCHEMA_FILE: &str = "hush.schema.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub sealed: SealedConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_audit_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_sealed_dir() -> PathBuf {
    PathBuf::from("./state/sealed")
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_per_day")]
    pub max_per_day: u32,
}

fn default_max_per_day() -> u32 {
    DEFAULT_MAX_PER_DAY
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_per_day: default_max_per_day(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_audit_retention_days")]
    pub retention_days: i64,
    /// Where audit snapshots live. `None` keeps every store in memory.
    #[serde(default = "default_state_dir_option")]
    pub state_dir: Option<PathBuf>,
}

fn default_state_dir_option() -> Option<PathBuf> {
    Some(default_state_dir())
}

impl AuditConfig {
    pub fn limits(&self) -> AuditLimits {
        AuditLimits::new(
            self.max_records,
            time::Duration::days(self.retention_days),
        )
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            retention_days: default_audit_retention_days(),
            state_dir: default_state_dir_option(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedConfig {
    #[serde(default = "default_sealed_dir_option")]
    pub data_dir: Option<PathBuf>,
}

fn default_sealed_dir_option() -> Option<PathBuf> {
    Some(default_sealed_dir())
}

impl Default for SealedConfig {
    fn default() -> Self {
        Self {
            data_dir: default_sealed_dir_option(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub apns: ApnsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            timeout_ms: default_timeout_ms(),
            webhook: None,
            apns: ApnsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApnsConfig {
    #[serde(default)]
    pub environment: ApnsEnvironment,
}

/// Collaborator answers the composition root uses when no external policy,
/// trust or rate-limit service is wired in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_allowance")]
    pub allowance: InterruptAllowance,
    #[serde(default = "default_max_per_day")]
    pub max_per_day: u32,
    #[serde(default = "default_enabled_true")]
    pub enabled: bool,
    #[serde(default = "default_enabled_true")]
    pub trust_baseline: bool,
    #[serde(default)]
    pub trust_fragile: bool,
}

fn default_allowance() -> InterruptAllowance {
    InterruptAllowance::Standard
}

impl PolicyConfig {
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            allowance: self.allowance,
            max_per_day: self.max_per_day,
            enabled: self.enabled,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowance: default_allowance(),
            max_per_day: default_max_per_day(),
            enabled: true,
            trust_baseline: true,
            trust_fragile: false,
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize hush config")?;
        config.resolve_paths(config_base);
        config.validate()?;

        Ok(config)
    }

    fn resolve_paths(&mut self, config_base: &Path) {
        if !self.logging.dir.is_absolute() {
            self.logging.dir = config_base.join(&self.logging.dir);
        }
        for dir in [&mut self.audit.state_dir, &mut self.sealed.data_dir]
            .into_iter()
            .flatten()
        {
            if !dir.is_absolute() {
                *dir = config_base.join(&*dir);
            }
        }
    }

    /// Cross-field checks the schema cannot express.
    fn validate(&self) -> Result<()> {
        if self.transport.kind == TransportKind::Webhook && self.transport.webhook.is_none() {
            return Err(anyhow!(
                "transport.webhook.url is required when transport.kind is webhook"
            ));
        }
        Ok(())
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join(SCHEMA_FILE);
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or {SCHEMA_FILE} next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
