//! YAML-backed runtime configuration: correlation defaults and the performance
//! tuning knobs the surrounding loop/adapters read at startup.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CorrelationConfig {
    pub enabled: bool,
    pub window_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig { enabled: true, window_ms: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PerformanceConfig {
    pub worker_threads: usize,
    #[serde(deserialize_with = "deserialize_size", serialize_with = "serialize_size")]
    pub buffer_size: u64,
    #[serde(deserialize_with = "deserialize_size", serialize_with = "serialize_size")]
    pub memory_limit: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig { worker_threads: 4, buffer_size: 64 * 1024 * 1024, memory_limit: 1024 * 1024 * 1024 }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { correlation: CorrelationConfig::default(), performance: PerformanceConfig::default() }
    }
}

impl RuntimeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.performance.worker_threads == 0 {
            return Err(EngineError::Config("performance.worker_threads must be at least 1".into()));
        }
        if self.performance.buffer_size == 0 {
            return Err(EngineError::Config("performance.buffer_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parses a size literal like `"64MB"`, `"1GB"`, `"512KB"` or a bare integer (bytes)
/// using power-of-1024 suffixes, matching how the source pipeline's memory knobs read.
pub fn parse_size(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let upper = raw.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("GB") {
        (d, 1024u64 * 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("MB") {
        (d, 1024u64 * 1024)
    } else if let Some(d) = upper.strip_suffix("KB") {
        (d, 1024u64)
    } else {
        (upper.as_str(), 1u64)
    };
    let digits = digits.trim();
    let n: u64 = digits.parse().map_err(|_| EngineError::Config(format!("invalid size literal: {raw:?}")))?;
    Ok(n.saturating_mul(multiplier))
}

fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes != 0 && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes != 0 && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes != 0 && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        bytes.to_string()
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let raw = String::deserialize(deserializer)?;
    parse_size(&raw).map_err(D::Error::custom)
}

fn serialize_size<S>(value: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_size(*value))
}
