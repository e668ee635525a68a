//! Runtime configuration for the webhook
//!
//! Configuration is read once at startup from the environment:
//!
//! - `HNC_EXCLUDED_NAMESPACES`: comma-separated namespaces HNC never manages
//! - `HNC_MANAGED_LABELS`: `keyRegex` or `keyRegex=valueRegex` entries, separated
//!   by `;` or newlines so that commas stay usable inside a regex
//! - `HNC_MANAGED_ANNOTATIONS`: same format, for annotations

use std::collections::BTreeSet;

use regex::Regex;
use thiserror::Error;

pub const ENV_EXCLUDED_NAMESPACES: &str = "HNC_EXCLUDED_NAMESPACES";
pub const ENV_MANAGED_LABELS: &str = "HNC_MANAGED_LABELS";
pub const ENV_MANAGED_ANNOTATIONS: &str = "HNC_MANAGED_ANNOTATIONS";

/// Namespaces excluded when nothing else is configured
pub const DEFAULT_EXCLUDED_NAMESPACES: [&str; 3] = ["kube-system", "kube-public", "kube-node-lease"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}

/// An allow-list entry for managed labels or annotations.
///
/// Both regexes must match the whole string. A pattern without a value regex
/// accepts any value.
#[derive(Clone, Debug)]
pub struct MetaPattern {
    raw: String,
    key: Regex,
    value: Option<Regex>,
}

impl MetaPattern {
    /// Allow keys matching `key` with any value
    pub fn new(key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            raw: key.to_string(),
            key: anchored(key)?,
            value: None,
        })
    }

    /// Allow keys matching `key` only with values matching `value`
    pub fn with_value(key: &str, value: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            raw: format!("{}={}", key, value),
            key: anchored(key)?,
            value: Some(anchored(value)?),
        })
    }

    /// Parse `keyRegex` or `keyRegex=valueRegex`
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        match entry.split_once('=') {
            Some((key, value)) => Self::with_value(key.trim(), value.trim()),
            None => Self::new(entry.trim()),
        }
    }

    pub fn matches_key(&self, key: &str) -> bool {
        self.key.is_match(key)
    }

    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.matches_key(key) && self.value.as_ref().is_none_or(|v| v.is_match(value))
    }
}

impl std::fmt::Display for MetaPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Webhook configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Namespaces that can never be a parent or a child
    pub excluded_namespaces: BTreeSet<String>,
    /// Label keys (and values) users may ask HNC to manage
    pub managed_labels: Vec<MetaPattern>,
    /// Annotation keys (and values) users may ask HNC to manage
    pub managed_annotations: Vec<MetaPattern>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_namespaces: DEFAULT_EXCLUDED_NAMESPACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            managed_labels: Vec::new(),
            managed_annotations: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_EXCLUDED_NAMESPACES) {
            config.excluded_namespaces = split_list(&raw, &[',']).map(str::to_string).collect();
        }
        if let Some(raw) = lookup(ENV_MANAGED_LABELS) {
            config.managed_labels = parse_patterns(ENV_MANAGED_LABELS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MANAGED_ANNOTATIONS) {
            config.managed_annotations = parse_patterns(ENV_MANAGED_ANNOTATIONS, &raw)?;
        }

        Ok(config)
    }

    pub fn with_excluded_namespaces<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_namespaces = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_managed_labels(mut self, patterns: Vec<MetaPattern>) -> Self {
        self.managed_labels = patterns;
        self
    }

    pub fn with_managed_annotations(mut self, patterns: Vec<MetaPattern>) -> Self {
        self.managed_annotations = patterns;
        self
    }
}

/// Separators between pattern entries; neither is meaningful in a regex
const PATTERN_SEPARATORS: [char; 2] = [';', '\n'];

fn split_list<'a>(raw: &'a str, separators: &'a [char]) -> impl Iterator<Item = &'a str> {
    raw.split(separators).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_patterns(var: &'static str, raw: &str) -> Result<Vec<MetaPattern>, ConfigError> {
    split_list(raw, &PATTERN_SEPARATORS)
        .map(|entry| {
            MetaPattern::parse(entry).map_err(|e| ConfigError::InvalidEnv {
                var,
                reason: e.to_string(),
            })
        })
        .collect()
}
