//! Managed metadata policy
//!
//! - Keys must be valid Kubernetes qualified names
//! - Label values must be valid label values
//! - Keys under the HNC group are reserved for HNC itself
//! - Every pair must match a configured allow pattern

use super::{DenialCode, ValidationResult, reasons};
use crate::config::{Config, MetaPattern};
use crate::crd::{META_GROUP, MetaKvp};

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MetaKind {
    Label,
    Annotation,
}

impl std::fmt::Display for MetaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaKind::Label => write!(f, "label"),
            MetaKind::Annotation => write!(f, "annotation"),
        }
    }
}

/// Validate the labels and annotations a HierarchyConfiguration asks HNC to manage
pub fn validate_managed_metadata(
    config: &Config,
    labels: &[MetaKvp],
    annotations: &[MetaKvp],
) -> ValidationResult {
    let entries = labels
        .iter()
        .map(|kvp| (MetaKind::Label, &config.managed_labels, kvp))
        .chain(
            annotations
                .iter()
                .map(|kvp| (MetaKind::Annotation, &config.managed_annotations, kvp)),
        );

    for (kind, patterns, kvp) in entries {
        if let Err(message) = check_entry(kind, patterns, kvp) {
            return ValidationResult::denied(
                DenialCode::BadRequest,
                reasons::INVALID_MANAGED_METADATA,
                &message,
            );
        }
    }

    ValidationResult::allowed()
}

fn check_entry(kind: MetaKind, patterns: &[MetaPattern], kvp: &MetaKvp) -> Result<(), String> {
    validate_qualified_name(&kvp.key)
        .map_err(|why| format!("Invalid {} key {:?}: {}", kind, kvp.key, why))?;

    if kind == MetaKind::Label {
        validate_label_value(&kvp.value).map_err(|why| {
            format!("Invalid value {:?} for label {:?}: {}", kvp.value, kvp.key, why)
        })?;
    }

    if is_reserved_key(&kvp.key) {
        return Err(format!(
            "The {} {:?} uses the reserved {} prefix and can only be set by HNC itself",
            kind, kvp.key, META_GROUP
        ));
    }

    if !patterns.iter().any(|p| p.matches(&kvp.key, &kvp.value)) {
        let allowed = if patterns.is_empty() {
            "no managed keys are configured".to_string()
        } else {
            format!(
                "allowed patterns are {}",
                patterns
                    .iter()
                    .map(|p| format!("{:?}", p.to_string()))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        return Err(format!(
            "The {} {:?} with value {:?} is not a managed {}; {}",
            kind, kvp.key, kvp.value, kind, allowed
        ));
    }

    Ok(())
}

/// Whether `key` lives under the HNC group (`hnc.x-k8s.io/...` or `*.hnc.x-k8s.io/...`)
pub fn is_reserved_key(key: &str) -> bool {
    match key.split_once('/') {
        Some((prefix, _)) => {
            prefix == META_GROUP
                || prefix
                    .strip_suffix(META_GROUP)
                    .is_some_and(|rest| rest.ends_with('.'))
        }
        None => false,
    }
}

/// Validate a qualified name: an optional DNS subdomain prefix, a slash and a name
fn validate_qualified_name(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        validate_dns_subdomain(prefix).map_err(|why| format!("prefix {}", why))?;
    }
    if name.is_empty() {
        return Err("name part must not be empty".to_string());
    }
    validate_name_part(name).map_err(|why| format!("name part {}", why))
}

/// Label values may be empty; otherwise they follow the qualified name part rules
fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name_part(value)
}

fn validate_name_part(name: &str) -> Result<(), String> {
    if name.len() > MAX_NAME_LEN {
        return Err(format!("must be no more than {} characters", MAX_NAME_LEN));
    }
    let bytes = name.as_bytes();
    let alnum_ends = bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric);
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(*b, b'-' | b'_' | b'.'));
    if !alnum_ends || !valid_chars {
        return Err(
            "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
                .to_string(),
        );
    }
    Ok(())
}

fn validate_dns_subdomain(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
        return Err(format!(
            "must be between 1 and {} characters",
            MAX_PREFIX_LEN
        ));
    }
    let valid = prefix.split('.').all(|label| {
        let bytes = label.as_bytes();
        let lower_alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        bytes.first().is_some_and(lower_alnum)
            && bytes.last().is_some_and(lower_alnum)
            && bytes.iter().all(|b| lower_alnum(b) || *b == b'-')
    });
    if !valid {
        return Err(
            "must be a lowercase DNS subdomain (alphanumerics, '-' and '.')".to_string(),
        );
    }
    Ok(())
}
