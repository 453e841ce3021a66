//! Runtime loader configuration and its textual patch.
//!
//! The config is embedded in the entry bundle as executable script, not as
//! a data document. `baseUrl` must fall back to a load-time override
//! variable when one is defined, which JSON cannot express, so the
//! serialized block is patched after serialization.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::BundleError;

/// Global that overrides `baseUrl` at load time when defined.
pub const BASE_URL_OVERRIDE: &str = "REQUIREJS_BASE_URL";

/// Module ids of one bundle, split by origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMembership {
    /// Modules defined directly by the consumer.
    #[serde(default)]
    pub user: Vec<String>,
    /// Modules pulled from dependencies.
    #[serde(default)]
    pub package: Vec<String>,
}

/// `requirejs.config(...)` payload of the entry bundle.
///
/// Maps are ordered so the serialized block (and with it the entry digest)
/// does not depend on the order bundles were produced in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub bundles: BTreeMap<String, BundleMembership>,
    /// Logical bundle name → physical filename.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
    /// Fields the assembler does not interpret. Serialized after the rest.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LoaderConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }
}

fn base_url_pair() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Top-level field of the 2-space pretty form, string value only.
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?m)^  "baseUrl": ("(?:[^"\\]|\\.)*")"#).expect("baseUrl pattern is valid")
    })
}

/// Rewrite the first top-level `"baseUrl": "<value>"` pair into a runtime
/// fallback on [`BASE_URL_OVERRIDE`]. Text that was already patched, or has
/// no string `baseUrl`, is returned unchanged.
pub fn patch_base_url(serialized: &str) -> String {
    base_url_pair()
        .replacen(serialized, 1, |caps: &Captures<'_>| {
            format!(
                "  \"baseUrl\": typeof {o} !== \"undefined\" ? {o} : {fallback}",
                o = BASE_URL_OVERRIDE,
                fallback = &caps[1]
            )
        })
        .into_owned()
}

/// Unpatched `requirejs.config({...});` text.
pub fn serialize_config(config: &LoaderConfig) -> Result<String, BundleError> {
    let json = serde_json::to_string_pretty(config)?;
    Ok(format!("requirejs.config({json});"))
}

/// The config block exactly as it is embedded in the entry artifact.
pub fn render_config_block(config: &LoaderConfig) -> Result<String, BundleError> {
    Ok(patch_base_url(&serialize_config(config)?))
}
