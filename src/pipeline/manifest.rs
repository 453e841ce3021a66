//! Manifest of bundle name → current physical filename.
//!
//! Owned by one pipeline and carried across watch-mode cycles. Keys only
//! accumulate; a bundle recorded once stays until [`ManifestTracker::reset`].

use std::collections::BTreeMap;

use crate::utils;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestTracker {
    entries: BTreeMap<String, String>,
}

impl ManifestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tracker from its external `name.js`-keyed form.
    pub fn from_logical_map(map: &BTreeMap<String, String>) -> Self {
        Self {
            entries: map
                .iter()
                .map(|(logical, filename)| (utils::normalize_bundle_name(logical), filename.clone()))
                .collect(),
        }
    }

    /// Record the filename of a bundle. Returns the previous filename, if any.
    pub fn record_or_update(&mut self, bundle_name: &str, filename: impl Into<String>) -> Option<String> {
        self.entries.insert(bundle_name.to_string(), filename.into())
    }

    /// `None` while the bundle is unresolved.
    pub fn current_filename_of(&self, bundle_name: &str) -> Option<&str> {
        self.entries.get(bundle_name).map(String::as_str)
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }

    /// External form: `vendor.js` → `vendor.<hash>.js`.
    pub fn logical_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(name, filename)| (utils::default_filename(name), filename.clone()))
            .collect()
    }

    /// Every recorded bundle except `bundle_name`.
    pub fn paths_except(&self, bundle_name: &str) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter(|(name, _)| name.as_str() != bundle_name)
            .map(|(name, filename)| (name.clone(), filename.clone()))
            .collect()
    }

    pub fn contains(&self, bundle_name: &str) -> bool {
        self.entries.contains_key(bundle_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every recorded bundle.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
