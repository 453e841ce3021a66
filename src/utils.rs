//! Utility functions for the assembler.
//!
//! - Bundle name and filename normalization
//! - Module id derivation from captured paths
//! - Source root computation for emitted maps

use std::env;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Bundle Names
// ---------------------------------------------------------------------------

/// Bundle names may be given with or without the `.js` extension.
pub fn normalize_bundle_name(name: &str) -> String {
    name.strip_suffix(".js").unwrap_or(name).to_string()
}

/// The non-hashed identity filename of a bundle.
pub fn default_filename(bundle_name: &str) -> String {
    format!("{bundle_name}.js")
}

// ---------------------------------------------------------------------------
// Captured Paths
// ---------------------------------------------------------------------------

/// `src` resolved against the working directory when relative.
pub fn resolve_src_root(src: &Path) -> PathBuf {
    if src.is_absolute() {
        return src.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(src),
        Err(_) => src.to_path_buf(),
    }
}

/// Path of a captured unit relative to the source root, with `/` separators.
/// Absolute unit paths are matched against the resolved root. Paths outside
/// the source root are kept as given.
pub fn logical_path(src: &Path, path: &Path) -> String {
    let relative = if path.is_absolute() {
        path.strip_prefix(resolve_src_root(src))
    } else {
        path.strip_prefix(src)
    }
    .unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// AMD module id for a logical path: the path without its `.js` extension.
pub fn module_id(logical_path: &str) -> String {
    logical_path
        .strip_suffix(".js")
        .unwrap_or(logical_path)
        .to_string()
}

pub fn is_ignored(logical_path: &str, ignore_suffixes: &[String]) -> bool {
    ignore_suffixes
        .iter()
        .any(|suffix| logical_path.ends_with(suffix.as_str()))
}

// ---------------------------------------------------------------------------
// Source Maps
// ---------------------------------------------------------------------------

/// `sourceRoot` for a map emitted at `output_path`: one directory above
/// the output root, however deep the artifact sits.
pub fn source_root_for(output_path: &str) -> String {
    let depth = output_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .count()
        .max(1);
    "../".repeat(depth)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
