//! # Bundle Assembler
//!
//! Turns resolved AMD bundle descriptors into deliverable artifacts:
//! concatenated module definitions, stitched source maps, content-addressed
//! filenames and the runtime loader configuration of the entry bundle.
//!
//! The assembler never resolves modules or decides bundle membership. It
//! consumes what the resolver produced and emits bytes.

pub mod bundle;
pub mod compose;
pub mod concat;
pub mod config;
pub mod hash;
pub mod pipeline;
pub mod sourcemap;
pub mod utils;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bundle::{assemble_bundles, write_artifacts};
pub use config::{BundleMembership, LoaderConfig};
pub use pipeline::manifest::ManifestTracker;
pub use pipeline::resolver::{CapturedModule, Resolver};
pub use pipeline::{CaptureOutcome, Pipeline, SourceUnit, UnitContents};
pub use sourcemap::SourceMap;

// ---------------------------------------------------------------------------
// Build Mode
// ---------------------------------------------------------------------------

/// The build mode determines the default sourcemap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Development — sourcemaps enabled.
    #[default]
    Dev,
    /// Production — no sourcemaps unless explicitly requested.
    Prod,
}

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// One source record inside a bundle, as handed over by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Identity used for source-map attribution. `None` for glue content.
    pub path: Option<String>,
    pub contents: Vec<u8>,
    pub source_map: Option<SourceMap>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: Some(path.into()),
            contents: contents.into(),
            source_map: None,
        }
    }

    /// Synthetic content with no source identity (separators, loader glue).
    pub fn glue(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: None,
            contents: contents.into(),
            source_map: None,
        }
    }

    pub fn with_source_map(mut self, map: SourceMap) -> Self {
        self.source_map = Some(map);
        self
    }
}

// ---------------------------------------------------------------------------
// BundleDescriptor
// ---------------------------------------------------------------------------

/// Describes WHAT goes into one bundle. Read-only input from the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDescriptor {
    pub name: String,
    pub files: Vec<FileRecord>,
    /// Passthrough content appended after the module definitions.
    pub append_files: Vec<FileRecord>,
    /// Runtime loader configuration. Present only on the entry bundle.
    pub config: Option<LoaderConfig>,
}

impl BundleDescriptor {
    pub fn new(name: impl Into<String>, files: Vec<FileRecord>) -> Self {
        Self {
            name: name.into(),
            files,
            append_files: Vec::new(),
            config: None,
        }
    }

    pub fn with_append_files(mut self, append_files: Vec<FileRecord>) -> Self {
        self.append_files = append_files;
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn is_entry(&self) -> bool {
        self.config.is_some()
    }
}

// ---------------------------------------------------------------------------
// AssembledBundle
// ---------------------------------------------------------------------------

/// The composed form of one bundle for one cycle.
/// Never mutated in place; renaming produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledBundle {
    pub bundle_name: String,
    pub filename: String,
    pub contents: Vec<u8>,
    pub source_map: Option<SourceMap>,
    pub append_contents: Vec<u8>,
    pub append_source_map: Option<SourceMap>,
    /// Deep copy of the descriptor's config, finalized during assembly.
    pub config: Option<LoaderConfig>,
}

impl AssembledBundle {
    pub fn is_entry(&self) -> bool {
        self.config.is_some()
    }

    /// Supersede this bundle with one carrying a new physical filename.
    /// The source maps follow the rename.
    pub fn renamed(self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let retarget = |map: Option<SourceMap>| {
            map.map(|mut map| {
                map.file = Some(filename.clone());
                map
            })
        };
        Self {
            source_map: retarget(self.source_map),
            append_source_map: retarget(self.append_source_map),
            filename: filename.clone(),
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact / CycleOutput
// ---------------------------------------------------------------------------

/// One deliverable file, relative to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub output_path: PathBuf,
    pub contents: Vec<u8>,
    pub source_map: Option<SourceMap>,
}

/// Everything a successful cycle emits.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub artifacts: Vec<Artifact>,
    /// Bundle name → physical filename, after this cycle was committed.
    pub manifest: BTreeMap<String, String>,
}

impl CycleOutput {
    pub fn artifact(&self, output_path: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.output_path.as_os_str() == output_path)
    }
}

// ---------------------------------------------------------------------------
// PipelineOptions
// ---------------------------------------------------------------------------

/// Describes HOW to assemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Source root that captured paths are made relative to.
    pub src: PathBuf,
    pub mode: BuildMode,
    /// Explicitly enable/disable source maps (overrides mode default).
    pub source_map: Option<bool>,
    /// Content-addressed filenames (`name.<md5>.js`).
    pub hash: bool,
    /// Captured paths ending with one of these are skipped.
    pub ignore_suffixes: Vec<String>,
    /// Name of the durable manifest artifact emitted when hashing.
    pub manifest_file: String,
    /// Output directory used by the binary.
    pub out_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            mode: BuildMode::Dev,
            source_map: None,
            hash: false,
            ignore_suffixes: vec![".d.ts".to_string()],
            manifest_file: "manifest.json".to_string(),
            out_dir: None,
        }
    }
}

impl PipelineOptions {
    pub fn source_maps_enabled(&self) -> bool {
        self.source_map.unwrap_or(self.mode == BuildMode::Dev)
    }
}

// ---------------------------------------------------------------------------
// BundleError
// ---------------------------------------------------------------------------

/// Errors that abort a cycle. A failed cycle emits nothing.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("{0}")]
    UnsupportedInputKind(String),

    #[error("Failed to capture '{path}': {reason}")]
    CaptureFailure { path: String, reason: String },

    #[error("Resolver failed: {0}")]
    ResolveFailure(String),

    #[error("Assembly inconsistency: {0}")]
    AssemblyInconsistency(String),

    #[error("No build cycle in progress")]
    NoActiveCycle,

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
