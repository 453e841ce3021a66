//! Two-phase build pipeline.
//!
//! A cycle is `begin_cycle()`, any number of `capture(unit)`, then `flush()`.
//! Both phases take `&mut self`, so a capture always settles before the next
//! one starts and a flush never overlaps another phase of the same pipeline.
//!
//! The manifest lives as long as the pipeline and carries over between
//! cycles (watch mode). A failed cycle emits nothing and leaves the manifest
//! at its last committed state.

pub mod manifest;
pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::bundle::assemble_bundles;
use crate::pipeline::manifest::ManifestTracker;
use crate::pipeline::resolver::{CapturedModule, Resolver};
use crate::utils;
use crate::{Artifact, BundleError, CycleOutput, PipelineOptions, SourceMap};

/// How the host delivered a unit's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitContents {
    Buffered(Vec<u8>),
    /// Not supported; fails the cycle.
    Streaming,
    /// No contents at all (e.g. a directory entry).
    Empty,
}

/// One unit handed over by the host I/O adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub contents: UnitContents,
    pub source_map: Option<SourceMap>,
    pub is_binary_asset: bool,
}

impl SourceUnit {
    pub fn buffered(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: UnitContents::Buffered(contents.into()),
            source_map: None,
            is_binary_asset: false,
        }
    }

    pub fn with_source_map(mut self, map: SourceMap) -> Self {
        self.source_map = Some(map);
        self
    }
}

/// What `capture` did with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Handed to the resolver.
    Captured,
    /// Skipped: ignored suffix or no contents.
    Ignored,
    /// Binary asset, emitted unchanged with the cycle's artifacts.
    PassedThrough,
}

enum CycleState {
    Idle,
    Capturing {
        captured: usize,
        passthrough: Vec<Artifact>,
    },
}

pub type ManifestCallback = Box<dyn Fn(&BTreeMap<String, String>) + Send + Sync>;

pub struct Pipeline<R> {
    opts: PipelineOptions,
    resolver: R,
    manifest: ManifestTracker,
    state: CycleState,
    on_manifest: Option<ManifestCallback>,
}

impl<R: fmt::Debug> fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("opts", &self.opts)
            .field("resolver", &self.resolver)
            .field("manifest", &self.manifest)
            .field("in_cycle", &matches!(self.state, CycleState::Capturing { .. }))
            .finish()
    }
}

impl<R: Resolver> Pipeline<R> {
    pub fn new(resolver: R, opts: PipelineOptions) -> Self {
        Self {
            opts,
            resolver,
            manifest: ManifestTracker::new(),
            state: CycleState::Idle,
            on_manifest: None,
        }
    }

    /// Called with the `name.js`-keyed manifest after every successful cycle.
    pub fn with_manifest_callback(
        mut self,
        callback: impl Fn(&BTreeMap<String, String>) + Send + Sync + 'static,
    ) -> Self {
        self.on_manifest = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    pub fn manifest(&self) -> &ManifestTracker {
        &self.manifest
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn in_cycle(&self) -> bool {
        matches!(self.state, CycleState::Capturing { .. })
    }

    /// Start accepting units. A no-op while a cycle is already open.
    pub fn begin_cycle(&mut self) {
        if self.in_cycle() {
            return;
        }
        self.state = CycleState::Capturing {
            captured: 0,
            passthrough: Vec::new(),
        };
    }

    /// Capture one unit. Any error aborts the whole cycle.
    pub async fn capture(&mut self, unit: SourceUnit) -> Result<CaptureOutcome, BundleError> {
        if !self.in_cycle() {
            return Err(BundleError::NoActiveCycle);
        }

        let logical = utils::logical_path(&self.opts.src, &unit.path);
        let bytes = match unit.contents {
            UnitContents::Streaming => {
                self.abort_cycle();
                return Err(BundleError::UnsupportedInputKind(
                    "Streaming is not supported".into(),
                ));
            }
            UnitContents::Empty => return Ok(CaptureOutcome::Ignored),
            UnitContents::Buffered(bytes) => bytes,
        };

        if utils::is_ignored(&logical, &self.opts.ignore_suffixes) {
            debug!(path = %logical, "ignored");
            return Ok(CaptureOutcome::Ignored);
        }

        if unit.is_binary_asset {
            if let CycleState::Capturing { passthrough, .. } = &mut self.state {
                passthrough.push(Artifact {
                    output_path: PathBuf::from(&logical),
                    contents: bytes,
                    source_map: None,
                });
            }
            return Ok(CaptureOutcome::PassedThrough);
        }

        let contents = match String::from_utf8(bytes) {
            Ok(contents) => contents,
            Err(err) => {
                self.abort_cycle();
                return Err(BundleError::CaptureFailure {
                    path: logical,
                    reason: err.to_string(),
                });
            }
        };

        let module = CapturedModule {
            path: unit.path,
            module_id: utils::module_id(&logical),
            contents,
            source_map: unit.source_map,
        };
        if let Err(err) = self.resolver.capture(module).await {
            self.abort_cycle();
            return Err(BundleError::CaptureFailure {
                path: logical,
                reason: format!("{err:#}"),
            });
        }

        if let CycleState::Capturing { captured, .. } = &mut self.state {
            *captured += 1;
        }
        Ok(CaptureOutcome::Captured)
    }

    /// Resolve, assemble and commit the cycle.
    pub async fn flush(&mut self) -> Result<CycleOutput, BundleError> {
        let CycleState::Capturing {
            captured,
            passthrough,
        } = std::mem::replace(&mut self.state, CycleState::Idle)
        else {
            return Err(BundleError::NoActiveCycle);
        };
        info!(captured, "flushing cycle");

        let descriptors = match self.resolver.resolve().await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                self.resolver.discard();
                return Err(BundleError::ResolveFailure(format!("{err:#}")));
            }
        };

        let mut output = match assemble_bundles(&descriptors, &self.opts, &mut self.manifest) {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "assembly failed; cycle discarded");
                self.resolver.discard();
                return Err(err);
            }
        };
        output.artifacts.extend(passthrough);

        if let Some(callback) = &self.on_manifest {
            callback(&self.manifest.logical_map());
        }
        Ok(output)
    }

    /// Forget the manifest and the resolver's cross-cycle cache.
    pub fn clear_cache(&mut self) {
        self.manifest.reset();
        self.resolver.clear_cache();
    }

    fn abort_cycle(&mut self) {
        warn!("cycle aborted; captured units discarded");
        self.state = CycleState::Idle;
        self.resolver.discard();
    }
}
