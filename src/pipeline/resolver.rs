//! The resolver seam.
//!
//! The resolver traces module dependencies and partitions modules into
//! bundles. The assembler treats it as a black box: units go in during the
//! capture phase, bundle descriptors come out at flush.

use std::future::Future;
use std::path::PathBuf;

use crate::{BundleDescriptor, SourceMap};

/// A captured source unit, ready for tracing.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedModule {
    /// Path as delivered by the host.
    pub path: PathBuf,
    /// AMD module id derived from the path relative to the source root.
    pub module_id: String,
    pub contents: String,
    pub source_map: Option<SourceMap>,
}

pub trait Resolver {
    /// Trace one unit. Called once per unit, never concurrently.
    fn capture(&mut self, module: CapturedModule) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Resolve everything captured so far into bundles.
    ///
    /// At most one descriptor may carry a config (the entry bundle).
    fn resolve(&mut self) -> impl Future<Output = anyhow::Result<Vec<BundleDescriptor>>> + Send;

    /// Drop the units captured during a failed cycle.
    fn discard(&mut self) {}

    /// Drop any cache kept across cycles.
    fn clear_cache(&mut self) {}
}
