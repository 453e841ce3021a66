//! Core assembly logic.
//!
//! This module turns one cycle's resolved bundles into artifacts:
//! 1. Compose and name every non-entry bundle
//! 2. Compose the entry bundle and write the manifest view into its config
//! 3. Name the entry bundle from its contents, config and appended content
//! 4. Commit the manifest
//!
//! The entry bundle is always last: its filename covers the filenames of
//! every other bundle, so nothing may be renamed after it is hashed.
//! Manifest changes are staged and only committed when the whole cycle
//! succeeded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::compose::{compose_bundle, render_artifact};
use crate::config::render_config_block;
use crate::hash::{content_hash, entry_hash, hashed_filename};
use crate::pipeline::manifest::ManifestTracker;
use crate::utils;
use crate::{Artifact, AssembledBundle, BundleDescriptor, BundleError, CycleOutput, PipelineOptions};

/// Assemble one cycle. On error, `manifest` is left exactly as it was.
pub fn assemble_bundles(
    descriptors: &[BundleDescriptor],
    opts: &PipelineOptions,
    manifest: &mut ManifestTracker,
) -> Result<CycleOutput, BundleError> {
    let entry = validate_descriptors(descriptors, opts)?;
    let with_maps = opts.source_maps_enabled();
    let mut staged = manifest.clone();
    let mut artifacts = Vec::with_capacity(descriptors.len() + 1);

    for descriptor in descriptors.iter().filter(|d| !d.is_entry()) {
        let mut bundle = compose_bundle(descriptor, with_maps);
        if opts.hash {
            // Content-only digest: the source map never feeds the name.
            let digest = content_hash(&bundle.contents);
            let filename = hashed_filename(&bundle.bundle_name, &digest);
            bundle = bundle.renamed(filename);
        }
        staged.record_or_update(&bundle.bundle_name, bundle.filename.clone());
        debug!(
            bundle = %bundle.bundle_name,
            filename = %bundle.filename,
            bytes = bundle.contents.len(),
            "assembled bundle"
        );
        artifacts.push(render_artifact(&bundle, None, with_maps));
    }

    if let Some(descriptor) = entry {
        let bundle = compose_bundle(descriptor, with_maps);
        let mut config = bundle.config.clone().unwrap_or_default();
        if opts.hash {
            config.paths.extend(staged.paths_except(&bundle.bundle_name));
        }
        let config_block = render_config_block(&config)?;

        let mut bundle = AssembledBundle {
            config: Some(config),
            ..bundle
        };
        if opts.hash {
            let digest = entry_hash(&bundle.contents, &config_block, &bundle.append_contents);
            let filename = hashed_filename(&bundle.bundle_name, &digest);
            bundle = bundle.renamed(filename);
        }
        staged.record_or_update(&bundle.bundle_name, bundle.filename.clone());
        debug!(
            bundle = %bundle.bundle_name,
            filename = %bundle.filename,
            paths = bundle.config.as_ref().map_or(0, |c| c.paths.len()),
            "assembled entry bundle"
        );
        artifacts.push(render_artifact(&bundle, Some(&config_block), with_maps));
    }

    if opts.hash {
        let json = serde_json::to_string_pretty(&staged.logical_map())?;
        artifacts.push(Artifact {
            output_path: PathBuf::from(&opts.manifest_file),
            contents: json.into_bytes(),
            source_map: None,
        });
    }

    *manifest = staged;
    info!(
        bundles = descriptors.len(),
        artifacts = artifacts.len(),
        hashed = opts.hash,
        "cycle assembled"
    );

    Ok(CycleOutput {
        artifacts,
        manifest: manifest.snapshot(),
    })
}

/// Returns the entry bundle, if any.
fn validate_descriptors<'a>(
    descriptors: &'a [BundleDescriptor],
    opts: &PipelineOptions,
) -> Result<Option<&'a BundleDescriptor>, BundleError> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        let name = utils::normalize_bundle_name(&descriptor.name);
        if name.is_empty() {
            return Err(BundleError::AssemblyInconsistency(
                "bundle with an empty name".into(),
            ));
        }
        if !seen.insert(name) {
            return Err(BundleError::AssemblyInconsistency(format!(
                "bundle '{}' resolved more than once",
                descriptor.name
            )));
        }
    }

    let mut entries = descriptors.iter().filter(|d| d.is_entry());
    let entry = entries.next();
    if let Some(extra) = entries.next() {
        return Err(BundleError::AssemblyInconsistency(format!(
            "more than one entry bundle: '{}' and '{}'",
            entry.map_or("", |e| e.name.as_str()),
            extra.name
        )));
    }

    if opts.hash && entry.is_none() {
        return Err(BundleError::AssemblyInconsistency(
            "entry bundle missing from resolver output; cannot hash without it".into(),
        ));
    }

    Ok(entry)
}

/// Write artifacts under `out_dir`. Source maps go next to their artifact
/// as `<name>.map`. Returns the written paths.
pub async fn write_artifacts(
    out_dir: &Path,
    artifacts: &[Artifact],
) -> Result<Vec<PathBuf>, BundleError> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out_dir.join(&artifact.output_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &artifact.contents).await?;
        written.push(path.clone());

        if let Some(map) = &artifact.source_map {
            let mut map_path = path.into_os_string();
            map_path.push(".map");
            let map_path = PathBuf::from(map_path);
            tokio::fs::write(&map_path, map.to_json()?).await?;
            written.push(map_path);
        }
    }

    info!(out_dir = %out_dir.display(), files = written.len(), "artifacts written");
    Ok(written)
}
