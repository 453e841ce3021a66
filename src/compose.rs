//! Composition of a single bundle, and rendering of its final artifact.
//!
//! Composing is pure: it never consults the manifest, so every bundle of a
//! cycle can be composed in any order.

use std::path::PathBuf;

use crate::concat::{concat, Concatenator};
use crate::utils;
use crate::{Artifact, AssembledBundle, BundleDescriptor};

/// Build the composed form of `descriptor` under its default filename.
pub fn compose_bundle(descriptor: &BundleDescriptor, need_source_maps: bool) -> AssembledBundle {
    let bundle_name = utils::normalize_bundle_name(&descriptor.name);
    let filename = utils::default_filename(&bundle_name);

    let (contents, source_map) = concat(&descriptor.files, &filename, need_source_maps);
    let (append_contents, append_source_map) =
        concat(&descriptor.append_files, &filename, need_source_maps);

    AssembledBundle {
        bundle_name,
        filename,
        contents,
        source_map,
        append_contents,
        append_source_map,
        // Later assembly steps write into the config; the descriptor's copy
        // stays untouched.
        config: descriptor.config.clone(),
    }
}

/// Lay out the deliverable bytes of a bundle:
/// module definitions, then the config block (entry only), then appended
/// content. The entry artifact always carries the append section, so it
/// ends with a newline when nothing is appended.
pub fn render_artifact(
    bundle: &AssembledBundle,
    config_block: Option<&str>,
    need_source_maps: bool,
) -> Artifact {
    let mut concatenator = Concatenator::new(bundle.filename.clone(), need_source_maps);
    concatenator.add_raw(&bundle.contents, bundle.source_map.as_ref());
    if let Some(block) = config_block {
        concatenator.add_raw(block.as_bytes(), None);
    }
    if config_block.is_some() || !bundle.append_contents.is_empty() {
        concatenator.add_raw(&bundle.append_contents, bundle.append_source_map.as_ref());
    }

    let (contents, source_map) = concatenator.finish();
    let source_map = source_map.map(|mut map| {
        map.source_root = Some(utils::source_root_for(&bundle.filename));
        map
    });

    Artifact {
        output_path: PathBuf::from(&bundle.filename),
        contents,
        source_map,
    }
}
