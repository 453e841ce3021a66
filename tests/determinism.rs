use bundle_assembler::hash::{entry_hash, hashed_filename};
use bundle_assembler::{
    assemble_bundles, BundleDescriptor, BundleMembership, CycleOutput, FileRecord, LoaderConfig,
    ManifestTracker, PipelineOptions,
};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hashing() -> PipelineOptions {
    PipelineOptions {
        hash: true,
        ..Default::default()
    }
}

fn bundle(name: &str, body: &str) -> BundleDescriptor {
    BundleDescriptor::new(
        name,
        vec![FileRecord::new(format!("src/{name}.js"), body)],
    )
}

fn entry(members: &[&str]) -> BundleDescriptor {
    let mut config = LoaderConfig::with_base_url("dist");
    for name in members {
        config.bundles.insert(
            name.to_string(),
            BundleMembership {
                user: vec![name.to_string()],
                package: Vec::new(),
            },
        );
    }
    BundleDescriptor::new(
        "entry",
        vec![
            FileRecord::glue("dumber-module-loader;"),
            FileRecord::new("src/app.js", "define('app',['a','b'],function(){});"),
        ],
    )
    .with_config(config)
}

fn assemble(descriptors: &[BundleDescriptor]) -> CycleOutput {
    let mut manifest = ManifestTracker::new();
    assemble_bundles(descriptors, &hashing(), &mut manifest).unwrap()
}

// ============================================================================
// Deterministic output
// ============================================================================

#[test]
fn repeated_assembly_is_byte_identical() {
    let descriptors = [
        bundle("a", "define('a',[],1);"),
        bundle("b", "define('b',[],2);"),
        entry(&["a", "b"]),
    ];
    let first = assemble(&descriptors);
    let second = assemble(&descriptors);
    assert_eq!(first, second);
}

#[test]
fn descriptor_order_does_not_change_names() {
    let forward = assemble(&[
        bundle("a", "define('a',[],1);"),
        bundle("b", "define('b',[],2);"),
        entry(&["a", "b"]),
    ]);
    let reversed = assemble(&[
        entry(&["a", "b"]),
        bundle("b", "define('b',[],2);"),
        bundle("a", "define('a',[],1);"),
    ]);
    assert_eq!(forward.manifest, reversed.manifest);
}

// ============================================================================
// Entry-last hashing
// ============================================================================

#[test]
fn changing_one_bundle_renames_it_and_the_entry_only() {
    let before = assemble(&[
        bundle("a", "define('a',[],1);"),
        bundle("b", "define('b',[],2);"),
        entry(&["a", "b"]),
    ]);
    let after = assemble(&[
        bundle("a", "define('a',[],10);"),
        bundle("b", "define('b',[],2);"),
        entry(&["a", "b"]),
    ]);

    assert_ne!(after.manifest["a"], before.manifest["a"]);
    assert_eq!(after.manifest["b"], before.manifest["b"]);
    assert_ne!(after.manifest["entry"], before.manifest["entry"]);
}

#[test]
fn appended_content_changes_the_entry_name() {
    let plain = assemble(&[bundle("a", "define('a',[],1);"), entry(&["a"])]);
    let appended = assemble(&[
        bundle("a", "define('a',[],1);"),
        entry(&["a"]).with_append_files(vec![FileRecord::new("src/tail.js", "requirejs(['app']);")]),
    ]);

    assert_eq!(plain.manifest["a"], appended.manifest["a"]);
    assert_ne!(plain.manifest["entry"], appended.manifest["entry"]);

    let entry_name = &appended.manifest["entry"];
    let text = String::from_utf8(appended.artifact(entry_name).unwrap().contents.clone()).unwrap();
    assert!(text.ends_with("});\nrequirejs(['app']);"));
}

#[test]
fn entry_digest_covers_contents_config_and_append() {
    let output = assemble(&[bundle("a", "define('a',[],1);"), entry(&["a"])]);
    let entry_name = &output.manifest["entry"];
    let text = String::from_utf8(output.artifact(entry_name).unwrap().contents.clone()).unwrap();

    // Artifact layout: contents \n config block \n append (empty here)
    let body = "dumber-module-loader;\ndefine('app',['a','b'],function(){});";
    let config_block = text
        .strip_prefix(&format!("{body}\n"))
        .and_then(|rest| rest.strip_suffix('\n'))
        .unwrap();
    assert!(config_block.starts_with("requirejs.config({"));
    assert!(config_block.contains(&format!("\"a\": \"{}\"", output.manifest["a"])));

    let digest = entry_hash(body.as_bytes(), config_block, b"");
    assert_eq!(*entry_name, hashed_filename("entry", &digest));
}

#[test]
fn previous_manifest_feeds_the_entry_config() {
    let mut manifest = ManifestTracker::new();
    let first = assemble_bundles(
        &[bundle("a", "define('a',[],1);"), entry(&["a"])],
        &hashing(),
        &mut manifest,
    )
    .unwrap();

    // Only the entry is re-emitted; `a` must still be mapped
    let second = assemble_bundles(&[entry(&["a"])], &hashing(), &mut manifest).unwrap();
    assert_eq!(second.manifest["a"], first.manifest["a"]);
    assert_eq!(second.manifest["entry"], first.manifest["entry"]);
    assert_eq!(second.artifacts.len(), 2);
}
