#![allow(dead_code)]

use std::collections::BTreeMap;

use anyhow::bail;
use bundle_assembler::{
    BuildMode, BundleDescriptor, BundleMembership, CapturedModule, FileRecord, LoaderConfig,
    PipelineOptions, Resolver, SourceUnit,
};

pub const LOADER: &str = "dumber-module-loader;";
pub const ENTRY: &str = "entry";
pub const VENDOR: &str = "vendor";

/// Stand-in for the module tracer.
///
/// User modules get their id injected into `define(`. Ids under `page/` go
/// to the `page` bundle, everything else to the entry bundle; registered
/// packages go to `vendor`. Like a real tracer in watch mode, only bundles
/// whose files changed since the last cycle are re-emitted, plus the entry.
#[derive(Debug, Default)]
pub struct FakeResolver {
    modules: BTreeMap<String, FileRecord>,
    packages: Vec<(String, String)>,
    pending: Vec<CapturedModule>,
    previous: BTreeMap<String, Vec<FileRecord>>,
    pub fail_capture_on: Option<String>,
    pub fail_resolve: bool,
    /// Resolve without an entry bundle, which hashing cannot assemble.
    pub omit_entry: bool,
    pub discarded: usize,
    pub captured_ids: Vec<String>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, id: &str, definition: &str) -> Self {
        self.packages.push((id.to_string(), definition.to_string()));
        self
    }

    /// The `foo` package from the scenarios: `foo/index` then `foo`.
    pub fn with_foo() -> Self {
        Self::new()
            .with_package("foo/index", "define('foo/index',[],function(){});")
            .with_package("foo", "define('foo',['foo/index'],function(m){return m;});")
    }

    pub fn cached_ids(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    fn route(id: &str) -> &'static str {
        if id.starts_with("page/") {
            "page"
        } else {
            ENTRY
        }
    }
}

impl Resolver for FakeResolver {
    async fn capture(&mut self, module: CapturedModule) -> anyhow::Result<()> {
        if self.fail_capture_on.as_deref() == Some(module.module_id.as_str()) {
            bail!("no file at {}", module.path.display());
        }
        self.captured_ids.push(module.module_id.clone());
        self.pending.push(module);
        Ok(())
    }

    async fn resolve(&mut self) -> anyhow::Result<Vec<BundleDescriptor>> {
        if self.fail_resolve {
            bail!("dependency graph is cyclic");
        }

        for module in self.pending.drain(..) {
            let definition =
                module
                    .contents
                    .replacen("define(", &format!("define('{}',", module.module_id), 1);
            let mut record = FileRecord::new(format!("src/{}.js", module.module_id), definition);
            record.source_map = module.source_map;
            self.modules.insert(module.module_id, record);
        }

        let mut files: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        let mut membership: BTreeMap<String, BundleMembership> = BTreeMap::new();

        for (id, def) in &self.packages {
            files
                .entry(VENDOR.to_string())
                .or_default()
                .push(FileRecord::new(format!("node_modules/{id}.js"), def.as_str()));
            membership
                .entry(VENDOR.to_string())
                .or_default()
                .package
                .push(id.clone());
        }
        for (id, record) in &self.modules {
            let bundle = Self::route(id);
            files.entry(bundle.to_string()).or_default().push(record.clone());
            if bundle != ENTRY {
                membership
                    .entry(bundle.to_string())
                    .or_default()
                    .user
                    .push(id.clone());
            }
        }

        let mut descriptors = Vec::new();
        for (name, records) in &files {
            if name == ENTRY || self.previous.get(name) == Some(records) {
                continue;
            }
            self.previous.insert(name.clone(), records.clone());
            descriptors.push(BundleDescriptor::new(name.clone(), records.clone()));
        }

        if self.omit_entry {
            return Ok(descriptors);
        }

        let mut entry_files = vec![FileRecord::glue(LOADER)];
        entry_files.extend(files.remove(ENTRY).unwrap_or_default());
        let mut config = LoaderConfig::with_base_url("dist");
        config.bundles = membership;
        descriptors.push(BundleDescriptor::new(ENTRY, entry_files).with_config(config));

        Ok(descriptors)
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.discarded += 1;
    }

    fn clear_cache(&mut self) {
        self.modules.clear();
        self.previous.clear();
    }
}

pub fn unit(path: &str, contents: &str) -> SourceUnit {
    SourceUnit::buffered(format!("src/{path}"), contents)
}

pub fn hashing() -> PipelineOptions {
    PipelineOptions {
        hash: true,
        mode: BuildMode::Prod,
        ..Default::default()
    }
}

pub fn plain() -> PipelineOptions {
    PipelineOptions {
        mode: BuildMode::Prod,
        ..Default::default()
    }
}

/// `name.<32 lowercase hex>.js`
pub fn is_hashed(bundle: &str, filename: &str) -> bool {
    filename
        .strip_prefix(&format!("{bundle}."))
        .and_then(|rest| rest.strip_suffix(".js"))
        .is_some_and(|hex| {
            hex.len() == 32 && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
}

pub fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).expect("artifact is UTF-8")
}
