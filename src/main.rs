use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bundle_assembler::{
    assemble_bundles, write_artifacts, BundleDescriptor, FileRecord, LoaderConfig,
    ManifestTracker, PipelineOptions, SourceMap,
};

/// Resolver output for one cycle, as JSON on stdin.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssemblerInput {
    bundles: Vec<BundleInput>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct BundleInput {
    name: String,
    files: Vec<FileInput>,
    #[serde(default)]
    append_files: Vec<FileInput>,
    #[serde(default)]
    config: Option<LoaderConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct FileInput {
    #[serde(default)]
    path: Option<String>,
    contents: String,
    #[serde(default)]
    source_map: Option<SourceMap>,
}

impl From<FileInput> for FileRecord {
    fn from(input: FileInput) -> Self {
        FileRecord {
            path: input.path,
            contents: input.contents.into_bytes(),
            source_map: input.source_map,
        }
    }
}

impl From<BundleInput> for BundleDescriptor {
    fn from(input: BundleInput) -> Self {
        BundleDescriptor {
            name: input.name,
            files: input.files.into_iter().map(FileRecord::from).collect(),
            append_files: input.append_files.into_iter().map(FileRecord::from).collect(),
            config: input.config,
        }
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    out_dir: Option<PathBuf>,
    options: Option<PathBuf>,
    hash: bool,
}

const USAGE: &str = "usage: bundle-assembler --out-dir <path> [--options <file.json>] [--hash]";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,bundle_assembler=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("[bundle-assembler] {err:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut opts = match &args.options {
        Some(path) => load_options(path).await?,
        None => PipelineOptions::default(),
    };
    opts.hash |= args.hash;
    if let Some(out_dir) = args.out_dir {
        opts.out_dir = Some(out_dir);
    }
    let out_dir = opts
        .out_dir
        .clone()
        .ok_or_else(|| anyhow::anyhow!("required flag missing: --out-dir <path>\n{USAGE}"))?;

    let mut stdin_payload = String::new();
    tokio::io::stdin()
        .read_to_string(&mut stdin_payload)
        .await
        .context("failed to read stdin")?;
    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let input: AssemblerInput =
        serde_json::from_str(&stdin_payload).context("invalid input JSON")?;
    let descriptors: Vec<BundleDescriptor> =
        input.bundles.into_iter().map(BundleDescriptor::from).collect();

    // Continue from the manifest of the previous run, like a watch cycle would.
    let mut manifest = if opts.hash {
        load_manifest(&out_dir.join(&opts.manifest_file)).await?
    } else {
        ManifestTracker::new()
    };

    let output = assemble_bundles(&descriptors, &opts, &mut manifest)?;
    let written = write_artifacts(&out_dir, &output.artifacts).await?;
    info!(files = written.len(), "done");

    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-dir" => {
                let value = args.next().context("missing value for --out-dir")?;
                parsed.out_dir = Some(PathBuf::from(value));
            }
            "--options" => {
                let value = args.next().context("missing value for --options")?;
                parsed.options = Some(PathBuf::from(value));
            }
            "--hash" => parsed.hash = true,
            _ => bail!("unknown argument '{arg}'. {USAGE}"),
        }
    }

    Ok(parsed)
}

async fn load_options(path: &Path) -> anyhow::Result<PipelineOptions> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read options '{}'", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("invalid options '{}'", path.display()))
}

async fn load_manifest(path: &Path) -> anyhow::Result<ManifestTracker> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(ManifestTracker::new());
    }
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
    let map: BTreeMap<String, String> = serde_json::from_str(&source)
        .with_context(|| format!("invalid manifest '{}'", path.display()))?;
    Ok(ManifestTracker::from_logical_map(&map))
}
