use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use recommender_core::persist::ArtifactState;
use recommender_core::{BuildConfig, BundleStore, Corpus, IndexBuilder, Item, ItemId, TextFields};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One input record. Columns other than these are ignored. The title is
/// taken from `product_name`, then `title`, then `name`.
#[derive(Debug, Default, Deserialize)]
struct InputRecord {
    #[serde(default)]
    id: Option<ItemId>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl InputRecord {
    fn take_title(&mut self) -> Option<String> {
        self.product_name.take().or_else(|| self.title.take()).or_else(|| self.name.take())
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect TF-IDF similarity artifact bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the artifact bundle for a dataset from JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Artifact root directory
        #[arg(long, default_value = "./artifacts")]
        output: String,
        /// Dataset identifier, used as the bundle directory name
        #[arg(long)]
        dataset_id: String,
        /// Keep only the N most frequent terms
        #[arg(long)]
        max_features: Option<usize>,
        /// Use tf = 1 + ln(count) instead of the raw count
        #[arg(long, default_value_t = false)]
        sublinear_tf: bool,
        /// Reduce terms to their English stem
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Vectorize title and description together
        #[arg(long, default_value_t = false)]
        include_title: bool,
        /// Shared terms reported per recommendation
        #[arg(long, default_value_t = recommender_core::config::DEFAULT_MATCHED_TERMS)]
        matched_terms: usize,
    },
    /// Show which datasets have a ready bundle
    Status {
        /// Artifact root directory
        #[arg(long, default_value = "./artifacts")]
        artifacts: String,
        /// Only report this dataset
        #[arg(long)]
        dataset_id: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, dataset_id, max_features, sublinear_tf, stem, include_title, matched_terms } => {
            let config = BuildConfig {
                text_fields: if include_title { TextFields::TitleAndDescription } else { TextFields::Description },
                max_features,
                sublinear_tf,
                stem,
                matched_terms,
            };
            build_bundle(Path::new(&input), Path::new(&output), &dataset_id, config)
        }
        Commands::Status { artifacts, dataset_id } => print_status(Path::new(&artifacts), dataset_id.as_deref()),
    }
}

fn build_bundle(input: &Path, output: &Path, dataset_id: &str, config: BuildConfig) -> Result<()> {
    let files = collect_input_files(input)?;
    if files.is_empty() {
        bail!("no .json or .jsonl files found under {}", input.display());
    }

    let mut records = Vec::new();
    for file in &files {
        let before = records.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut records)?;
        } else {
            read_json(file, &mut records)?;
        }
        tracing::debug!(file = %file.display(), records = records.len() - before, "read input file");
    }

    let corpus = to_corpus(records)?;
    tracing::info!(num_items = corpus.len(), files = files.len(), "ingested items");

    let bundle = IndexBuilder::new(config)
        .build(dataset_id, &corpus)
        .with_context(|| format!("building dataset {dataset_id}"))?;
    BundleStore::new(output).save(&bundle)?;

    tracing::info!(output = %output.display(), dataset_id, version = bundle.version(), "bundle build complete");
    println!("{} {}", dataset_id, bundle.version());
    Ok(())
}

fn print_status(artifacts: &Path, dataset_id: Option<&str>) -> Result<()> {
    let store = BundleStore::new(artifacts);
    let ids = match dataset_id {
        Some(id) => vec![id.to_string()],
        None => store.list()?,
    };
    for id in ids {
        match store.status(&id)? {
            ArtifactState::Ready { version } => println!("{id} ready {version}"),
            ArtifactState::Unbuilt => println!("{id} unbuilt"),
        }
    }
    Ok(())
}

fn collect_input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input path {} does not exist", input.display());
    }
    Ok(files)
}

fn read_jsonl(file: &Path, out: &mut Vec<InputRecord>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let rec: InputRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        out.push(rec);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<InputRecord>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                out.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => out.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "skipping file that is neither an object nor an array"),
    }
    Ok(())
}

/// Records without an id are numbered in input order, starting above the
/// largest explicit id so the two never clash. A missing or null description
/// becomes the empty string.
fn to_corpus(records: Vec<InputRecord>) -> Result<Corpus> {
    let mut next_id: ItemId = records.iter().filter_map(|r| r.id).max().map_or(0, |max| max.saturating_add(1));
    let mut items = Vec::with_capacity(records.len());
    for (pos, mut rec) in records.into_iter().enumerate() {
        let Some(title) = rec.take_title() else {
            bail!("record {} has no product_name, title or name", pos + 1);
        };
        let id = match rec.id {
            Some(id) => id,
            None => {
                next_id += 1;
                next_id - 1
            }
        };
        items.push(Item { id, title, description: rec.description.unwrap_or_default() });
    }
    Corpus::new(items).context("explicit item ids must be unique")
}
