use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::catalog::CatalogRecord;
use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, OpenAiEmbedder};
use crate::index::{QdrantIndex, VectorIndex};
use crate::pipeline::IndexingPipeline;
use crate::search::SearchService;
use crate::sync::SyncService;
use crate::MenuError;

/// Rebuild the whole collection from a catalog file.
#[inline]
pub fn run_index(config: &Config, file: &Path, dry_run: bool) -> Result<()> {
    info!("Indexing catalog {} (dry_run: {})", file.display(), dry_run);

    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;

    let progress = ProgressBar::hidden();
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} points")
            .context("Failed to build progress bar template")?,
    );
    let progress_for_pipeline = progress.clone();

    let pipeline = IndexingPipeline::new(embedder, index, config).with_progress(
        move |done, total| {
            if progress_for_pipeline.is_hidden() && total > 0 {
                progress_for_pipeline
                    .set_draw_target(indicatif::ProgressDrawTarget::stderr());
                progress_for_pipeline.set_length(total as u64);
            }
            progress_for_pipeline.set_position(done as u64);
        },
    );

    let report = pipeline.run_from_file(file, dry_run)?;
    progress.finish_and_clear();

    if !report.issues.is_empty() {
        println!(
            "{} {} of {} records failed validation:",
            style("!").yellow().bold(),
            report.issues.len(),
            report.total_records
        );
        for issue in &report.issues {
            println!("   {}", issue);
        }
    }

    if report.dry_run {
        println!(
            "{} Dry run: {} valid records ({} legacy, {} extended, {} with precomputed text); index untouched",
            style("✓").green().bold(),
            report.valid_records,
            report.legacy_records,
            report.extended_records,
            report.precomputed_texts
        );
        return Ok(());
    }

    for warning in &report.warnings {
        println!("{} {}", style("!").yellow().bold(), warning);
    }

    println!(
        "{} Indexed {} records into '{}' in {:.2}s ({:.1} records/s)",
        style("✓").green().bold(),
        report.indexed_points,
        config.index.collection,
        report.duration.as_secs_f64(),
        report.records_per_second()
    );
    Ok(())
}

/// Run one semantic search and print the ranked hits.
#[inline]
pub fn run_search(config: &Config, query: &str, top_k: usize) -> Result<()> {
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let service = SearchService::new(embedder, index, config);

    let response = service.search(query, top_k)?;

    if response.hits.is_empty() {
        println!("No results for \"{}\".", response.query);
        return Ok(());
    }

    println!(
        "{} results for \"{}\" ({:.0} ms):",
        response.total,
        response.query,
        response.elapsed.as_secs_f64() * 1000.0
    );
    println!();

    for (rank, hit) in response.hits.iter().enumerate() {
        let category = hit.payload["Nivel0"]
            .as_str()
            .or_else(|| {
                hit.payload["nivel"]
                    .as_array()
                    .and_then(|levels| levels.first())
                    .and_then(|level| level.as_str())
            })
            .unwrap_or("?");
        let description = hit.payload["Descripcion"]
            .as_str()
            .or_else(|| hit.payload["descripcion"].as_str())
            .unwrap_or("");

        println!(
            "{}. [{}] {} — {}",
            rank + 1,
            style(format!("{:.4}", hit.score)).cyan(),
            style(category).bold(),
            description
        );
        println!("   id {} · {} similarity", hit.id, hit.band());
        if let Some(url) = hit.payload["url"].as_str() {
            println!("   {}", style(url).dim());
        }
    }
    Ok(())
}

/// Synchronize a single record from a JSON file into the index.
#[inline]
pub fn run_upsert(config: &Config, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read record file: {}", file.display()))?;
    let record: CatalogRecord = serde_json::from_str(&content)
        .with_context(|| format!("Record file {} does not match any record shape", file.display()))?;

    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let service = SyncService::new(embedder, index, config);

    let id = service.upsert_record(&record)?;
    println!(
        "{} Record {} synchronized into '{}'",
        style("✓").green().bold(),
        id,
        config.index.collection
    );
    Ok(())
}

/// Remove one record from the index by id.
#[inline]
pub fn run_delete(config: &Config, id: i64) -> Result<()> {
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let service = SyncService::new(embedder, index, config);

    match service.delete_record(id) {
        Ok(()) => {
            println!(
                "{} Record {} removed from '{}'",
                style("✓").green().bold(),
                id,
                config.index.collection
            );
            Ok(())
        }
        Err(MenuError::NotFound(_)) => {
            println!("No indexed record with id {}; nothing to do.", id);
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

/// Report collection state and provider reachability.
#[inline]
pub fn run_status(config: &Config) -> Result<()> {
    let index = QdrantIndex::new(&config.index)?;

    println!("Collection '{}':", config.index.collection);
    match index.describe_collection(&config.index.collection) {
        Ok(info) => {
            println!("   status: {}", info.status);
            println!("   points: {}", info.points_count);
            println!("   dimension: {}", info.dimension);
            println!("   metric: {}", info.metric);
        }
        Err(MenuError::NotFound(_)) => {
            println!("   {} not created yet (run `menu-search index`)", style("!").yellow());
        }
        Err(error) => {
            println!("   {} {}", style("✗").red().bold(), error);
        }
    }

    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    match embedder.ping() {
        Ok(()) => println!(
            "Embedding provider: {} ({})",
            style("reachable").green(),
            config.embedding.model
        ),
        Err(error) => println!("Embedding provider: {} — {}", style("unreachable").red(), error),
    }
    Ok(())
}

/// Print the active configuration as TOML.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("# {}", config.config_file_path().display());
    print!("{}", toml::to_string_pretty(config).context("Failed to render config")?);
    Ok(())
}

/// Write a default config file if none exists yet.
#[inline]
pub fn init_config(config_dir: &Path) -> Result<()> {
    let mut config = Config::default();
    config.base_dir = config_dir.to_path_buf();

    let path = config.config_file_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    config.save()?;
    println!(
        "{} Wrote default config to {}",
        style("✓").green().bold(),
        path.display()
    );
    Ok(())
}
