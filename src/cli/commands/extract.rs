//! Batch extraction command.

use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use specsift::cache::CacheDir;
use specsift::config::Settings;
use specsift::layout::JsonLayoutDetector;
use specsift::llm::LlmClient;
use specsift::ocr::{OcrEngine, PaddleJsonEngine};
use specsift::Pipeline;

use super::helpers::{collect_inputs, load_schema, truncate};

/// Extract attributes from every input document.
pub async fn cmd_extract(
    settings: &Settings,
    schema_path: &Path,
    inputs: Vec<PathBuf>,
    input_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let inputs = collect_inputs(inputs, input_dir)?;
    if inputs.is_empty() {
        println!("{} No input documents given", style("!").yellow());
        return Ok(());
    }

    settings.ensure_directories()?;
    let schema = load_schema(schema_path)?;

    let ocr = PaddleJsonEngine::new();
    if !ocr.is_available() {
        anyhow::bail!("{}", ocr.availability_hint());
    }

    // Both caches are built before any document is processed.
    let client = LlmClient::new(settings.llm.clone());
    let cache = CacheDir::new(settings.cache_dir());
    let lookup = cache
        .product_type_lookup(&schema, &client, settings.json_retries)
        .await?;
    let guidance = cache
        .regex_guidance(
            &schema,
            &client,
            settings.grouping_threshold,
            settings.json_retries,
        )
        .await?;
    println!(
        "{} Lookup covers {} product type(s); guidance for {} attribute(s)",
        style("✓").green(),
        lookup.len(),
        guidance.len()
    );

    let pipeline = Pipeline::new(
        Box::new(ocr),
        Box::new(JsonLayoutDetector::new()),
        schema,
        lookup,
        guidance,
        settings,
    );

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    let summary = pipeline.run_batch(&inputs, |input, result| {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match result {
            Ok(outcome) if outcome.is_success() => pb.set_message(format!(
                "{} {} ({} attribute(s))",
                style("✓").green(),
                truncate(&name, 40),
                outcome.matched_attributes().len()
            )),
            Ok(_) => pb.set_message(format!("{} {}", style("-").dim(), truncate(&name, 40))),
            Err(_) => pb.set_message(format!("{} {}", style("✗").red(), truncate(&name, 40))),
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    println!(
        "{} Processed {} document(s): {} with confirmed attributes, {} without, {} failed",
        style("✓").green(),
        summary.total(),
        style(summary.succeeded.len()).green(),
        summary.no_match.len(),
        style(summary.failed.len()).red()
    );
    for (path, error) in &summary.failed {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            path.display(),
            truncate(error, 120)
        );
    }
    println!("  Results in {}", settings.output_dir.display());

    Ok(())
}
