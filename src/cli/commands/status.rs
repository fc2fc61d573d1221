//! Status command.

use console::style;

use specsift::cache::CacheDir;
use specsift::config::{Config, Settings};
use specsift::layout::{JsonLayoutDetector, LayoutDetector};
use specsift::llm::LlmClient;
use specsift::ocr::{OcrEngine, PaddleJsonEngine};

/// Show effective configuration and whether collaborators are reachable.
pub async fn cmd_status(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("{}", style("Configuration").bold());
    match config.source_path {
        Some(ref path) => println!("  Config file:     {}", path.display()),
        None => println!("  Config file:     {}", style("(defaults)").dim()),
    }
    println!("  Output dir:      {}", settings.output_dir.display());
    println!("  Cache dir:       {}", settings.cache_dir().display());
    println!("  Sort inputs:     {}", settings.sort_inputs);
    println!(
        "  Overlap:         {} (table class {})",
        settings.table.overlap_threshold, settings.table.table_class
    );
    println!(
        "  Variant limits:  warn {} / cap {}",
        settings.variant_limits.warn_threshold, settings.variant_limits.hard_cap
    );

    println!();
    println!("{}", style("Collaborators").bold());
    let ocr = PaddleJsonEngine::new();
    println!("  {} OCR engine: {}", style("✓").green(), ocr.name());
    let layout = JsonLayoutDetector::new();
    println!("  {} Layout detector: {}", style("✓").green(), layout.name());

    let client = LlmClient::new(settings.llm.clone());
    if client.is_available().await {
        println!(
            "  {} LLM: {} (model: {})",
            style("✓").green(),
            settings.llm.endpoint,
            settings.llm.model
        );
    } else {
        println!(
            "  {} LLM not reachable at {} (model: {})",
            style("✗").red(),
            settings.llm.endpoint,
            settings.llm.model
        );
    }

    let cache = CacheDir::new(settings.cache_dir());
    match cache.load_lookup() {
        Ok(Some(lookup)) => println!(
            "  {} Lookup cache: {} product type(s)",
            style("✓").green(),
            lookup.len()
        ),
        Ok(None) => println!("  {} Lookup cache: not built yet", style("-").dim()),
        Err(e) => println!("  {} Lookup cache: {}", style("✗").red(), e),
    }
    Ok(())
}
