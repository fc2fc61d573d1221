//! Commands that build the LLM-derived caches.

use std::path::Path;

use console::style;

use specsift::cache::CacheDir;
use specsift::config::Settings;
use specsift::llm::LlmClient;

use super::helpers::load_schema;

async fn connect(settings: &Settings) -> anyhow::Result<LlmClient> {
    let client = LlmClient::new(settings.llm.clone());
    if !client.is_available().await {
        anyhow::bail!(
            "LLM service not available at {} (model: {})",
            settings.llm.endpoint,
            settings.llm.model
        );
    }
    println!(
        "{} Connected to LLM at {} (model: {})",
        style("✓").green(),
        settings.llm.endpoint,
        settings.llm.model
    );
    Ok(client)
}

/// Build (or rebuild) the product-type lookup and print it.
pub async fn cmd_lookup(settings: &Settings, schema_path: &Path, refresh: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let schema = load_schema(schema_path)?;
    let cache = CacheDir::new(settings.cache_dir());
    let client = connect(settings).await?;

    let lookup = if refresh {
        cache
            .rebuild_product_type_lookup(&schema, &client, settings.json_retries)
            .await?
    } else {
        cache
            .product_type_lookup(&schema, &client, settings.json_retries)
            .await?
    };

    for (product_type, terms) in &lookup {
        println!(
            "  {:<30} {}",
            style(product_type).bold(),
            terms.terms().join(", ")
        );
    }
    println!(
        "{} {} product type(s) in {}",
        style("✓").green(),
        lookup.len(),
        cache.lookup_path().display()
    );
    Ok(())
}

/// Build regex guidance for a schema and print it.
pub async fn cmd_guidance(settings: &Settings, schema_path: &Path) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let schema = load_schema(schema_path)?;
    let cache = CacheDir::new(settings.cache_dir());
    let client = connect(settings).await?;

    let guidance = cache
        .regex_guidance(
            &schema,
            &client,
            settings.grouping_threshold,
            settings.json_retries,
        )
        .await?;

    for name in schema.names() {
        match guidance.pair_regex(name) {
            Some(pattern) => println!("  {:<30} {}", style(name).bold(), pattern),
            None => println!("  {:<30} {}", style(name).bold(), style("(none)").dim()),
        }
    }
    println!(
        "{} Guidance cached at {}",
        style("✓").green(),
        cache.guidance_path(schema.content_hash()).display()
    );
    Ok(())
}
