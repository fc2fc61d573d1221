//! Shared helpers for CLI commands.

use std::path::{Path, PathBuf};

use console::style;

use specsift::config::Settings;
use specsift::layout::JsonLayoutDetector;
use specsift::matching::FuzzyMatcher;
use specsift::Schema;

/// Load a schema, refusing an empty one.
pub fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let schema = Schema::load(path)?;
    if schema.is_empty() {
        anyhow::bail!("Schema {} defines no attributes", path.display());
    }
    println!(
        "{} Loaded {} attribute(s) over {} product type(s) from {}",
        style("✓").green(),
        schema.len(),
        schema.product_types().len(),
        path.display()
    );
    Ok(schema)
}

/// Explicit inputs followed by every document in `input_dir`, sorted by
/// name. Hidden entries and layout sidecars are skipped.
pub fn collect_inputs(
    mut inputs: Vec<PathBuf>,
    input_dir: Option<&Path>,
) -> anyhow::Result<Vec<PathBuf>> {
    if let Some(dir) = input_dir {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| !is_hidden(p) && !JsonLayoutDetector::is_sidecar(p))
            .collect();
        entries.sort();
        inputs.extend(entries);
    }
    Ok(inputs)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Print the OCR-confusion variants of a term.
pub fn cmd_variants(settings: &Settings, term: &str, limit: usize) {
    let matcher = FuzzyMatcher::new(settings.variant_limits);
    let variants = matcher.variants(term);
    println!(
        "{} {} variant(s) of {}",
        style("→").cyan(),
        variants.len(),
        style(term).bold()
    );
    let shown = if limit == 0 { variants.len() } else { limit };
    for variant in variants.iter().take(shown) {
        println!("  {}", variant);
    }
    if variants.len() > shown {
        println!("  {} more", style(format!("... {}", variants.len() - shown)).dim());
    }
}

/// Truncate a string for display, adding an ellipsis if cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_inputs_skips_sidecars_and_hidden() {
        let dir = tempdir().unwrap();
        for name in ["sheet.json", "sheet.layout.json", ".DS_Store", "b_pages"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let inputs = collect_inputs(vec![PathBuf::from("first.json")], Some(dir.path())).unwrap();
        assert_eq!(
            inputs,
            vec![
                PathBuf::from("first.json"),
                dir.path().join("b_pages"),
                dir.path().join("sheet.json"),
            ]
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
