//! Category taxonomy inspection

use anyhow::{Context, Result};
use tally_core::taxonomy::default_taxonomy_path;
use tally_core::CategoryTaxonomy;

/// Print the active taxonomy and where it came from
pub fn cmd_taxonomy() -> Result<()> {
    let override_path = default_taxonomy_path().filter(|p| p.exists());
    let taxonomy = CategoryTaxonomy::load().context("Failed to load category taxonomy")?;

    println!("Category Taxonomy v{}\n", taxonomy.version);
    for label in &taxonomy.categories {
        let marker = if *label == taxonomy.fallback {
            "  (fallback)"
        } else {
            ""
        };
        println!("  - {}{}", label, marker);
    }

    println!();
    match override_path {
        Some(path) => println!("Source: {}", path.display()),
        None => {
            println!("Source: built-in default");
            if let Some(path) = default_taxonomy_path() {
                println!("Override path: {}", path.display());
            }
        }
    }

    Ok(())
}
