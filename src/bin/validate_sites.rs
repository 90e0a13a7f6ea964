//! Site Catalog Validator
//!
//! Checks the site catalog before a scan:
//! - URLs parse and use http/https
//! - Site names are unique
//! - Unknown kinds (scanned as generic) and zero check frequencies are flagged

use anyhow::{Context, Result};
use std::fs;

use tender_scan::registry::{builtin_sites, validate_catalog, SitesFile};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    println!("=== Site Catalog Validator ===");

    let (label, yaml) = match std::env::var("TENDER_SITES_FILE") {
        Ok(path) => {
            let yaml = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read sites from {:?}", path))?;
            (path, yaml)
        }
        Err(_) => {
            let yaml = serde_yaml::to_string(&SitesFile { sites: builtin_sites() })
                .context("Failed to serialize built-in catalog")?;
            ("built-in catalog".to_string(), yaml)
        }
    };

    let issues = validate_catalog(&yaml).with_context(|| format!("Failed to parse {}", label))?;

    if issues.errors.is_empty() && issues.warnings.is_empty() {
        println!("✓ All sites in {} are valid", label);
        return Ok(());
    }

    if !issues.errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &issues.errors {
            println!("  - {}", error);
        }
    }

    if !issues.warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &issues.warnings {
            println!("  - {}", warning);
        }
    }

    if !issues.errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
