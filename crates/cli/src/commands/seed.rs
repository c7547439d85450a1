//! Seed the catalog from a YAML file.
//!
//! The file is parsed and validated before any database connection is made.
//! Products and collections are upserted by handle, so a file can be
//! re-applied after edits.

use std::path::Path;

use tracing::{error, info};

use atelier_storefront::db::{self, seed::CatalogSeed};

use super::{CommandError, database_url};

/// Parse and validate a seed file.
fn load(path: &Path) -> Result<CatalogSeed, CommandError> {
    let content = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    info!(
        products = seed.products.len(),
        collections = seed.collections.len(),
        "Parsed catalog file"
    );

    if let Err(errors) = seed.validate() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Invalid(errors.len()));
    }

    info!("Catalog validated successfully");
    Ok(seed)
}

/// Seed the catalog from `path`. With `check_only`, stop after validation.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or is invalid, the
/// database URL is missing, or the seed transaction fails.
pub async fn catalog(path: &Path, check_only: bool) -> Result<(), CommandError> {
    let seed = load(path)?;
    if check_only {
        return Ok(());
    }

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let report = db::seed::seed_catalog(&pool, &seed).await?;

    info!("Seeding complete!");
    info!("  Products upserted: {}", report.products);
    info!("  Variants written: {}", report.variants);
    info!("  Collections upserted: {}", report.collections);

    Ok(())
}
