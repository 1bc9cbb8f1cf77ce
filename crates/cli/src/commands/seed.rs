//! Seed the catalog from a YAML file.
//!
//! Categories are matched by name and products by name within their
//! category, so running the same file twice updates rows instead of
//! duplicating them.
//!
//! ```yaml
//! categories:
//!   - name: Consoles
//!     description: Home and handheld consoles
//! products:
//!   - name: PlayStation 5
//!     category: Consoles
//!     price: "549.99"
//!     sale_price: "499.99"
//!     stock: 12
//!     featured: true
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use gamerly_core::{CategoryDraft, CategoryId, Money, ProductDraft, ProductStatus};
use gamerly_storefront::db::CatalogRepository;

use super::connect;

/// Top-level shape of a catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategoryDraft>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// A product row, naming its category instead of referencing an id.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
}

impl ProductSeed {
    fn draft(&self, category_id: CategoryId) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            sale_price: self.sale_price,
            category_id,
            stock: self.stock,
            status: self.status,
            featured: self.featured,
        }
    }
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub categories_created: usize,
    pub categories_updated: usize,
    pub products_created: usize,
    pub products_updated: usize,
}

/// Problems found in a seed file before touching the database.
///
/// Categories must be declared in the file; a product that names an
/// unknown category is an error.
#[must_use]
pub fn validate_seed(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (i, category) in seed.categories.iter().enumerate() {
        match category.clone().validate() {
            Ok(valid) => {
                if !names.insert(valid.name.clone()) {
                    errors.push(format!("category \"{}\" is listed twice", valid.name));
                }
            }
            Err(e) => errors.push(format!("category #{}: {e}", i + 1)),
        }
    }

    for product in &seed.products {
        let label = if product.name.trim().is_empty() {
            "(unnamed product)".to_owned()
        } else {
            format!("product \"{}\"", product.name.trim())
        };
        if !names.contains(product.category.trim()) {
            errors.push(format!(
                "{label}: unknown category \"{}\"",
                product.category.trim()
            ));
        }
        if let Err(e) = product.draft(CategoryId::new(0)).validate() {
            errors.push(format!("{label}: {e}"));
        }
    }

    errors
}

/// Seed categories and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database operation fails.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog seed");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Seed file is valid (dry run, nothing written)");
        return Ok(());
    }

    let pool = connect().await?;
    let result = apply(&CatalogRepository::new(&pool), seed).await?;

    info!("Seeding complete!");
    info!(
        "  Categories: {} created, {} updated",
        result.categories_created, result.categories_updated
    );
    info!(
        "  Products: {} created, {} updated",
        result.products_created, result.products_updated
    );
    Ok(())
}

async fn apply(
    catalog: &CatalogRepository<'_>,
    seed: CatalogSeed,
) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let mut result = SeedResult::default();

    for draft in seed.categories {
        let draft = draft.validate()?;
        match catalog.get_category_by_name(&draft.name).await? {
            Some(existing) => {
                catalog.update_category(existing.id, &draft).await?;
                result.categories_updated += 1;
            }
            None => {
                catalog.create_category(&draft).await?;
                result.categories_created += 1;
            }
        }
    }

    for product in seed.products {
        let category = catalog
            .get_category_by_name(product.category.trim())
            .await?
            .ok_or_else(|| format!("category \"{}\" not found", product.category.trim()))?;
        let input = product.draft(category.id).validate()?;

        match catalog.find_product_id(&input.name, category.id).await? {
            Some(id) => {
                catalog.update_product(id, &input).await?;
                result.products_updated += 1;
            }
            None => {
                catalog.create_product(&input, None).await?;
                result.products_created += 1;
            }
        }
    }

    Ok(result)
}
