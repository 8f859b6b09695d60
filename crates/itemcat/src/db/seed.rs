//! Seed data: the default category set and a few sample items.

use log::info;

use super::category_repo::{self, Category};
use super::item_repo::{self, ItemFields};
use super::{Database, DatabaseError};

/// Default categories as (slug id, display name).
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("electronics", "Electronics"),
    ("home-kitchen", "Home & Kitchen"),
    ("clothing", "Clothing"),
    ("beauty-personal-care", "Beauty & Personal Care"),
    ("sports-outdoors", "Sports & Outdoors"),
    ("books", "Books"),
    ("toys-games", "Toys & Games"),
    ("automotive", "Automotive"),
    ("grocery", "Grocery"),
    ("office-products", "Office Products"),
    ("health-household", "Health & Household"),
    ("tools-home-improvement", "Tools & Home Improvement"),
    ("garden-outdoor", "Garden & Outdoor"),
    ("pet-supplies", "Pet Supplies"),
    ("other", "Other"),
];

const SAMPLE_ITEMS: &[(&str, &str, &str, &str)] = &[
    ("i1", "SKU-100", "Smartphone", "Brand X"),
    ("i2", "SKU-200", "T-Shirt", "Cotton, Size M"),
    ("i3", "SKU-300", "Vacuum Cleaner", "Bagless, 1200W"),
];

/// Inserts every default category whose name or slug is not present yet.
/// Returns the number inserted.
pub fn ensure_default_categories(db: &Database) -> Result<usize, DatabaseError> {
    let mut inserted = 0;
    for (id, name) in DEFAULT_CATEGORIES {
        if category_repo::find_by_id(db, id)?.is_some()
            || category_repo::find_by_name_ci(db, name)?.is_some()
        {
            continue;
        }
        category_repo::insert(
            db,
            &Category {
                id: id.to_string(),
                name: name.to_string(),
            },
        )?;
        inserted += 1;
    }
    if inserted > 0 {
        info!("Seeded {} default categories", inserted);
    }
    Ok(inserted)
}

/// Inserts the sample items when the catalog is empty.
pub fn ensure_sample_items(db: &Database) -> Result<usize, DatabaseError> {
    if item_repo::count(db)? > 0 {
        return Ok(0);
    }
    for (id, sku, name, detail) in SAMPLE_ITEMS {
        item_repo::insert(
            db,
            id,
            &ItemFields {
                sku: sku.to_string(),
                name: name.to_string(),
                primary_detail: Some(detail.to_string()),
                category_id: None,
            },
            None,
        )?;
    }
    info!("Seeded {} sample items", SAMPLE_ITEMS.len());
    Ok(SAMPLE_ITEMS.len())
}

/// Runs all seeding steps. Idempotent.
pub fn run(db: &Database) -> Result<(), DatabaseError> {
    ensure_default_categories(db)?;
    ensure_sample_items(db)?;
    Ok(())
}
