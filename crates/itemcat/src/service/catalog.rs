//! Catalog browsing and manual editing.

use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use super::ServiceError;
use crate::db::category_repo::{self, Category};
use crate::db::item_repo::{self, CategoryFilter, Item, ItemFields, ItemFilter, ItemView};
use crate::db::Database;

/// Query value selecting items without a category.
pub const UNCATEGORIZED: &str = "__uncategorized__";

/// Listing request. Pages are 1-based; zero or absent values use defaults.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
    /// A category id, or [`UNCATEGORIZED`].
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub items: Vec<ItemView>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    /// Never less than 1, even for an empty result.
    pub total_pages: u64,
}

#[derive(Clone)]
pub struct Catalog {
    db: Database,
    default_page_size: u64,
}

impl Catalog {
    pub fn new(db: Database, default_page_size: u64) -> Self {
        Self {
            db,
            default_page_size: default_page_size.max(1),
        }
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(category_repo::list_all(&self.db)?)
    }

    pub fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, ServiceError> {
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = query
            .page_size
            .filter(|s| *s > 0)
            .unwrap_or(self.default_page_size);

        let category = match query.category_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(UNCATEGORIZED) => Some(CategoryFilter::Uncategorized),
            Some(id) => Some(CategoryFilter::Id(id.to_string())),
        };
        let filter = ItemFilter {
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            category,
            limit: Some(page_size),
            offset: Some((page - 1).saturating_mul(page_size)),
        };

        let (items, total) = item_repo::query(&self.db, &filter)?;
        Ok(ItemPage {
            items,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size).max(1),
        })
    }

    pub fn get_item(&self, id: &str) -> Result<Item, ServiceError> {
        item_repo::find_by_id(&self.db, id)?.ok_or(ServiceError::NotFound("Item"))
    }

    pub fn create_item(&self, user_id: &str, fields: ItemFields) -> Result<Item, ServiceError> {
        let fields = self.validated(fields)?;
        let item = item_repo::insert(&self.db, &Uuid::new_v4().to_string(), &fields, Some(user_id))?;
        debug!("Item {} created by {}", item.id, user_id);
        Ok(item)
    }

    pub fn update_item(&self, user_id: &str, id: &str, fields: ItemFields) -> Result<Item, ServiceError> {
        let fields = self.validated(fields)?;
        if !item_repo::update(&self.db, id, &fields, Some(user_id))? {
            return Err(ServiceError::NotFound("Item"));
        }
        self.get_item(id)
    }

    /// Assigns an item to a category, or clears it with `None`.
    pub fn categorize_item(
        &self,
        user_id: &str,
        id: &str,
        category_id: Option<&str>,
    ) -> Result<Item, ServiceError> {
        let category_id = self.existing_category(category_id)?;
        if !item_repo::set_category(&self.db, id, category_id.as_deref(), Some(user_id))? {
            return Err(ServiceError::NotFound("Item"));
        }
        self.get_item(id)
    }

    /// Assigns every listed item to one category. Unknown ids and per-item
    /// failures are logged and skipped. Returns how many items changed.
    pub fn bulk_assign(
        &self,
        user_id: &str,
        item_ids: &[String],
        category_id: Option<&str>,
    ) -> Result<usize, ServiceError> {
        let category_id = self.existing_category(category_id)?;

        let mut updated = 0;
        for id in item_ids {
            match item_repo::set_category(&self.db, id, category_id.as_deref(), Some(user_id)) {
                Ok(true) => updated += 1,
                Ok(false) => warn!("Bulk assign: item {} not found", id),
                Err(e) => warn!("Bulk assign failed for item {}: {}", id, e),
            }
        }
        debug!("Bulk assigned {} of {} items", updated, item_ids.len());
        Ok(updated)
    }

    fn validated(&self, fields: ItemFields) -> Result<ItemFields, ServiceError> {
        let sku = fields.sku.trim().to_string();
        let name = fields.name.trim().to_string();
        if sku.is_empty() || name.is_empty() {
            return Err(ServiceError::InvalidInput("SKU and name required".to_string()));
        }
        Ok(ItemFields {
            sku,
            name,
            primary_detail: fields
                .primary_detail
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            category_id: self.existing_category(fields.category_id.as_deref())?,
        })
    }

    /// Normalizes an optional category id: empty means none, anything else
    /// must exist.
    fn existing_category(&self, category_id: Option<&str>) -> Result<Option<String>, ServiceError> {
        match category_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => Ok(None),
            Some(id) => match category_repo::find_by_id(&self.db, id)? {
                Some(category) => Ok(Some(category.id)),
                None => Err(ServiceError::InvalidInput(format!("Unknown category '{}'", id))),
            },
        }
    }
}
