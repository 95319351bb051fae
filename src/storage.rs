pub mod in_memory;
pub mod sqlite;

use crate::config::{StorageBackend, StorageSettings};
use crate::domain::{compare_recalls, Agency, Category, NormalizedRecall, Retailer, RiskLevel, SortField, SortOrder};
use crate::error::Result;
use crate::normalize::inference::category_keywords;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Filter criteria shared by the live branch and the store query.
/// `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecallFilter {
    pub active_only: bool,
    pub search: Option<String>,
    pub category: Option<Category>,
    pub retailer: Option<Retailer>,
    pub risk_level: Option<RiskLevel>,
    pub agency: Option<Agency>,
}

impl RecallFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    /// Case-insensitive substring search over title, description, product and brand.
    /// A category matches its own records plus any record whose text names one of
    /// the category's keywords, so untagged legacy rows still surface.
    pub fn matches(&self, recall: &NormalizedRecall) -> bool {
        if self.active_only && !recall.is_active {
            return false;
        }
        if self.retailer.is_some_and(|r| r != recall.retailer) {
            return false;
        }
        if self.risk_level.is_some_and(|r| r != recall.risk_level) {
            return false;
        }
        if self.agency.is_some_and(|a| a != recall.agency) {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let term = term.to_lowercase();
            let hit = [&recall.title, &recall.description, &recall.product, &recall.brand]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        if let Some(category) = self.category {
            if recall.category != category && !mentions_category(recall, category) {
                return false;
            }
        }
        true
    }
}

fn mentions_category(recall: &NormalizedRecall, category: Category) -> bool {
    let keywords = category_keywords(category);
    if keywords.is_empty() {
        return false;
    }
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"(?i)\b(?:{alternation})(?:s|es)?\b")) {
        Ok(re) => [&recall.title, &recall.product, &recall.description]
            .iter()
            .any(|field| re.is_match(field)),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Options for 1-based `page` of `page_size`
    pub fn page(sort_field: SortField, sort_order: SortOrder, page: usize, page_size: usize) -> Self {
        Self {
            sort_field,
            sort_order,
            skip: page.saturating_sub(1) * page_size,
            limit: Some(page_size),
        }
    }
}

/// A document as written, with the key it is stored under. Seeded legacy
/// documents may be keyed by something other than their `recallId`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub document: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// The recall collection, keyed by `recallId`
#[async_trait]
pub trait RecallStore: Send + Sync {
    async fn find(&self, filter: &RecallFilter, options: &FindOptions) -> Result<Vec<NormalizedRecall>>;
    async fn find_one(&self, recall_id: &str) -> Result<Option<NormalizedRecall>>;
    /// Create or fully replace the entry for `recall.recall_id`
    async fn upsert(&self, recall: &NormalizedRecall) -> Result<UpsertOutcome>;
    async fn count(&self, filter: &RecallFilter) -> Result<usize>;
    async fn delete_many(&self, filter: &RecallFilter) -> Result<usize>;
    /// Remove the entry stored under `key`
    async fn remove(&self, key: &str) -> Result<bool>;
    /// Every stored document as written, for bulk re-normalization
    async fn all(&self) -> Result<Vec<StoredDocument>>;
}

/// Filter, stable-sort and slice. Shared by both backends so query semantics
/// match the live branch exactly.
pub fn apply_find(
    records: impl IntoIterator<Item = NormalizedRecall>,
    filter: &RecallFilter,
    options: &FindOptions,
) -> Vec<NormalizedRecall> {
    let mut matched: Vec<NormalizedRecall> = records.into_iter().filter(|r| filter.matches(r)).collect();
    matched.sort_by(|a, b| compare_recalls(a, b, options.sort_field, options.sort_order));
    let page = matched.into_iter().skip(options.skip);
    match options.limit {
        Some(limit) => page.take(limit).collect(),
        None => page.collect(),
    }
}

/// Open the configured backend
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn RecallStore>> {
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&settings.sqlite_path)?)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    pub fn recall(id: &str, product: &str, day: u32) -> NormalizedRecall {
        NormalizedRecall {
            recall_id: id.to_string(),
            title: format!("{product} - Acme"),
            product: product.to_string(),
            brand: "Acme".to_string(),
            description: "No description available".to_string(),
            reason: "Undeclared soy".to_string(),
            category: Category::Other,
            tags: BTreeSet::new(),
            risk_level: RiskLevel::Medium,
            retailer: Retailer::VariousRetailers,
            agency: Agency::Fda,
            status: RecallStatus::Ongoing,
            distribution: "Nationwide".to_string(),
            states_affected: vec!["Nationwide".to_string()],
            recall_date: Utc.with_ymd_and_hms(2025, 9, day, 0, 0, 0).unwrap(),
            article_link: "https://www.fda.gov/search".to_string(),
            is_active: true,
        }
    }
}
