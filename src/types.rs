use crate::domain::{Agency, Category, RiskLevel};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Raw recall data as returned from a provider feed
pub type RawProviderRecord = serde_json::Value;

/// Query parameters shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuery {
    pub limit: usize,
    pub search: String,
    pub months_back: u32,
}

impl Default for ProviderQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            search: String::new(),
            months_back: 5,
        }
    }
}

impl ProviderQuery {
    pub fn search_term(&self) -> Option<&str> {
        let s = self.search.trim();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

/// A provider record after transformation. Partially normalized: the
/// recall normalizer still runs over it before it is stored or displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecall {
    pub recall_id: String,
    pub title: String,
    pub description: String,
    pub product: String,
    pub brand: String,
    pub reason: String,
    pub recall_date: DateTime<Utc>,
    pub agency: Agency,
    pub risk_level: RiskLevel,
    pub category: Category,
    pub categories: Vec<Category>,
    pub status: String,
    pub distribution: String,
    pub states_affected: Vec<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_link: Option<String>,
    /// Original provider record, kept for debugging and for the normalizer's raw fallbacks
    pub raw_data: RawProviderRecord,
}

impl ProviderRecall {
    /// Generic record view consumed by the normalizer
    pub fn to_record(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Core trait that every recall feed must implement
#[async_trait::async_trait]
pub trait RecallProvider: Send + Sync {
    /// Unique identifier for this provider
    fn provider_name(&self) -> &'static str;

    fn agency(&self) -> Agency;

    /// Fetch raw records from the feed. Errors describe batch-level failure.
    async fn fetch_raw(&self, query: &ProviderQuery) -> Result<Vec<RawProviderRecord>>;

    /// Map raw records into provider recalls. Never fails on individual records.
    fn transform(&self, records: &[RawProviderRecord]) -> Vec<ProviderRecall>;

    /// Fetch and transform, surfacing batch failures to the caller
    async fn try_fetch_recalls(&self, query: &ProviderQuery) -> Result<Vec<ProviderRecall>> {
        let raw = self.fetch_raw(query).await?;
        Ok(self.transform(&raw))
    }

    /// Cheapest request that proves the feed answers
    async fn health_check(&self) -> Result<()> {
        let probe = ProviderQuery {
            limit: 1,
            search: String::new(),
            months_back: 0,
        };
        self.fetch_raw(&probe).await.map(|_| ())
    }

    /// Fetch and transform, degrading batch failures to an empty list
    async fn fetch_recalls(&self, query: &ProviderQuery) -> Vec<ProviderRecall> {
        match self.try_fetch_recalls(query).await {
            Ok(recalls) => recalls,
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "Provider fetch failed; returning no live records");
                crate::metrics::providers::failure(self.provider_name());
                Vec::new()
            }
        }
    }
}
