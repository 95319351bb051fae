//! Request-level orchestration: the live-versus-store race for listings,
//! single-recall lookup, full sync, recent news and provider health.

use crate::config::AggregationSettings;
use crate::domain::{Agency, Category, NormalizedRecall, Retailer, RiskLevel, SortField, SortOrder};
use crate::error::{RecallError, Result};
use crate::metrics;
use crate::normalize::{normalize, normalize_recall};
use crate::persister::{PersistQueue, Persister};
use crate::storage::{apply_find, FindOptions, RecallFilter, RecallStore};
use crate::types::{ProviderQuery, ProviderRecall, RecallProvider};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const LOOKUP_LIMIT: usize = 20;
const LOOKUP_MONTHS_BACK: u32 = 12;
const NEWS_MONTHS_BACK: u32 = 12;

/// Query-string shape of a list request. Every field is optional text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub retailer: Option<String>,
    pub risk_level: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
}

/// A validated list request
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub retailer: Option<Retailer>,
    pub risk_level: Option<RiskLevel>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub page: usize,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            retailer: None,
            risk_level: None,
            sort_field: SortField::RecallDate,
            sort_order: SortOrder::Desc,
            page: 1,
        }
    }
}

/// `None`, blank and `"all"` mean unconstrained
fn selector(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ListRequest {
    pub fn from_params(params: &ListParams) -> Result<Self> {
        let category = selector(params.category.as_deref())
            .map(|c| Category::parse(c).ok_or_else(|| RecallError::InvalidRequest(format!("unknown category '{c}'"))))
            .transpose()?;
        let retailer = selector(params.retailer.as_deref())
            .map(|r| Retailer::from_slug(r).ok_or_else(|| RecallError::InvalidRequest(format!("unknown retailer '{r}'"))))
            .transpose()?;
        let risk_level = selector(params.risk_level.as_deref())
            .map(|r| RiskLevel::parse(r).ok_or_else(|| RecallError::InvalidRequest(format!("unknown risk level '{r}'"))))
            .transpose()?;
        let sort_field = match params.sort_by.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => SortField::parse(s).ok_or_else(|| RecallError::InvalidRequest(format!("cannot sort by '{s}'")))?,
            None => SortField::RecallDate,
        };
        let page = match params.page.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(p) => p
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| RecallError::InvalidRequest(format!("page must be a positive integer, got '{p}'")))?,
            None => 1,
        };

        Ok(Self {
            search: params
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            category,
            retailer,
            risk_level,
            sort_field,
            sort_order: params.sort_order.as_deref().map(SortOrder::parse).unwrap_or_default(),
            page,
        })
    }

    /// Listings only show active recalls, whichever branch serves them
    pub fn filter(&self) -> RecallFilter {
        RecallFilter {
            active_only: true,
            search: self.search.clone(),
            category: self.category,
            retailer: self.retailer,
            risk_level: self.risk_level,
            agency: None,
        }
    }

    pub fn find_options(&self, page_size: usize) -> FindOptions {
        FindOptions::page(self.sort_field, self.sort_order, self.page, page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Store,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub records: Vec<NormalizedRecall>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub source: DataSource,
}

impl ListResponse {
    fn new(records: Vec<NormalizedRecall>, total: usize, page: usize, page_size: usize, source: DataSource) -> Self {
        Self {
            records,
            total,
            page,
            total_pages: total.div_ceil(page_size.max(1)),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched: usize,
    pub saved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider: &'static str,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Aggregator {
    providers: Vec<Arc<dyn RecallProvider>>,
    persister: Persister,
    queue: PersistQueue,
    settings: AggregationSettings,
}

impl Aggregator {
    pub fn new(
        providers: Vec<Arc<dyn RecallProvider>>,
        persister: Persister,
        queue: PersistQueue,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            providers,
            persister,
            queue,
            settings,
        }
    }

    fn store(&self) -> &Arc<dyn RecallStore> {
        self.persister.store()
    }

    fn live_query(&self, search: Option<&str>) -> ProviderQuery {
        ProviderQuery {
            limit: self.settings.live_limit,
            search: search.unwrap_or_default().to_string(),
            months_back: self.settings.months_back,
        }
    }

    /// Serve a page of recalls, from the providers when they answer in time
    /// and from the store otherwise
    #[instrument(skip(self), fields(page = request.page))]
    pub async fn list(&self, request: &ListRequest) -> Result<ListResponse> {
        let page_size = self.settings.page_size.max(1);
        let filter = request.filter();
        let options = request.find_options(page_size);

        if let Some(live) = self.race_live(self.live_query(request.search.as_deref())).await {
            let normalized = normalize_all(&live);
            let total = normalized.iter().filter(|r| filter.matches(r)).count();
            let records = apply_find(normalized.iter().cloned(), &filter, &options);
            self.queue.enqueue(normalized);
            debug!(total, "Serving live results");
            return Ok(ListResponse::new(records, total, request.page, page_size, DataSource::Live));
        }

        let store = self.store();
        let records = store.find(&filter, &options).await?;
        let total = store.count(&filter).await?;
        let records = records.iter().filter_map(normalize_recall).collect();
        debug!(total, "Serving stored results");
        Ok(ListResponse::new(records, total, request.page, page_size, DataSource::Store))
    }

    /// Race the merged provider fetch against the live timeout. `None` when the
    /// fetch timed out, panicked or came back empty. A fetch that loses the
    /// race keeps running and its result goes to the persist queue.
    async fn race_live(&self, query: ProviderQuery) -> Option<Vec<ProviderRecall>> {
        let providers = self.providers.clone();
        let limit = self.settings.live_limit;
        let started = Instant::now();
        let mut handle = tokio::spawn(async move { fetch_merged(&providers, &query, limit).await });
        let timeout = Duration::from_millis(self.settings.live_timeout_ms);

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(records)) => {
                metrics::live::duration(started.elapsed().as_secs_f64());
                if records.is_empty() {
                    metrics::live::fetch("empty");
                    info!("Live fetch returned nothing; falling back to store");
                    None
                } else {
                    metrics::live::fetch("success");
                    Some(records)
                }
            }
            Ok(Err(e)) => {
                metrics::live::fetch("empty");
                warn!(error = %e, "Live fetch task failed; falling back to store");
                None
            }
            Err(_) => {
                metrics::live::fetch("timeout");
                warn!(timeout_ms = self.settings.live_timeout_ms, "Live fetch timed out; falling back to store");
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    if let Ok(records) = handle.await {
                        metrics::live::duration(started.elapsed().as_secs_f64());
                        debug!(records = records.len(), "Late live results arrived");
                        queue.enqueue(normalize_all(&records));
                    }
                });
                None
            }
        }
    }

    /// Resolve one recall by its logical id: store first, then a provider
    /// search whose exact match is persisted before it is returned
    #[instrument(skip(self))]
    pub async fn lookup(&self, recall_id: &str) -> Result<Option<NormalizedRecall>> {
        let recall_id = recall_id.trim();
        if recall_id.is_empty() {
            return Err(RecallError::InvalidRequest("recall id must not be empty".into()));
        }

        if let Some(stored) = self.store().find_one(recall_id).await? {
            return Ok(Some(normalize_recall(&stored).unwrap_or(stored)));
        }

        let query = ProviderQuery {
            limit: LOOKUP_LIMIT,
            search: recall_id.to_string(),
            months_back: LOOKUP_MONTHS_BACK,
        };
        let found = fetch_merged(&self.providers, &query, LOOKUP_LIMIT).await;
        let Some(best) = found.iter().find(|r| r.recall_id.eq_ignore_ascii_case(recall_id)) else {
            debug!(candidates = found.len(), "No provider record matches recall id");
            return Ok(None);
        };
        let Some(normalized) = normalize(&best.to_record()) else {
            return Ok(None);
        };

        self.persister.persist(std::slice::from_ref(&normalized)).await?;
        Ok(Some(normalized))
    }

    /// Fetch everything the providers offer for the configured window and persist it
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let fetched = fetch_merged(&self.providers, &self.live_query(None), self.settings.live_limit).await;
        let normalized = normalize_all(&fetched);
        let saved = self.persister.persist(&normalized).await?;
        info!(fetched = fetched.len(), saved, "Sync complete");
        Ok(SyncReport {
            fetched: fetched.len(),
            saved,
        })
    }

    /// Most recent FDA recalls, normalized. Empty when FDA is not enabled or fails.
    pub async fn recent_news(&self, limit: usize) -> Vec<NormalizedRecall> {
        let Some(fda) = self.providers.iter().find(|p| p.agency() == Agency::Fda) else {
            return Vec::new();
        };
        let query = ProviderQuery {
            limit: limit.max(1),
            search: String::new(),
            months_back: NEWS_MONTHS_BACK,
        };
        let mut recalls = fda.fetch_recalls(&query).await;
        recalls.sort_by(|a, b| b.recall_date.cmp(&a.recall_date));
        recalls.truncate(limit);
        normalize_all(&recalls)
    }

    /// Probe each provider concurrently
    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        let handles: Vec<_> = self
            .providers
            .iter()
            .cloned()
            .map(|provider| {
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = provider.health_check().await;
                    let response_time_ms = started.elapsed().as_millis() as u64;
                    match result {
                        Ok(()) => ProviderHealth {
                            provider: provider.provider_name(),
                            status: HealthStatus::Healthy,
                            response_time_ms,
                            error: None,
                        },
                        Err(e) => ProviderHealth {
                            provider: provider.provider_name(),
                            status: HealthStatus::Unhealthy,
                            response_time_ms,
                            error: Some(e.to_string()),
                        },
                    }
                })
            })
            .collect();

        let mut report = Vec::with_capacity(handles.len());
        for (handle, provider) in handles.into_iter().zip(&self.providers) {
            match handle.await {
                Ok(health) => report.push(health),
                Err(e) => report.push(ProviderHealth {
                    provider: provider.provider_name(),
                    status: HealthStatus::Unhealthy,
                    response_time_ms: 0,
                    error: Some(e.to_string()),
                }),
            }
        }
        report
    }
}

fn normalize_all(records: &[ProviderRecall]) -> Vec<NormalizedRecall> {
    records.iter().filter_map(|r| normalize(&r.to_record())).collect()
}

/// Query every provider concurrently, merge in provider order, drop repeated
/// `recallId`s, newest first, at most `limit` records
pub async fn fetch_merged(
    providers: &[Arc<dyn RecallProvider>],
    query: &ProviderQuery,
    limit: usize,
) -> Vec<ProviderRecall> {
    let handles: Vec<_> = providers
        .iter()
        .cloned()
        .map(|provider| {
            let query = query.clone();
            tokio::spawn(async move { provider.fetch_recalls(&query).await })
        })
        .collect();

    let mut merged = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(records) => merged.extend(records),
            Err(e) => warn!(error = %e, "Provider task failed"),
        }
    }

    let mut seen = HashSet::new();
    merged.retain(|r| seen.insert(r.recall_id.clone()));
    merged.sort_by(|a, b| b.recall_date.cmp(&a.recall_date));
    merged.truncate(limit);
    merged
}
