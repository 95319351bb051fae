use super::{record_date, record_text};
use crate::constants::{DEFAULT_REASON, FDA_ENFORCEMENT_URL, FDA_PROVIDER, NATIONWIDE, UNKNOWN_BRAND, UNKNOWN_PRODUCT};
use crate::domain::Agency;
use crate::error::Result;
use crate::idempotency::fallback_recall_id;
use crate::normalize::fields::RecordView;
use crate::normalize::inference::{extract_states, infer_categories, infer_risk_level};
use crate::types::{ProviderQuery, ProviderRecall, RawProviderRecord, RecallProvider};
use chrono::{Months, NaiveDate, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

const MAX_PAGE: usize = 100;

/// openFDA food enforcement reports
pub struct FdaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for FdaProvider {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), FDA_ENFORCEMENT_URL)
    }
}

impl FdaProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// openFDA search expression: a `report_date` window AND an OR over
    /// product, firm, reason and recall-number phrase matches. `None` when neither applies.
    pub fn search_expression(query: &ProviderQuery, today: NaiveDate) -> Option<String> {
        let mut parts = Vec::new();

        if query.months_back > 0 {
            let start = today
                .checked_sub_months(Months::new(query.months_back))
                .unwrap_or(today);
            parts.push(format!(
                "report_date:[{} TO {}]",
                start.format("%Y%m%d"),
                today.format("%Y%m%d")
            ));
        }

        if let Some(term) = query.search_term() {
            let term = term.replace('"', "");
            let term = term.trim();
            if !term.is_empty() {
                parts.push(format!(
                    "(product_description:\"{term}\" OR recalling_firm:\"{term}\" OR reason_for_recall:\"{term}\" OR recall_number:\"{term}\")"
                ));
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }

    async fn request(&self, limit: usize, search: Option<&str>) -> Result<Vec<RawProviderRecord>> {
        let mut params = vec![("limit", limit.to_string()), ("sort", "report_date:desc".to_string())];
        if let Some(expr) = search {
            params.push(("search", expr.to_string()));
        }

        let response = self.client.get(&self.base_url).query(&params).send().await?;
        // openFDA answers 404 when a search matches nothing
        if response.status() == StatusCode::NOT_FOUND {
            debug!("FDA search returned no matches");
            return Ok(Vec::new());
        }
        let body: Value = response.error_for_status()?.json().await?;
        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

/// Map enforcement reports into provider recalls. Never fails on a record.
pub fn transform_fda_records(records: &[RawProviderRecord]) -> Vec<ProviderRecall> {
    records.iter().map(transform_fda_record).collect()
}

fn transform_fda_record(record: &RawProviderRecord) -> ProviderRecall {
    let view = RecordView::new(record);

    let product = view
        .text("product_description")
        .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
    let reason = view
        .text("reason_for_recall")
        .unwrap_or_else(|| DEFAULT_REASON.to_string());
    let company = view
        .first_text(&["recalling_firm", "firm_name"])
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string());
    let recall_date = record_date(&view, &["recall_initiation_date", "report_date"]);
    let recall_id = view.text("recall_number").unwrap_or_else(|| {
        let date = view.first_text(&["recall_initiation_date", "report_date"]).unwrap_or_default();
        fallback_recall_id("FDA", &[&product, &company, &date])
    });
    let distribution = record_text(&view, &["distribution_pattern"]);
    let states_affected = extract_states(distribution.as_deref().unwrap_or_default());
    let categories = infer_categories(&product, 3);

    ProviderRecall {
        recall_id,
        title: product.clone(),
        description: reason.clone(),
        risk_level: infer_risk_level(&reason),
        category: categories[0],
        categories,
        product,
        brand: company,
        reason,
        recall_date,
        agency: Agency::Fda,
        status: view
            .first_text(&["status", "recall_status"])
            .unwrap_or_else(|| "Ongoing".to_string()),
        distribution: distribution.unwrap_or_else(|| NATIONWIDE.to_string()),
        states_affected,
        is_active: view.text("termination_date").is_none(),
        article_link: None,
        raw_data: record.clone(),
    }
}

#[async_trait::async_trait]
impl RecallProvider for FdaProvider {
    fn provider_name(&self) -> &'static str {
        FDA_PROVIDER
    }

    fn agency(&self) -> Agency {
        Agency::Fda
    }

    #[instrument(skip(self), fields(provider = FDA_PROVIDER))]
    async fn fetch_raw(&self, query: &ProviderQuery) -> Result<Vec<RawProviderRecord>> {
        let limit = query.limit.clamp(1, MAX_PAGE);
        let expr = Self::search_expression(query, Utc::now().date_naive());

        let records = match self.request(limit, expr.as_deref()).await {
            Ok(records) => records,
            Err(e) if expr.is_some() => {
                warn!(error = %e, "FDA filtered query failed; retrying unfiltered");
                self.request(limit, None).await?
            }
            Err(e) => return Err(e),
        };

        info!("Successfully fetched {} records from FDA", records.len());
        Ok(records)
    }

    fn transform(&self, records: &[RawProviderRecord]) -> Vec<ProviderRecall> {
        transform_fda_records(records)
    }
}
