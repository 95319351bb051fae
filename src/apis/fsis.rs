use super::{record_date, record_text};
use crate::constants::{
    DEFAULT_REASON, FSIS_PROVIDER, FSIS_RECALL_URL, MULTIPLE_STATES, NATIONWIDE, UNKNOWN_BRAND, UNKNOWN_PRODUCT,
};
use crate::domain::Agency;
use crate::error::Result;
use crate::idempotency::fallback_recall_id;
use crate::normalize::cleaners::strip_html;
use crate::normalize::dates::parse_date_value;
use crate::normalize::fields::RecordView;
use crate::normalize::inference::{extract_states, extract_states_from_list, infer_categories, infer_risk_level};
use crate::types::{ProviderQuery, ProviderRecall, RawProviderRecord, RecallProvider};
use chrono::{DateTime, Months, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, info, instrument};

const FSIS_SITE: &str = "https://www.fsis.usda.gov";
const LONG_PRODUCT_CHARS: usize = 250;

const PRODUCT_FIELDS: &[&str] = &["Product", "product_name", "field_title", "field_product_items", "field_summary"];
const REASON_FIELDS: &[&str] = &["Reason", "reason", "field_recall_reason", "field_summary"];
const DATE_FIELDS: &[&str] = &["ReleaseDate", "Date", "field_recall_date", "field_last_modified_date", "recall_date"];
const FIRM_FIELDS: &[&str] = &["Firm", "establishment", "field_establishment", "company"];
const NUMBER_FIELDS: &[&str] = &["RecallNumber", "recall_number", "field_recall_number"];
const DISTRIBUTION_FIELDS: &[&str] = &["Distribution", "distribution", "field_distro_list", "field_states"];
const LINK_FIELDS: &[&str] = &["field_recall_url", "RecallUrl", "RecallURL", "recall_url", "recallUrl", "URL"];

static DOCUMENT_LINKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\S+\.(?:pdf|docx?|xlsx?)\b|https?://\S+").unwrap());

/// USDA FSIS recall and public health alert feed
pub struct FsisProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for FsisProvider {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), FSIS_RECALL_URL)
    }
}

impl FsisProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// The feed has no query parameters; window, search and limit apply here
pub fn filter_fsis_records(
    records: Vec<RawProviderRecord>,
    query: &ProviderQuery,
    now: DateTime<Utc>,
) -> Vec<RawProviderRecord> {
    let cutoff = (query.months_back > 0)
        .then(|| now.checked_sub_months(Months::new(query.months_back)))
        .flatten();
    let term = query.search_term().map(str::to_lowercase);

    records
        .into_iter()
        .filter(|record| {
            let view = RecordView::new(record);
            let in_window = match cutoff {
                // undated records are treated as current
                Some(cutoff) => DATE_FIELDS
                    .iter()
                    .filter_map(|k| view.get(k))
                    .find_map(parse_date_value)
                    .map_or(true, |d| d >= cutoff),
                None => true,
            };
            let matches_search = match &term {
                Some(term) => [
                    view.first_text(&["Product", "product_name", "field_title"]),
                    view.first_text(&["Firm", "establishment", "field_establishment"]),
                    view.first_text(REASON_FIELDS),
                    view.first_text(NUMBER_FIELDS),
                ]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(term.as_str())),
                None => true,
            };
            in_window && matches_search
        })
        .take(query.limit)
        .collect()
}

/// Map FSIS records into provider recalls. Never fails on a record.
pub fn transform_fsis_records(records: &[RawProviderRecord]) -> Vec<ProviderRecall> {
    records.iter().map(transform_fsis_record).collect()
}

/// Long product blurbs are HTML; keep the first sentence of the plain text
fn concise_product(text: &str) -> String {
    if text.chars().count() <= LONG_PRODUCT_CHARS {
        return text.to_string();
    }
    let plain = strip_html(text);
    plain
        .split(['.', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_PRODUCT)
        .to_string()
}

fn resolve_distribution(view: &RecordView<'_>) -> (String, Vec<String>) {
    let list = DISTRIBUTION_FIELDS.iter().find_map(|k| view.str_list(k));
    let text = DISTRIBUTION_FIELDS.iter().find_map(|k| view.text(k));

    let states = match (&list, &text) {
        (Some(list), _) => extract_states_from_list(list),
        (None, Some(text)) => extract_states(&strip_html(text)),
        (None, None) => vec![NATIONWIDE.to_string()],
    };

    let distribution = match states.as_slice() {
        [only] if only == MULTIPLE_STATES => {
            // no state codes found; keep whatever the free text said, minus document links
            let cleaned = text
                .map(|t| DOCUMENT_LINKS.replace_all(&strip_html(&t), "").trim().to_string())
                .unwrap_or_default();
            if cleaned.is_empty() {
                MULTIPLE_STATES.to_string()
            } else {
                cleaned
            }
        }
        [only] if only == NATIONWIDE => NATIONWIDE.to_string(),
        codes => codes.join(", "),
    };
    (distribution, states)
}

fn resolve_link(view: &RecordView<'_>) -> Option<String> {
    let link = view.first_text(LINK_FIELDS)?;
    if link.starts_with('/') {
        Some(format!("{FSIS_SITE}{link}"))
    } else {
        Some(link)
    }
}

fn transform_fsis_record(record: &RawProviderRecord) -> ProviderRecall {
    let view = RecordView::new(record);

    let product = concise_product(&view.first_text(PRODUCT_FIELDS).unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()));
    let reason = view
        .first_text(REASON_FIELDS)
        .map(|r| strip_html(&r))
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REASON.to_string());
    let company = view
        .first_text(FIRM_FIELDS)
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string());
    let recall_date = record_date(&view, DATE_FIELDS);
    let recall_id = view.first_text(NUMBER_FIELDS).unwrap_or_else(|| {
        let date = record_text(&view, DATE_FIELDS).unwrap_or_default();
        fallback_recall_id("FSIS", &[&product, &company, &date])
    });
    let (distribution, states_affected) = resolve_distribution(&view);
    let categories = infer_categories(&product, 3);

    let status_text = view.text("Status").unwrap_or_default().to_lowercase();
    let active_flag = view
        .first_text(&["Status", "field_active_notice"])
        .unwrap_or_default()
        .to_lowercase();
    let is_active = active_flag != "false" && status_text != "completed";

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
        agency: Agency::Fsis,
        status: view
            .first_text(&["Status", "status", "field_recall_type"])
            .unwrap_or_else(|| "Ongoing".to_string()),
        distribution,
        states_affected,
        is_active,
        article_link: resolve_link(&view),
        raw_data: record.clone(),
    }
}

#[async_trait::async_trait]
impl RecallProvider for FsisProvider {
    fn provider_name(&self) -> &'static str {
        FSIS_PROVIDER
    }

    fn agency(&self) -> Agency {
        Agency::Fsis
    }

    #[instrument(skip(self), fields(provider = FSIS_PROVIDER))]
    async fn fetch_raw(&self, query: &ProviderQuery) -> Result<Vec<RawProviderRecord>> {
        let response = self
            .client
            .get(&self.base_url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        let records = match body {
            Value::Array(items) => items,
            other => other
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };
        debug!("FSIS feed returned {} records before filtering", records.len());

        let filtered = filter_fsis_records(records, query, Utc::now());
        info!("Successfully fetched {} records from FSIS", filtered.len());
        Ok(filtered)
    }

    fn transform(&self, records: &[RawProviderRecord]) -> Vec<ProviderRecall> {
        transform_fsis_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, RiskLevel};
    use chrono::{Datelike, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_filter_window_search_and_limit() {
        let records = vec![
            json!({"Product": "Beef Jerky", "Firm": "Acme", "ReleaseDate": "2025-09-01"}),
            json!({"Product": "Pork Sausage", "Firm": "Hill Farms", "ReleaseDate": "2024-01-01"}),
            json!({"Product": "Chicken Nuggets", "Firm": "Acme", "ReleaseDate": "2025-08-15"}),
            json!({"Product": "Turkey Breast", "Firm": "Other Co"}),
        ];
        let q = ProviderQuery { limit: 10, search: String::new(), months_back: 6 };
        assert_eq!(filter_fsis_records(records.clone(), &q, now()).len(), 3);

        let q = ProviderQuery { limit: 10, search: "ACME".into(), months_back: 6 };
        assert_eq!(filter_fsis_records(records.clone(), &q, now()).len(), 2);

        let q = ProviderQuery { limit: 1, search: String::new(), months_back: 0 };
        assert_eq!(filter_fsis_records(records, &q, now()).len(), 1);
    }

    #[test]
    fn test_filter_window_reads_site_feed_dates() {
        let records = vec![
            json!({"field_title": "Pork Sausage", "field_recall_date": "2024-01-05"}),
            json!({"field_title": "Beef Jerky", "field_last_modified_date": "2025-09-02"}),
        ];
        let q = ProviderQuery { limit: 10, search: String::new(), months_back: 6 };
        let kept = filter_fsis_records(records, &q, now());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["field_title"], "Beef Jerky");
    }

    #[test]
    fn test_transform_record() {
        let raw = json!({
            "field_title": "Hill Farms Recalls Ready-To-Eat Pork Sausage Products",
            "field_establishment": "Hill Farms Inc.",
            "field_recall_reason": "<p>Product Contamination with Listeria</p>",
            "field_recall_date": "2025-09-12",
            "field_recall_number": "045-2025",
            "field_states": "Texas, TX, OK",
            "field_recall_url": "/recalls/hill-farms-sausage",
            "field_active_notice": "True"
        });
        let r = &transform_fsis_records(&[raw])[0];
        assert_eq!(r.recall_id, "045-2025");
        assert_eq!(r.reason, "Product Contamination with Listeria");
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.category, Category::Pork);
        assert_eq!(r.states_affected, vec!["OK", "TX"]);
        assert_eq!(r.distribution, "OK, TX");
        assert_eq!(r.article_link.as_deref(), Some("https://www.fsis.usda.gov/recalls/hill-farms-sausage"));
        assert_eq!((r.recall_date.year(), r.recall_date.month(), r.recall_date.day()), (2025, 9, 12));
        assert!(r.is_active);
        assert_eq!(r.agency, Agency::Fsis);
    }

    #[test]
    fn test_distribution_without_codes_keeps_clean_text() {
        let raw = json!({
            "Product": "Ground Beef",
            "Distribution": "Retail stores, see list https://example.com/stores.pdf"
        });
        let r = &transform_fsis_records(&[raw])[0];
        assert_eq!(r.states_affected, vec![MULTIPLE_STATES]);
        assert_eq!(r.distribution, "Retail stores, see list");
    }

    #[test]
    fn test_long_html_product_is_shortened() {
        let blurb = format!("<p>Frozen chicken dumplings. {}</p>", "Additional detail text. ".repeat(20));
        let r = &transform_fsis_records(&[json!({"field_summary": blurb})])[0];
        assert_eq!(r.product, "Frozen chicken dumplings");
        assert_eq!(r.category, Category::Grains);
    }

    #[test]
    fn test_inactive_flags_and_fallback_id() {
        let r = &transform_fsis_records(&[json!({"Status": "Completed"}), json!({"field_active_notice": "False"})]);
        assert!(!r[0].is_active);
        assert!(!r[1].is_active);
        assert!(r[0].recall_id.starts_with("FSIS-"));
        assert_eq!(r[0].product, UNKNOWN_PRODUCT);
    }
}
