//! Recall normalization: any record shape in, a fully populated `NormalizedRecall` out.
//!
//! Store documents, transformer output and raw provider payloads all go
//! through [`normalize`]. Every field resolves through an ordered fallback
//! chain with a terminal default, so the function is total. Running it over
//! its own output is a fixed point, which is what backfill relies on.

pub mod cleaners;
pub mod dates;
pub mod fields;
pub mod inference;
pub mod links;

use crate::constants::{DEFAULT_DESCRIPTION, DEFAULT_REASON, DEFAULT_TITLE, NATIONWIDE, UNKNOWN_BRAND, UNKNOWN_PRODUCT};
use crate::domain::{Agency, Category, NormalizedRecall, RecallStatus, Retailer};
use crate::idempotency::fallback_recall_id;
use chrono::{DateTime, Utc};
use serde_json::Value;

use cleaners::{clean_brand_name, clean_product_title, generate_slug, is_junk_product, is_non_food_item, is_usable_product_source};
use dates::parse_date_value;
use fields::{first_non_empty, RecordView};
use inference::{extract_states, extract_states_from_list, infer_category, infer_risk_level, infer_tags};
use links::{is_usable_link, synthesize_article_link};

const DATE_FIELDS: &[&str] = &[
    "recallDate",
    "releaseDate",
    "date",
    "recall_initiation_date",
    "report_date",
    "ReleaseDate",
    "Date",
    "field_recall_date",
];
const RAW_DATE_FIELDS: &[&str] = &["recall_initiation_date", "report_date", "ReleaseDate", "Date", "field_recall_date"];

/// Normalize a record of any shape. `null` yields `None`; anything else yields a record.
pub fn normalize(record: &Value) -> Option<NormalizedRecall> {
    if record.is_null() {
        return None;
    }
    let view = RecordView::new(record);
    let raw = view.nested("rawData");

    let recall_date = resolve_recall_date(&view, raw.as_ref());
    let (raw_product, raw_brand) = resolve_raw_product_and_brand(&view, raw.as_ref());
    let brand = clean_brand_name(&raw_brand);
    let product = resolve_product(&view, raw.as_ref(), &raw_product, &brand);
    let title = compose_title(&product, &brand, view.text("title"));

    let agency = view
        .text("agency")
        .and_then(|a| Agency::parse(&a))
        .unwrap_or(Agency::Fda);
    let description = view
        .first_text(&["description", "reason_for_recall"])
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    let reason = view
        .first_text(&["reason", "reason_for_recall"])
        .unwrap_or_else(|| DEFAULT_REASON.to_string());

    let category = resolve_category(&product, &title, view.text("category").as_deref());
    let mut tags = infer_tags(&format!("{product} {title} {description}"), &reason);
    if category != Category::Other {
        tags.insert(category.as_str().to_string());
    }
    let risk_level = infer_risk_level(&reason);

    let distribution = view
        .first_text(&["distribution", "distribution_pattern"])
        .unwrap_or_else(|| NATIONWIDE.to_string());
    let states_affected = resolve_states(&view, &distribution);

    let recall_number = view
        .first_text(&["recallId", "recall_number"])
        .or_else(|| raw.and_then(|r| r.first_text(&["recall_number", "RecallNumber", "field_recall_number"])));
    let recall_id = recall_number.clone().unwrap_or_else(|| {
        let date = recall_date.format("%Y-%m-%d").to_string();
        fallback_recall_id("RECALL", &[agency.as_str(), &product, &brand, &date])
    });

    let article_link = view
        .first_text(&["articleLink", "url"])
        .filter(|l| is_usable_link(l))
        .unwrap_or_else(|| synthesize_article_link(agency, &brand, &product, &reason, recall_number.as_deref()));

    Some(NormalizedRecall {
        recall_id,
        title,
        product,
        brand,
        description,
        reason,
        category,
        tags,
        risk_level,
        retailer: resolve_retailer(&view, raw.as_ref()),
        agency,
        status: resolve_status(&view, raw.as_ref()),
        distribution,
        states_affected,
        recall_date,
        article_link,
        is_active: view.bool_field("isActive").unwrap_or(true),
    })
}

/// Convenience for typed callers
pub fn normalize_recall(recall: &NormalizedRecall) -> Option<NormalizedRecall> {
    serde_json::to_value(recall).ok().and_then(|v| normalize(&v))
}

fn resolve_recall_date(view: &RecordView<'_>, raw: Option<&RecordView<'_>>) -> DateTime<Utc> {
    let top = DATE_FIELDS.iter().filter_map(|k| view.get(k));
    let nested = raw
        .into_iter()
        .flat_map(|r| RAW_DATE_FIELDS.iter().filter_map(move |k| r.get(k)));
    top.chain(nested)
        .find_map(parse_date_value)
        .unwrap_or_else(Utc::now)
}

/// Explicit `product_description` + brand-name shapes beat the generic fields
fn explicit_product_and_brand(view: &RecordView<'_>) -> Option<(String, Option<String>)> {
    let description = view.text("product_description")?;
    if let Some(names) = view.str_list("brand_names") {
        return Some((description, names.into_iter().next()));
    }
    view.text("brand_name").map(|b| (description, Some(b)))
}

fn resolve_raw_product_and_brand(view: &RecordView<'_>, raw: Option<&RecordView<'_>>) -> (String, String) {
    let mut product = view
        .first_text(&["product", "product_description", "title", "Product", "field_title"])
        .unwrap_or_default();
    let mut brand = view
        .first_text(&["brand", "recalling_firm", "Firm", "field_establishment"])
        .unwrap_or_default();

    let explicit = explicit_product_and_brand(view).or_else(|| raw.and_then(explicit_product_and_brand));
    if let Some((description, explicit_brand)) = explicit {
        product = description;
        if let Some(b) = explicit_brand {
            brand = b;
        }
    }
    (product, brand)
}

fn resolve_product(view: &RecordView<'_>, raw: Option<&RecordView<'_>>, raw_product: &str, brand: &str) -> String {
    let product = clean_product_title(raw_product);
    if !is_junk_product(&product) {
        return product;
    }

    let title = view
        .text("title")
        .filter(|t| t.as_str() != DEFAULT_TITLE && t.as_str() != brand);
    let candidates = [
        view.text("product_description"),
        raw.and_then(|r| r.text("product_description")),
        view.text("Product"),
        view.text("field_title"),
        title,
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|c| is_usable_product_source(c))
        .map(|c| clean_product_title(&c))
        .unwrap_or(product)
}

fn compose_title(product: &str, brand: &str, source_title: Option<String>) -> String {
    let mut parts = Vec::new();
    if product != UNKNOWN_PRODUCT {
        parts.push(product);
    }
    if brand != UNKNOWN_BRAND && brand != product {
        parts.push(brand);
    }
    if !parts.is_empty() {
        return parts.join(" - ");
    }
    first_non_empty([source_title.as_deref(), Some(DEFAULT_TITLE)])
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

fn resolve_category(product: &str, title: &str, source_hint: Option<&str>) -> Category {
    if is_non_food_item(product, title) {
        return Category::Other;
    }
    infer_category(&format!("{product} {title}"), source_hint)
}

/// Slug matched exactly or as a leading word run ("walmart-inc" is Walmart)
fn retailer_from_text(text: &str) -> Option<Retailer> {
    let slug = generate_slug(text);
    Retailer::from_slug(&slug).or_else(|| {
        Retailer::ALL
            .iter()
            .copied()
            .find(|r| slug.starts_with(&format!("{}-", r.as_str())))
    })
}

fn resolve_retailer(view: &RecordView<'_>, raw: Option<&RecordView<'_>>) -> Retailer {
    view.first_text(&["retailer", "recalling_firm", "retailerName"])
        .or_else(|| raw.and_then(|r| r.text("recalling_firm")))
        .and_then(|t| retailer_from_text(&t))
        .unwrap_or(Retailer::VariousRetailers)
}

fn resolve_status(view: &RecordView<'_>, raw: Option<&RecordView<'_>>) -> RecallStatus {
    view.first_text(&["status", "Status"])
        .or_else(|| raw.and_then(|r| r.first_text(&["status", "recall_status"])))
        .map(|s| RecallStatus::from_raw(&s))
        .unwrap_or(RecallStatus::Ongoing)
}

fn resolve_states(view: &RecordView<'_>, distribution: &str) -> Vec<String> {
    if let Some(list) = view.str_list("statesAffected") {
        return list;
    }
    if let Some(list) = view.str_list("states") {
        return extract_states_from_list(&list);
    }
    if let Some(text) = view.text("states") {
        return extract_states(&text);
    }
    extract_states(distribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use chrono::Datelike;
    use serde_json::json;

    #[test]
    fn test_null_is_none_and_empty_is_defaulted() {
        assert!(normalize(&Value::Null).is_none());

        let r = normalize(&json!({})).unwrap();
        assert_eq!(r.product, UNKNOWN_PRODUCT);
        assert_eq!(r.brand, UNKNOWN_BRAND);
        assert_eq!(r.title, DEFAULT_TITLE);
        assert_eq!(r.description, DEFAULT_DESCRIPTION);
        assert_eq!(r.reason, DEFAULT_REASON);
        assert_eq!(r.category, Category::Other);
        assert_eq!(r.risk_level, RiskLevel::Medium);
        assert_eq!(r.retailer, Retailer::VariousRetailers);
        assert_eq!(r.agency, Agency::Fda);
        assert_eq!(r.status, RecallStatus::Ongoing);
        assert_eq!(r.states_affected, vec![NATIONWIDE]);
        assert!(r.recall_id.starts_with("RECALL-"));
        assert!(r.article_link.starts_with("https://"));
        assert!(r.is_active);
    }

    #[test]
    fn test_non_object_input_is_treated_as_empty() {
        let r = normalize(&json!("just a string")).unwrap();
        assert_eq!(r.product, UNKNOWN_PRODUCT);
    }

    #[test]
    fn test_fda_shape() {
        let record = json!({
            "recall_number": "F-1234-2025",
            "product_description": "Chicken Caesar Salad Wrap. NET WT 12 OZ. INGREDIENTS: chicken, lettuce",
            "recalling_firm": "Fresh Foods Inc",
            "reason_for_recall": "Potential Listeria monocytogenes contamination",
            "report_date": "20250920",
            "status": "Terminated",
            "distribution_pattern": "CA, NV and AZ"
        });
        let r = normalize(&record).unwrap();
        assert_eq!(r.recall_id, "F-1234-2025");
        assert_eq!(r.product, "Chicken Caesar Salad Wrap");
        assert_eq!(r.brand, "Fresh Foods, INC.");
        assert_eq!(r.title, "Chicken Caesar Salad Wrap - Fresh Foods, INC.");
        assert_eq!(r.category, Category::Grains);
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.status, RecallStatus::Completed);
        assert_eq!(r.states_affected, vec!["AZ", "CA", "NV"]);
        assert_eq!((r.recall_date.year(), r.recall_date.month(), r.recall_date.day()), (2025, 9, 20));
        assert!(r.tags.contains("listeria"));
        assert!(r.tags.contains("grains"));
        assert_eq!(r.article_link, "https://www.fda.gov/search?search_api_fulltext=F-1234-2025&site=Food");
    }

    #[test]
    fn test_explicit_brand_list_shape_wins() {
        let record = json!({
            "title": "Recall notice",
            "product_description": "Organic Hummus 10 oz",
            "brand_names": ["Sabra"],
        });
        let r = normalize(&record).unwrap();
        assert_eq!(r.product, "Organic Hummus");
        assert_eq!(r.brand, "Sabra");
    }

    #[test]
    fn test_junk_product_retries_fallbacks() {
        let record = json!({
            "product": "12/24",
            "Product": "Smoked Turkey Breast",
            "brand": "Acme"
        });
        let r = normalize(&record).unwrap();
        assert_eq!(r.product, "Smoked Turkey Breast");
        assert_eq!(r.category, Category::Poultry);
    }

    #[test]
    fn test_usable_provider_link_is_kept() {
        let r = normalize(&json!({"articleLink": "https://example.gov/recall/1"})).unwrap();
        assert_eq!(r.article_link, "https://example.gov/recall/1");
        let r = normalize(&json!({"articleLink": "#", "agency": "FSIS", "brand": "Acme", "product": "Beef Jerky"})).unwrap();
        assert!(r.article_link.starts_with("https://www.fsis.usda.gov/recalls-alerts/acme-recalls-beef-jerky"));
    }

    #[test]
    fn test_retailer_allow_list() {
        let r = normalize(&json!({"retailer": "Walmart Inc."})).unwrap();
        assert_eq!(r.retailer, Retailer::Walmart);
        let r = normalize(&json!({"retailer": "Corner Shop"})).unwrap();
        assert_eq!(r.retailer, Retailer::VariousRetailers);
    }

    #[test]
    fn test_nested_raw_date_is_used() {
        let r = normalize(&json!({"rawData": {"report_date": "20240102"}})).unwrap();
        assert_eq!((r.recall_date.year(), r.recall_date.month(), r.recall_date.day()), (2024, 1, 2));
    }

    #[test]
    fn test_normalize_is_a_fixed_point() {
        let record = json!({
            "product": "Aluminum Egg Pan 8 inch",
            "brand": "Kitchen World LLC, 55 Oak Ave, Austin, TX 78701",
            "reason": "Undeclared milk",
            "category": "eggs",
            "recallDate": "2025-03-04T00:00:00Z",
            "agency": "FSIS"
        });
        let once = normalize(&record).unwrap();
        let twice = normalize_recall(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.category, Category::Other);
    }
}
