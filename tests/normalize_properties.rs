use chrono::{Datelike, Utc};
use food_recalls::constants::UNKNOWN_PRODUCT;
use food_recalls::domain::{Category, NormalizedRecall, Retailer};
use food_recalls::normalize::cleaners::{clean_brand_name, clean_product_title, is_junk_product};
use food_recalls::normalize::inference::infer_category;
use food_recalls::normalize::{normalize, normalize_recall};
use serde_json::{json, Value};

fn odd_inputs() -> Vec<Value> {
    vec![
        json!({}),
        json!([]),
        json!(42),
        json!("plain text"),
        json!(true),
        json!({"product": 5, "brand": null, "recallDate": {"nested": true}}),
        json!({"recallDate": "not-a-date"}),
        json!({"rawData": "not an object", "states": 12}),
        json!({"brand_names": [], "product_description": ""}),
        json!({"product": "   ", "title": "Product Recall", "brand": "  "}),
        json!({"statesAffected": "CA", "isActive": "maybe", "riskLevel": "extreme"}),
        json!({"product": "!!!", "reason": "", "agency": "NASA", "status": 7}),
    ]
}

fn assert_fully_populated(r: &NormalizedRecall, input: &Value) {
    for (name, field) in [
        ("recallId", &r.recall_id),
        ("title", &r.title),
        ("product", &r.product),
        ("brand", &r.brand),
        ("description", &r.description),
        ("reason", &r.reason),
        ("distribution", &r.distribution),
        ("articleLink", &r.article_link),
    ] {
        assert!(!field.trim().is_empty(), "{name} empty for {input}");
    }
    assert!(!r.states_affected.is_empty(), "statesAffected empty for {input}");
    assert!(Category::ALL.contains(&r.category));
    assert!(Retailer::ALL.contains(&r.retailer));
}

#[test]
fn normalize_is_total() {
    assert!(normalize(&Value::Null).is_none());
    for input in odd_inputs() {
        let r = normalize(&input).unwrap_or_else(|| panic!("no record for {input}"));
        assert_fully_populated(&r, &input);
    }
}

#[test]
fn output_serializes_with_closed_enum_values() {
    let r = normalize(&json!({"product": "Frozen Shrimp", "retailer": "Costco Wholesale"})).unwrap();
    let doc = serde_json::to_value(&r).unwrap();
    assert_eq!(doc["category"], "seafood");
    assert_eq!(doc["retailer"], "costco");
    assert_eq!(doc["agency"], "FDA");
    assert_eq!(doc["status"], "Ongoing");
    assert!(doc["riskLevel"].is_string());
    assert!(doc["recallDate"].is_string());
}

#[test]
fn normalize_is_idempotent() {
    let fixtures = vec![
        json!({
            "recall_number": "F-1234-2025",
            "product_description": "Chicken Caesar Salad Wrap. NET WT 12 OZ. INGREDIENTS: chicken, lettuce...",
            "recalling_firm": "Boar's Head Provisions Co., Inc. 123 Main St, Sarasota, FL 34240",
            "reason_for_recall": "Potential Listeria monocytogenes contamination",
            "report_date": "20250920",
            "distribution_pattern": "Nationwide"
        }),
        json!({
            "recallId": "045-2025",
            "agency": "FSIS",
            "product": "Ready-to-eat pork sausage links; (lot 44)",
            "brand": "ACME FOODS LLC",
            "reason": "Extraneous metal fragments",
            "recallDate": "2025-06-01T12:30:00Z",
            "statesAffected": ["OH", "PA"],
            "status": "Active"
        }),
        json!({"product": "Aluminum Egg Pan, 8 inch", "brand": "Kitchen World"}),
        json!({}),
    ];

    for fixture in fixtures {
        let once = normalize(&fixture).unwrap();
        let twice = normalize_recall(&once).unwrap();
        assert_eq!(once, twice, "not a fixed point for {fixture}");
    }
}

#[test]
fn category_inference_stays_in_the_enum() {
    for text in ["", "????", "organic kale chips", "Cat toy", "infant formula", "Smoked turkey"] {
        let category = infer_category(text, Some("not-a-category"));
        assert!(Category::ALL.contains(&category));
    }
}

#[test]
fn cookware_with_food_words_is_other() {
    let r = normalize(&json!({"product": "Egg Pan, Aluminum", "brand": "Acme"})).unwrap();
    assert_eq!(r.category, Category::Other);
    assert!(!r.tags.contains("other"));
}

#[test]
fn unknown_retailers_collapse() {
    for name in ["Bob's Corner Market", "", "whole foods market inc"] {
        let r = normalize(&json!({ "retailer": name })).unwrap();
        let expected = if name.starts_with("whole foods") {
            Retailer::WholeFoods
        } else {
            Retailer::VariousRetailers
        };
        assert_eq!(r.retailer, expected, "retailer {name:?}");
    }
}

#[test]
fn compact_dates_and_garbage_dates() {
    let r = normalize(&json!({"recallDate": "20250920"})).unwrap();
    assert_eq!((r.recall_date.year(), r.recall_date.month(), r.recall_date.day()), (2025, 9, 20));

    let before = Utc::now();
    let r = normalize(&json!({"recallDate": "not-a-date"})).unwrap();
    assert!(r.recall_date >= before);
    assert!(r.recall_date <= Utc::now());
}

#[test]
fn documented_cleaning_examples() {
    assert_eq!(
        clean_product_title("Chicken Caesar Salad Wrap. NET WT 12 OZ. INGREDIENTS: chicken, lettuce..."),
        "Chicken Caesar Salad Wrap"
    );
    assert_eq!(
        clean_brand_name("Boar's Head Provisions Co., Inc. 123 Main St, Sarasota, FL 34240"),
        "Boar's Head Provisions Co., INC."
    );
    assert!(is_junk_product(&clean_product_title("0000 / 12-2")));
    assert_eq!(clean_product_title("   "), UNKNOWN_PRODUCT);
}
