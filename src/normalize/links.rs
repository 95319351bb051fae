use super::cleaners::generate_slug;
use crate::constants::{FDA_SEARCH_URL, FSIS_ALERTS_URL, UNKNOWN_BRAND, UNKNOWN_PRODUCT};
use crate::domain::Agency;
use reqwest::Url;

/// A provider link worth keeping: absolute http(s) URL, not a `#` placeholder
pub fn is_usable_link(link: &str) -> bool {
    let link = link.trim();
    if link.is_empty() || link == "#" {
        return false;
    }
    match Url::parse(link) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn informative(value: &str, placeholder: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == placeholder {
        None
    } else {
        Some(v.to_string())
    }
}

/// Build a deep link when the source gave none.
///
/// FSIS notices live under a slug made of brand, product and reason; FDA
/// records get a full-text search on the recall number, or on brand and
/// product when there is no number.
pub fn synthesize_article_link(
    agency: Agency,
    brand: &str,
    product: &str,
    reason: &str,
    recall_number: Option<&str>,
) -> String {
    let brand = informative(brand, UNKNOWN_BRAND);
    let product = informative(product, UNKNOWN_PRODUCT);

    match agency {
        Agency::Fsis | Agency::Usda => {
            let mut slug = String::new();
            if let Some(b) = &brand {
                slug.push_str(&generate_slug(b));
                slug.push_str("-recalls");
            }
            if let Some(p) = &product {
                if !slug.is_empty() {
                    slug.push('-');
                }
                slug.push_str(&generate_slug(p));
            }
            let reason_slug = generate_slug(reason);
            if !reason_slug.is_empty() && !slug.is_empty() {
                slug.push_str("-due-");
                slug.push_str(&reason_slug);
            }
            if slug.is_empty() {
                FSIS_ALERTS_URL.to_string()
            } else {
                format!("{FSIS_ALERTS_URL}/{slug}")
            }
        }
        Agency::Fda => {
            let query = match recall_number.map(str::trim).filter(|n| !n.is_empty()) {
                Some(number) => number.to_string(),
                None => [brand, product].into_iter().flatten().collect::<Vec<_>>().join(" "),
            };
            Url::parse_with_params(FDA_SEARCH_URL, &[("search_api_fulltext", query.as_str()), ("site", "Food")])
                .map(|u| u.to_string())
                .unwrap_or_else(|_| FDA_SEARCH_URL.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_links() {
        assert!(is_usable_link("https://www.fda.gov/safety/recalls/acme"));
        assert!(is_usable_link(" http://example.com/x "));
        assert!(!is_usable_link("#"));
        assert!(!is_usable_link("/relative/path"));
        assert!(!is_usable_link("javascript:void(0)"));
        assert!(!is_usable_link(""));
    }

    #[test]
    fn test_fsis_slug_link() {
        let link = synthesize_article_link(
            Agency::Fsis,
            "Boar's Head Provisions Co., INC.",
            "Liverwurst",
            "Listeria Contamination",
            None,
        );
        assert_eq!(
            link,
            "https://www.fsis.usda.gov/recalls-alerts/boars-head-provisions-co-inc-recalls-liverwurst-due-listeria-contamination"
        );
    }

    #[test]
    fn test_fda_search_link() {
        let link = synthesize_article_link(Agency::Fda, "Acme", "Hummus", "x", Some("F-1234-2025"));
        assert_eq!(link, "https://www.fda.gov/search?search_api_fulltext=F-1234-2025&site=Food");

        let link = synthesize_article_link(Agency::Fda, "Acme", "Hummus", "x", None);
        assert_eq!(link, "https://www.fda.gov/search?search_api_fulltext=Acme+Hummus&site=Food");
    }

    #[test]
    fn test_placeholders_are_skipped() {
        let link = synthesize_article_link(Agency::Fsis, UNKNOWN_BRAND, UNKNOWN_PRODUCT, "", None);
        assert_eq!(link, FSIS_ALERTS_URL);
    }
}
