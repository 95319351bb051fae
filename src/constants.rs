/// Provider name constants to ensure consistency across the codebase

pub const FDA_PROVIDER: &str = "fda";
pub const FSIS_PROVIDER: &str = "fsis";

pub const FDA_ENFORCEMENT_URL: &str = "https://api.fda.gov/food/enforcement.json";
pub const FSIS_RECALL_URL: &str = "https://www.fsis.usda.gov/fsis/api/recall/v/1";

pub const FDA_SEARCH_URL: &str = "https://www.fda.gov/search";
pub const FSIS_ALERTS_URL: &str = "https://www.fsis.usda.gov/recalls-alerts";

pub const DEFAULT_USER_AGENT: &str = "FoodRecalls/1.0";

// Placeholders the normalizer emits when nothing better is available
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
pub const UNKNOWN_BRAND: &str = "Unknown Brand";
pub const DEFAULT_TITLE: &str = "Product Recall";
pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_REASON: &str = "Not specified";
pub const NATIONWIDE: &str = "Nationwide";
pub const MULTIPLE_STATES: &str = "Multiple States";

/// Two-letter codes recognised in distribution text, in reporting order
pub const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

/// Get all supported provider names
pub fn get_supported_providers() -> Vec<&'static str> {
    vec![FSIS_PROVIDER, FDA_PROVIDER]
}
