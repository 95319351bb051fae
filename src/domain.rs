use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// The canonical recall shape. The only type persisted and handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecall {
    pub recall_id: String,
    pub title: String,
    pub product: String,
    pub brand: String,
    pub description: String,
    pub reason: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub risk_level: RiskLevel,
    pub retailer: Retailer,
    pub agency: Agency,
    pub status: RecallStatus,
    pub distribution: String,
    pub states_affected: Vec<String>,
    pub recall_date: DateTime<Utc>,
    pub article_link: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Poultry,
    Beef,
    Pork,
    Seafood,
    Vegetables,
    Fruits,
    Dairy,
    Eggs,
    Nuts,
    Grains,
    Snacks,
    BabyFood,
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Poultry,
        Category::Beef,
        Category::Pork,
        Category::Seafood,
        Category::Vegetables,
        Category::Fruits,
        Category::Dairy,
        Category::Eggs,
        Category::Nuts,
        Category::Grains,
        Category::Snacks,
        Category::BabyFood,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Poultry => "poultry",
            Category::Beef => "beef",
            Category::Pork => "pork",
            Category::Seafood => "seafood",
            Category::Vegetables => "vegetables",
            Category::Fruits => "fruits",
            Category::Dairy => "dairy",
            Category::Eggs => "eggs",
            Category::Nuts => "nuts",
            Category::Grains => "grains",
            Category::Snacks => "snacks",
            Category::BabyFood => "baby-food",
            Category::Other => "other",
        }
    }

    /// Parse a source-provided category. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Category> {
        let lower = value.trim().to_lowercase();
        match lower.as_str() {
            // legacy store value
            "shellfish" => Some(Category::Seafood),
            "baby food" | "baby_food" => Some(Category::BabyFood),
            _ => Category::ALL.iter().copied().find(|c| c.as_str() == lower),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Numeric rank used when sorting by risk
    pub fn severity(&self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn parse(value: &str) -> Option<RiskLevel> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retailers the UI can filter by. Anything else collapses to `VariousRetailers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Retailer {
    TraderJoes,
    WholeFoods,
    Kroger,
    Walmart,
    Costco,
    Target,
    Safeway,
    Albertsons,
    VariousRetailers,
}

impl Retailer {
    pub const ALL: [Retailer; 9] = [
        Retailer::TraderJoes,
        Retailer::WholeFoods,
        Retailer::Kroger,
        Retailer::Walmart,
        Retailer::Costco,
        Retailer::Target,
        Retailer::Safeway,
        Retailer::Albertsons,
        Retailer::VariousRetailers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Retailer::TraderJoes => "trader-joes",
            Retailer::WholeFoods => "whole-foods",
            Retailer::Kroger => "kroger",
            Retailer::Walmart => "walmart",
            Retailer::Costco => "costco",
            Retailer::Target => "target",
            Retailer::Safeway => "safeway",
            Retailer::Albertsons => "albertsons",
            Retailer::VariousRetailers => "various-retailers",
        }
    }

    /// Exact slug lookup against the allow-list
    pub fn from_slug(slug: &str) -> Option<Retailer> {
        Retailer::ALL.iter().copied().find(|r| r.as_str() == slug)
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Agency {
    Fda,
    Fsis,
    Usda,
}

impl Agency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agency::Fda => "FDA",
            Agency::Fsis => "FSIS",
            Agency::Usda => "USDA",
        }
    }

    pub fn parse(value: &str) -> Option<Agency> {
        match value.trim().to_uppercase().as_str() {
            "FDA" => Some(Agency::Fda),
            "FSIS" | "USDA FSIS" | "USDA-FSIS" => Some(Agency::Fsis),
            "USDA" => Some(Agency::Usda),
            _ => None,
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecallStatus {
    Ongoing,
    Completed,
    Pending,
}

impl RecallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecallStatus::Ongoing => "Ongoing",
            RecallStatus::Completed => "Completed",
            RecallStatus::Pending => "Pending",
        }
    }

    /// Collapse provider status vocabularies into the three-value enum
    pub fn from_raw(value: &str) -> RecallStatus {
        match value.trim().to_lowercase().as_str() {
            "terminated" | "completed" | "closed" => RecallStatus::Completed,
            "pending" => RecallStatus::Pending,
            _ => RecallStatus::Ongoing,
        }
    }
}

impl fmt::Display for RecallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    RecallDate,
    Title,
    Product,
    Brand,
    Category,
    RiskLevel,
    Retailer,
    Agency,
    Status,
}

impl SortField {
    pub fn parse(value: &str) -> Option<SortField> {
        match value.trim() {
            "recallDate" | "date" => Some(SortField::RecallDate),
            "title" => Some(SortField::Title),
            "product" => Some(SortField::Product),
            "brand" => Some(SortField::Brand),
            "category" => Some(SortField::Category),
            "riskLevel" => Some(SortField::RiskLevel),
            "retailer" => Some(SortField::Retailer),
            "agency" => Some(SortField::Agency),
            "status" => Some(SortField::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> SortOrder {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// Dates compare by instant, risk by severity, everything else lexically.
/// Equal keys compare `Equal` so a stable sort keeps upstream order.
pub fn compare_recalls(
    a: &NormalizedRecall,
    b: &NormalizedRecall,
    field: SortField,
    order: SortOrder,
) -> Ordering {
    let ord = match field {
        SortField::RecallDate => a.recall_date.cmp(&b.recall_date),
        SortField::RiskLevel => a.risk_level.severity().cmp(&b.risk_level.severity()),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Product => a.product.cmp(&b.product),
        SortField::Brand => a.brand.cmp(&b.brand),
        SortField::Category => a.category.as_str().cmp(b.category.as_str()),
        SortField::Retailer => a.retailer.as_str().cmp(b.retailer.as_str()),
        SortField::Agency => a.agency.as_str().cmp(b.agency.as_str()),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    };
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_closed() {
        assert_eq!(Category::parse("Baby-Food"), Some(Category::BabyFood));
        assert_eq!(Category::parse("shellfish"), Some(Category::Seafood));
        assert_eq!(Category::parse("beverages"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn test_status_collapse() {
        assert_eq!(RecallStatus::from_raw("Terminated"), RecallStatus::Completed);
        assert_eq!(RecallStatus::from_raw("closed"), RecallStatus::Completed);
        assert_eq!(RecallStatus::from_raw("Pending"), RecallStatus::Pending);
        assert_eq!(RecallStatus::from_raw("Active Recall"), RecallStatus::Ongoing);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_value(Category::BabyFood).unwrap(), "baby-food");
        assert_eq!(serde_json::to_value(Retailer::TraderJoes).unwrap(), "trader-joes");
        assert_eq!(serde_json::to_value(Agency::Fsis).unwrap(), "FSIS");
        assert_eq!(serde_json::to_value(RiskLevel::High).unwrap(), "high");
        assert_eq!(serde_json::to_value(SortField::RiskLevel).unwrap(), "riskLevel");
    }

    #[test]
    fn test_sort_order_parse_defaults_to_desc() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Desc);
    }
}
