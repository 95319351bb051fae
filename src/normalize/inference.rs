//! Ordered keyword rules mapping free text to categories, tags, risk and states.
//!
//! Rules are evaluated top to bottom and the first match wins, so narrower
//! rules (noodles, sandwiches) sit above the broad ones (eggs, vegetables).

use crate::constants::{MULTIPLE_STATES, NATIONWIDE, STATE_CODES};
use crate::domain::{Category, RiskLevel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// A single `(predicate, result)` rule
pub struct KeywordRule<T> {
    pub result: T,
    pub keywords: &'static [&'static str],
    pattern: Regex,
}

impl<T: Copy> KeywordRule<T> {
    /// Whole-word match on any keyword, plural tolerant
    fn words(result: T, keywords: &'static [&'static str]) -> Option<Self> {
        let mut sorted: Vec<&str> = keywords.to_vec();
        sorted.sort_by_key(|k| std::cmp::Reverse(k.len()));
        let alternation = sorted
            .iter()
            .map(|k| regex::escape(k).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})(?:s|es)?\b")).ok()?;
        Some(Self { result, keywords, pattern })
    }

    /// Prefix match on raw pattern fragments, so "allergens" hits "allergen"
    fn stems(result: T, keywords: &'static [&'static str]) -> Option<Self> {
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})", keywords.join("|"))).ok()?;
        Some(Self { result, keywords, pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

fn first_match<T: Copy>(rules: &[KeywordRule<T>], text: &str) -> Option<T> {
    rules.iter().find(|r| r.matches(text)).map(|r| r.result)
}

static CATEGORY_RULES: Lazy<Vec<KeywordRule<Category>>> = Lazy::new(|| {
    use Category::*;
    [
        KeywordRule::words(Grains, &["noodle", "pasta", "ramen", "spaghetti", "macaroni", "lasagna"]),
        KeywordRule::words(Grains, &["burrito", "breakfast sandwich", "sandwich", "wrap", "dumpling"]),
        KeywordRule::words(Snacks, &["popcorn", "snack"]),
        KeywordRule::words(Eggs, &["egg", "shell egg", "egg product", "liquid egg"]),
        KeywordRule::words(Dairy, &["milk", "cheese", "yogurt", "dairy", "ice cream", "butter", "cream", "whey"]),
        KeywordRule::words(Poultry, &["chicken", "turkey", "poultry", "duck", "quail", "hen"]),
        KeywordRule::words(Beef, &["beef", "steak", "hamburger", "burger", "veal", "brisket"]),
        KeywordRule::words(Pork, &["pork", "bacon", "sausage", "ham", "prosciutto", "salami", "pepperoni"]),
        KeywordRule::words(
            Seafood,
            &[
                "fish", "shrimp", "seafood", "salmon", "tuna", "crab", "lobster", "oyster", "clam",
                "mussel", "scallop", "shellfish", "cod", "tilapia", "anchovy", "sardine",
            ],
        ),
        KeywordRule::words(
            Fruits,
            &[
                "fruit", "apple", "banana", "berry", "berries", "strawberry", "blueberry", "peach",
                "mango", "melon", "cantaloupe", "cherry", "grape", "orange", "lemon", "pear", "pineapple",
            ],
        ),
        KeywordRule::words(
            Vegetables,
            &[
                "vegetable", "lettuce", "spinach", "salad", "onion", "carrot", "celery", "broccoli",
                "cucumber", "tomato", "potato", "pepper", "kale", "sprout", "cabbage", "greens",
            ],
        ),
        KeywordRule::words(Grains, &["bread", "grain", "flour", "rice", "cereal", "tortilla", "bagel", "oat"]),
        KeywordRule::words(
            Nuts,
            &["nut", "peanut", "almond", "cashew", "walnut", "pecan", "pistachio", "hazelnut", "peanut butter"],
        ),
        KeywordRule::words(
            Snacks,
            &["cookie", "candy", "chocolate", "chip", "cracker", "pretzel", "jerky", "granola", "bar"],
        ),
        KeywordRule::words(BabyFood, &["baby", "infant", "toddler"]),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// First rule match over the combined text, else a valid source category, else `Other`.
pub fn infer_category(text: &str, source_hint: Option<&str>) -> Category {
    first_match(&CATEGORY_RULES, text)
        .or_else(|| source_hint.and_then(Category::parse))
        .unwrap_or(Category::Other)
}

/// Up to `max` distinct categories in rule order; never empty.
pub fn infer_categories(text: &str, max: usize) -> Vec<Category> {
    let mut found = Vec::new();
    for rule in CATEGORY_RULES.iter() {
        if found.len() >= max {
            break;
        }
        if !found.contains(&rule.result) && rule.matches(text) {
            found.push(rule.result);
        }
    }
    if found.is_empty() {
        found.push(Category::Other);
    }
    found
}

/// Keywords that mean `category`, used to widen category filters to untagged records
pub fn category_keywords(category: Category) -> Vec<&'static str> {
    CATEGORY_RULES
        .iter()
        .filter(|r| r.result == category)
        .flat_map(|r| r.keywords.iter().copied())
        .collect()
}

const FOOD_TAGS: &[&str] = &[
    "egg", "eggs", "milk", "cheese", "yogurt", "butter", "chicken", "turkey", "beef", "pork",
    "bacon", "sausage", "ham", "fish", "shrimp", "salmon", "tuna", "crab", "lettuce", "spinach",
    "salad", "onion", "fruit", "vegetable", "bread", "pasta", "noodle", "rice", "flour", "cereal",
    "nut", "peanut", "almond", "cookie", "candy", "chocolate", "snack", "baby", "infant",
];

static FOOD_TAG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FOOD_TAGS
        .iter()
        .filter_map(|t| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(t))).ok().map(|re| (*t, re)))
        .collect()
});

static CONTAMINANT_TAG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("salmonella", r"(?i)\bsalmonella\b"),
        ("listeria", r"(?i)\blisteria\b"),
        ("e-coli", r"(?i)\be\.?\s?coli\b"),
        ("norovirus", r"(?i)\bnorovirus\b"),
        ("metal", r"(?i)\bmetal\b"),
        ("glass", r"(?i)\bglass\b"),
        ("allergen", r"(?i)\ballergens?\b"),
        ("undeclared", r"(?i)\bundeclared\b"),
    ]
    .into_iter()
    .filter_map(|(tag, p)| Regex::new(p).ok().map(|re| (tag, re)))
    .collect()
});

static TAG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lower-case, punctuation runs become a single hyphen
pub fn normalize_tag(tag: &str) -> String {
    TAG_SEPARATORS
        .replace_all(&tag.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Food-type and contaminant tags found in the record text plus its reason
pub fn infer_tags(text: &str, reason: &str) -> BTreeSet<String> {
    let combined = format!("{text} {reason}");
    FOOD_TAG_PATTERNS
        .iter()
        .chain(CONTAMINANT_TAG_PATTERNS.iter())
        .filter(|(_, re)| re.is_match(&combined))
        .map(|(tag, _)| normalize_tag(tag))
        .filter(|t| !t.is_empty())
        .collect()
}

static RISK_RULES: Lazy<Vec<KeywordRule<RiskLevel>>> = Lazy::new(|| {
    [
        KeywordRule::stems(
            RiskLevel::High,
            &[
                "salmonella", r"e\.?\s?coli", "listeria", "botulism", "clostridium", "norovirus",
                "hepatitis", "deadly", "fatal",
            ],
        ),
        KeywordRule::stems(
            RiskLevel::Medium,
            &["allergen", "undeclared", "mislabel", r"foreign\s+(?:material|matter|object)", "plastic", "glass", "metal"],
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// High for named pathogens, medium for allergen/labelling/foreign material, else low.
/// An empty or unspecified reason is medium.
pub fn infer_risk_level(reason: &str) -> RiskLevel {
    let reason = reason.trim();
    if reason.is_empty() || reason.eq_ignore_ascii_case(crate::constants::DEFAULT_REASON) {
        return RiskLevel::Medium;
    }
    first_match(&RISK_RULES, reason).unwrap_or(RiskLevel::Low)
}

static NATIONWIDE_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnation\s?wide\b|\bnational(?:ly)?\b").unwrap());
static MULTI_STATE_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmulti(?:ple)?[\s-]?states?\b").unwrap());
static STATE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    STATE_CODES
        .iter()
        .filter_map(|code| Regex::new(&format!(r"\b{code}\b")).ok().map(|re| (*code, re)))
        .collect()
});

/// States named in distribution text, listed in `STATE_CODES` order whatever
/// order the text names them in
pub fn extract_states(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || NATIONWIDE_WORDS.is_match(text) {
        return vec![NATIONWIDE.to_string()];
    }
    if MULTI_STATE_WORDS.is_match(text) {
        return vec![MULTIPLE_STATES.to_string()];
    }
    let found: Vec<String> = STATE_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(code, _)| code.to_string())
        .collect();
    if found.is_empty() {
        vec![MULTIPLE_STATES.to_string()]
    } else {
        found
    }
}

/// Provider-supplied state lists: codes upper-cased, anything else read as text
pub fn extract_states_from_list(items: &[String]) -> Vec<String> {
    if items.iter().all(|s| s.trim().len() == 2) {
        return items.iter().map(|s| s.trim().to_uppercase()).collect();
    }
    extract_states(&items.join(", "))
}
