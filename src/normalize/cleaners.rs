use crate::constants::{UNKNOWN_BRAND, UNKNOWN_PRODUCT};
use once_cell::sync::Lazy;
use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

// Product text past any of these is packaging, labelling or distribution detail
static STOP_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\s+(?:bag\s+)?contains:",
        r"(?i)\s+imported\s+by\b",
        r"(?i)\s+distributed\s+by\b",
        r"(?i)\s+manufactured\s+(?:for|by):",
        r"(?i)[.;]?\s*\bnet\s+wt\b",
        r"(?i)\bnet\s+weight:",
        r"(?i)[.;]?\s*\bingredients:",
        r"(?i)[.\s]\s*bulk\.",
        r"(?i)[.\s]\s*keep\s+frozen\b",
        r"(?i);\s*produced\s+on\b",
        r"(?i)[;\s]\s*upc\b",
        r"(?i)\s+\d+\s+count\s*/\s*case\b",
        r"(?i)\bstates?\s+affected:",
        r"(?i)\bzip\s*codes?:",
        r"(?i)\bdistribution:",
        r"(?i)\bdist\s+by:",
        r";\s*\(",
        r"(?i)\s+product\s+(?:name|description):",
        r"(?i)\s+pack/julian\s+date\b",
        r"(?i)\s+best\s+by\s+date\b",
        r"(?i)\s+sell\s+by\s+date\b",
        r"(?i)\s+lot\s+(?:code|number)s?\b",
    ])
});

static PACKAGING_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\([^)]*(?:net\s*wt|pkgs?\b|per\s+case|count\s*/\s*case|pack)[^)]*\)").unwrap()
});
static SEGMENT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+|\n").unwrap());
static TRAILING_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\s+\d+)?(?:\s+(?:bag|package|box|pack))+\s*$").unwrap());
static COUNT_PER_CASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\b\d+\s*(?:count|ct|pack|pk)\s*/\s*(?:case|cs|box)\b\s*").unwrap()
});
// A period after one of these does not end a sentence
const ABBREVIATIONS: &[&str] = &["mr", "mrs", "ms", "dr", "st", "jr", "sr", "mt", "ft", "co", "bros", "no", "vs"];

fn ends_with_abbreviation(text: &str) -> bool {
    text.rsplit(|c: char| !c.is_alphabetic())
        .next()
        .is_some_and(|word| ABBREVIATIONS.contains(&word.to_lowercase().as_str()))
}

/// Split on sentence breaks and newlines, keeping "Dr. Pepper" together
fn sentence_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for m in SEGMENT_SPLIT.find_iter(text) {
        if m.as_str().starts_with('.') && ends_with_abbreviation(&text[start..m.start()]) {
            continue;
        }
        segments.push(&text[start..m.start()]);
        start = m.end();
    }
    segments.push(&text[start..]);
    segments.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:(?:brand|product)\s+)+").unwrap());
static SKU_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:mf|sku|item|code)\s*#?\s*\d+\b").unwrap());
static CAGE_FREE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:cnfree|cage\s*free)(?:\s+cage\s*free)?\b").unwrap());
static WEIGHTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:fl\.?\s*)?(?:oz|ounces?|lbs?|pounds?|g|kg|ml|l)\b\.?").unwrap()
});
static DIMENSIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b\d+(?:\.\d+)?\s*(?:x\s*\d+(?:\.\d+)?\s*)?(?:inch(?:es)?|in|cm|mm|ft|feet|")(?:\s|$)"#)
        .unwrap()
});
static DATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}[/-]\d{1,2}[/-]\d{1,2})\b").unwrap()
});
static BARCODES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:upc|barcode)[\s:#]*[\d\s-]+").unwrap());
static EMPTY_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)").unwrap());
static REPEATED_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([.,;:])(?:\s*[.,;:])+").unwrap());
static EDGE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s.,;:\-]+|[\s.,;:\-]+$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\-/\s,:.]*$").unwrap());

/// Cut product text down to the product name itself.
///
/// Truncates at the earliest stop phrase, then strips packaging notes,
/// measurements, dates and barcodes. Never returns an empty string.
pub fn clean_product_title(text: &str) -> String {
    let mut s = text.trim().to_string();
    if s.is_empty() {
        return UNKNOWN_PRODUCT.to_string();
    }

    if let Some(cut) = STOP_PHRASES.iter().filter_map(|re| re.find(&s)).map(|m| m.start()).min() {
        s.truncate(cut);
    }

    s = PACKAGING_NOTE.replace_all(&s, " ").into_owned();

    // Sentence-separated descriptions: the first meaningful segment is the name
    let segments = sentence_segments(&s);
    if segments.len() > 1 {
        if let Some(first) = segments
            .iter()
            .find(|p| p.chars().filter(|c| c.is_alphabetic()).count() >= 3)
        {
            s = first.to_string();
        }
    }

    s = COUNT_PER_CASE.replace_all(&s, " ").into_owned();
    s = LEADING_LABEL.replace(&s, "").into_owned();
    s = SKU_CODE.replace_all(&s, " ").into_owned();
    s = CAGE_FREE.replace_all(&s, "Cage Free").into_owned();
    s = BARCODES.replace_all(&s, " ").into_owned();
    s = DATES.replace_all(&s, " ").into_owned();
    s = WEIGHTS.replace_all(&s, " ").into_owned();
    s = DIMENSIONS.replace_all(&s, " ").into_owned();
    s = EMPTY_PARENS.replace_all(&s, " ").into_owned();
    s = REPEATED_PUNCT.replace_all(&s, "$1").into_owned();
    s = WHITESPACE.replace_all(&s, " ").into_owned();
    s = EDGE_PUNCT.replace_all(&s, "").into_owned();
    s = TRAILING_PACKAGE.replace(&s, "").into_owned();
    s = EDGE_PUNCT.replace_all(&s, "").into_owned();

    if s.is_empty() {
        UNKNOWN_PRODUCT.to_string()
    } else {
        s
    }
}

static STREET_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i),?\s*\b\d+\s+[a-z][a-z\s]*?\b(?:ave|avenue|st|street|rd|road|blvd|boulevard|dr|drive|ln|lane|way|court|ct|place|pl|hwy|highway|pkwy|parkway)\b\.?[,\s]*",
    )
    .unwrap()
});
static CITY_STATE_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",?\s*[A-Z][a-z]+,\s*[A-Z]{2}\s*\d{5}(?:-\d{4})?").unwrap());
static STATE_ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r",?\s*\b[A-Z]{2}\s+\d{5}(?:-\d{4})?\b").unwrap());
static DOING_BUSINESS_AS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+(?:d/b/a|dba)\b.*$").unwrap());
static SUFFIX_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:inc|llc|corp|corporation|ltd|limited)\.?$").unwrap());
static TEXT_AFTER_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?\b(?:inc|llc|corp|corporation|ltd|limited)\b\.?)\s+\S.*$").unwrap()
});
static TRAILING_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,\s]+(inc|llc|corp|corporation|ltd|limited)\.?$").unwrap());

const LOWERCASE_WORDS: &[&str] = &["and", "of", "the", "for", "de", "la"];

fn title_case_word(word: &str, first: bool, keep_acronyms: bool) -> String {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    // Acronyms such as ABC or USA stay as written
    if keep_acronyms && (2..=4).contains(&letters.len()) && letters.iter().all(|c| c.is_uppercase()) {
        return word.to_string();
    }
    let lower = word.to_lowercase();
    if !first && LOWERCASE_WORDS.contains(&lower.as_str()) {
        return lower;
    }
    let mut chars = lower.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    // An all-caps name is shouting, not a run of acronyms
    let shouting = !text.chars().any(|c| c.is_lowercase());
    text.split_whitespace()
        .enumerate()
        .map(|(i, w)| title_case_word(w, i == 0, !shouting))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce a firm name to the brand: no address, no DBA tail, suffix upper-cased.
pub fn clean_brand_name(text: &str) -> String {
    let mut s = text.trim().to_string();
    if s.is_empty() {
        return UNKNOWN_BRAND.to_string();
    }

    s = STREET_ADDRESS.replace_all(&s, ", ").into_owned();
    s = CITY_STATE_ZIP.replace_all(&s, "").into_owned();
    s = STATE_ZIP.replace_all(&s, "").into_owned();
    s = DOING_BUSINESS_AS.replace(&s, "").into_owned();

    // First comma segment, keeping any corporate suffix segments that follow it
    let mut segments = s.split(',').map(str::trim).skip_while(|p| p.is_empty());
    let mut kept = match segments.next() {
        Some(first) => first.to_string(),
        None => return UNKNOWN_BRAND.to_string(),
    };
    for segment in segments {
        if !SUFFIX_ONLY.is_match(segment) {
            break;
        }
        kept.push_str(", ");
        kept.push_str(segment);
    }

    kept = TEXT_AFTER_SUFFIX.replace(&kept, "$1").into_owned();

    let (base, suffix) = match TRAILING_SUFFIX.captures(&kept) {
        Some(caps) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(kept.len());
            let suffix = caps.get(1).map(|m| m.as_str().to_uppercase());
            (kept[..start].to_string(), suffix)
        }
        None => (kept.clone(), None),
    };

    let base = title_case(base.trim().trim_end_matches(','));
    match (base.is_empty(), suffix) {
        (true, _) => UNKNOWN_BRAND.to_string(),
        (false, Some(suffix)) => format!("{base}, {suffix}."),
        (false, None) => base,
    }
}

/// Pure digits/punctuation, too short, or already a placeholder
pub fn is_junk_product(text: &str) -> bool {
    let t = text.trim();
    t == UNKNOWN_PRODUCT || t.chars().count() < 3 || JUNK.is_match(t)
}

/// Raw candidate text worth cleaning as a product fallback
pub fn is_usable_product_source(text: &str) -> bool {
    let t = text.trim();
    t.chars().count() > 3 && !JUNK.is_match(t)
}

// Food phrases that merely contain a cookware word
static COOKWARE_FOOD_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:pot\s+pies?|pot\s+roasts?|pot\s*stickers?|pan[\s-](?:fried|seared|roasted)|pan\s+dulce)\b").unwrap()
});

const FOOD_INDICATORS: &[&str] = &[
    "egg", "milk", "cheese", "yogurt", "butter", "chicken", "beef", "pork", "fish", "shrimp",
    "vegetable", "fruit", "bread", "pasta", "noodle",
];

const COOKWARE_TERMS: &[&str] = &[
    "aluminium", "aluminum", "stainless steel", "steel", "cast iron", "pan", "pot", "kadai", "wok",
    "skillet", "cookware", "utensil", "spoon", "fork", "knife", "spatula", "thermos", "flask",
    "cutting board", "chopping board", "serving tray", "platter",
];

// Items named after the food they hold; weighted double
const COOKWARE_COMPOUNDS: &[&str] = &["milk pan", "egg pan", "frying pan", "sauce pan", "saucepan", "egg poacher"];

fn word_pattern(term: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}(?:s|es)?\b", regex::escape(term))).ok()
}

static FOOD_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| FOOD_INDICATORS.iter().filter_map(|t| word_pattern(t)).collect());
static COOKWARE_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| COOKWARE_TERMS.iter().filter_map(|t| word_pattern(t)).collect());
static COMPOUND_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| COOKWARE_COMPOUNDS.iter().filter_map(|t| word_pattern(t)).collect());

/// True when cookware vocabulary outweighs food vocabulary in product plus title.
pub fn is_non_food_item(product: &str, title: &str) -> bool {
    let combined = format!("{product} {title}");
    let text = COOKWARE_FOOD_PHRASES.replace_all(&combined, " ");

    let food = FOOD_PATTERNS.iter().filter(|re| re.is_match(&text)).count();
    let cookware = COOKWARE_PATTERNS.iter().filter(|re| re.is_match(&text)).count()
        + 2 * COMPOUND_PATTERNS.iter().filter(|re| re.is_match(&text)).count();

    cookware > food
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Drop markup and decode the handful of entities the feeds actually emit
pub fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&#039;", "'")
        .replace("&quot;", "\"");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Generate a URL-friendly slug
pub fn generate_slug(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .replace(['\'', '"', '.', ',', '!', '?', '&'], "")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    cleaned
        .split('-')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
