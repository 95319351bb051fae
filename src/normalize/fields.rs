use serde_json::Value;

/// First candidate that is present and not blank, trimmed.
pub fn first_non_empty<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Read-only view over an arbitrarily shaped record (store document or provider payload).
#[derive(Clone, Copy)]
pub struct RecordView<'a> {
    value: &'a Value,
}

impl<'a> RecordView<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key).filter(|v| !v.is_null())
    }

    /// Nested object view, e.g. the `rawData` a transformer kept
    pub fn nested(&self, key: &str) -> Option<RecordView<'a>> {
        self.get(key).filter(|v| v.is_object()).map(RecordView::new)
    }

    /// String or number field as trimmed text; blank strings count as absent
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First key, in order, holding non-blank text
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Array of strings with blanks dropped; `None` unless at least one entry survives
    pub fn str_list(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .get(key)?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            None
        } else {
            Some(items)
        }
    }
}
