use serde::Deserialize;
use serde_json::Value;

/// A locale's translation document: nested objects with string leaves,
/// addressed by dot-delimited keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TranslationTree {
    root: Value,
}

impl TranslationTree {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    /// Descend one object level per key segment.
    ///
    /// Fails as soon as a segment is missing or the value reached so far is
    /// not an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |value, segment| value.as_object()?.get(segment))
    }

    /// Resolve `key` to a non-empty string leaf.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }
}

/// Parse a `data-i18n-attr` value (`alt:hero.logo;title:hero.tip`) into
/// `(attribute, key)` pairs. Malformed pairs are skipped.
pub fn parse_attr_pairs(value: &str) -> Vec<(&str, &str)> {
    value.split(';')
        .filter_map(|pair| {
            let (attr, key) = pair.split_once(':')?;
            let (attr, key) = (attr.trim(), key.trim());
            (!attr.is_empty() && !key.is_empty()).then_some((attr, key))
        })
        .collect()
}
