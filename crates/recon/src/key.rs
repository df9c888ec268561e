use serde::Serialize;

use crate::model::Record;

/// Normalized document key: uppercase, alphanumerics only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MatchKey(String);

impl MatchKey {
    /// Canonicalize a single raw value (`" f1-100 "` -> `"F1100"`).
    pub fn from_raw(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_uppercase)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concatenate the bound fields (trimmed, in order) into a key.
///
/// Returns `None` when any bound field is absent from the record; such a
/// record is unkeyable and takes no part in matching. A present-but-null
/// field contributes an empty string.
pub fn build_match_key(record: &Record, fields: &[String]) -> Option<MatchKey> {
    let mut raw = String::new();
    for field in fields {
        let value = record.get(field)?;
        if let Some(text) = crate::model::value_text(value) {
            raw.push_str(text.trim());
        }
    }
    Some(MatchKey::from_raw(&raw))
}
