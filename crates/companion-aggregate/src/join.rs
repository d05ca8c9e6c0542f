//! Foreign-key label resolution.

use std::collections::HashMap;

use companion_core::UserProfile;
use serde::Serialize;

/// Characters of a raw id kept when no name resolves.
pub const DEFAULT_JOIN_TRUNCATE: usize = 8;

const MISSING_LABEL: &str = "Unknown";

/// Outcome of resolving one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum JoinedLabel {
    /// Name found in the lookup table.
    Resolved(String),
    /// No match; truncated raw id.
    Fallback(String),
    /// Record carried no id.
    Missing,
}

impl JoinedLabel {
    /// Display text.
    pub fn text(&self) -> &str {
        match self {
            Self::Resolved(text) | Self::Fallback(text) => text,
            Self::Missing => MISSING_LABEL,
        }
    }

    /// Returns `true` when a name was found.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Identifier to display-name table built from a lookup collection.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    names: HashMap<String, String>,
    truncate: usize,
}

impl LookupTable {
    /// Creates an empty table with the given fallback truncation length.
    pub fn new(truncate: usize) -> Self {
        Self {
            names: HashMap::new(),
            truncate,
        }
    }

    /// Builds a table from user profiles, keyed by document id. Users
    /// without a name or email are left out so their ids fall back.
    pub fn from_users<'a>(
        users: impl IntoIterator<Item = &'a UserProfile>,
        truncate: usize,
    ) -> Self {
        let mut table = Self::new(truncate);
        for user in users {
            if let Some(name) = user.display_name() {
                table.insert(user.id.clone(), name.to_string());
            }
        }
        table
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    /// Resolves one identifier.
    pub fn resolve(&self, id: Option<&str>) -> JoinedLabel {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return JoinedLabel::Missing;
        };

        match self.names.get(id) {
            Some(name) => JoinedLabel::Resolved(name.clone()),
            None => JoinedLabel::Fallback(truncate_id(id, self.truncate)),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One item paired with its resolved label.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined<T> {
    /// Source item.
    pub item: T,
    /// Resolved label.
    pub label: JoinedLabel,
}

/// Pairs each item with the label for its foreign id. Unresolved ids fall
/// back to a truncated form; the output keeps input order and length.
pub fn join_labels<T, F>(items: &[T], table: &LookupTable, id_of: F) -> Vec<Joined<T>>
where
    T: Clone,
    F: Fn(&T) -> Option<&str>,
{
    items
        .iter()
        .map(|item| Joined {
            label: table.resolve(id_of(item)),
            item: item.clone(),
        })
        .collect()
}

/// Keeps the first `max_chars` characters of `id`, marking the cut with `…`.
pub fn truncate_id(id: &str, max_chars: usize) -> String {
    match id.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &id[..cut]),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_id("abcdefghij", 8), "abcdefgh…");
        assert_eq!(truncate_id("short", 8), "short");
        assert_eq!(truncate_id("ééééééééé", 8), "éééééééé…");
    }

    #[test]
    fn missing_and_blank_ids_are_unknown() {
        let table = LookupTable::new(DEFAULT_JOIN_TRUNCATE);
        assert_eq!(table.resolve(None), JoinedLabel::Missing);
        assert_eq!(table.resolve(Some("  ")).text(), "Unknown");
    }
}
