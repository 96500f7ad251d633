use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A listing as it is written to the record log.
///
/// `url` keeps the href exactly as it was first seen, tracking parameters included. Identity
/// for deduplication comes from [`NormalizedKey`], never from this field directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub url: String,
}

impl ListingRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::from_url(&self.url)
    }
}

/// Canonical listing identity: the href without its query string, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn from_url(url: &str) -> Self {
        let without_query = match url.find('?') {
            Some(idx) => &url[..idx],
            None => url,
        };
        Self(without_query.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys already recorded, rebuilt from the log at the start of every pass.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    keys: HashSet<NormalizedKey>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &NormalizedKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: NormalizedKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<NormalizedKey> for DedupIndex {
    fn from_iter<I: IntoIterator<Item = NormalizedKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_drops_query_string_and_whitespace() {
        let a = NormalizedKey::from_url("https://x/marketplace/item/1?ref=abc");
        let b = NormalizedKey::from_url("  https://x/marketplace/item/1  ");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://x/marketplace/item/1");
    }

    #[test]
    fn key_cuts_at_first_question_mark() {
        let key = NormalizedKey::from_url("https://x/item/7?a=1?b=2");
        assert_eq!(key.as_str(), "https://x/item/7");
    }

    #[test]
    fn record_key_uses_original_url() {
        let record = ListingRecord::new("Macbook UYU 12,500", "https://x/item/9?tracking=1");
        assert_eq!(record.key().as_str(), "https://x/item/9");
        assert_eq!(record.url, "https://x/item/9?tracking=1");
    }

    #[test]
    fn dedup_index_reports_repeat_inserts() {
        let mut index = DedupIndex::new();
        assert!(index.insert(NormalizedKey::from_url("https://x/item/1")));
        assert!(!index.insert(NormalizedKey::from_url("https://x/item/1?y=2")));
        assert_eq!(index.len(), 1);
    }
}
