//! In-memory processed-file ledger.
//!
//! A union-only set of canonical file keys. Once a key is present the
//! matcher never considers that file again, whatever the earlier outcome.
//! Iteration is sorted, which is also the persisted order.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedKeySet {
    keys: BTreeSet<String>,
}

impl ProcessedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a key. Returns `true` if it was not already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn to_sorted_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut set = ProcessedKeySet::new();
        assert!(set.insert("/tmp/a.jpg"));
        assert!(!set.insert("/tmp/a.jpg"));
        assert_eq!(set.len(), 1);
        assert!(set.contains("/tmp/a.jpg"));
    }

    #[test]
    fn test_sorted_output() {
        let set = ProcessedKeySet::from_keys(["/z.png", "/a.jpg", "/m.jpg"]);
        assert_eq!(set.to_sorted_vec(), vec!["/a.jpg", "/m.jpg", "/z.png"]);
    }
}
