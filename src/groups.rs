//! Canonical keys for human-entered group and director-title labels.
//!
//! `"Dirección Sur"`, `"DIRECCION SUR"` and `"  direccion   sur "` all key to
//! `"DIRECCION SUR"`. Keys are for matching only; displays keep the first
//! variant seen (see [`GroupLabels`]).

use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a group label: uppercase, strip diacritics, collapse whitespace.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(label: &str) -> String {
    let folded: String = label
        .to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Loose match between two labels: equal keys, or one key contains the other.
pub fn matches_loosely(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Ordered set of labels keyed by normalized form, keeping the first
/// display variant encountered for each key.
#[derive(Debug, Clone, Default)]
pub struct GroupLabels {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl GroupLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label. Blank labels are ignored; later variants of a known
    /// key do not replace its display.
    pub fn insert(&mut self, label: &str) {
        let key = normalize(label);
        if key.is_empty() || self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, label.trim().to_string()));
    }

    /// Display variant for any spelling of a known label.
    pub fn display(&self, label: &str) -> Option<&str> {
        self.index
            .get(&normalize(label))
            .map(|i| self.entries[*i].1.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(&normalize(label))
    }

    /// `(key, display)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for GroupLabels {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut labels = GroupLabels::new();
        for label in iter {
            labels.insert(label);
        }
        labels
    }
}
