// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search index over user records.
//!
//! Each entry keeps a lower-cased text blob of the searchable fields plus a
//! de-duplicated token set. The index is a pure function of the record list;
//! [`Fingerprint`] lets callers detect when a rebuild is actually needed.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::record::User;

/// Content hash over `id`, `name` and `email` of every record, in order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of(records: &[Arc<User>]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(records.len() as u64).to_le_bytes());
        for user in records {
            hasher.update(&user.id.to_le_bytes());
            for field in [&user.name, &user.email] {
                hasher.update(&(field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        Self(hasher.finalize())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.0.to_hex()[..16])
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub record: Arc<User>,
    pub searchable_text: String,
    pub tokens: BTreeSet<String>,
}

impl IndexEntry {
    pub fn new(record: Arc<User>) -> Self {
        let searchable_text = searchable_text(&record);
        let tokens = search_tokens(&record, &searchable_text);
        Self {
            record,
            searchable_text,
            tokens,
        }
    }
}

fn searchable_text(user: &User) -> String {
    [
        user.name.as_str(),
        user.username.as_str(),
        user.email.as_str(),
        user.company.name.as_str(),
        user.company.catch_phrase.as_str(),
        user.address.city.as_str(),
        user.address.street.as_str(),
        user.website.as_str(),
        user.phone.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

/// Text tokens longer than one character, plus name words, the email local
/// part and company name words. Derived tokens skip the length filter.
fn search_tokens(user: &User, text: &str) -> BTreeSet<String> {
    let mut tokens: BTreeSet<String> = text
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(str::to_string)
        .collect();

    let name = user.name.to_lowercase();
    tokens.extend(name.split_whitespace().map(str::to_string));

    let email = user.email.to_lowercase();
    if let Some(local) = email.split('@').next().filter(|l| !l.is_empty()) {
        tokens.insert(local.to_string());
    }

    let company = user.company.name.to_lowercase();
    tokens.extend(company.split_whitespace().map(str::to_string));

    tokens
}

#[derive(Debug, Clone)]
pub struct SearchIndex {
    entries: Vec<IndexEntry>,
    fingerprint: Fingerprint,
}

impl SearchIndex {
    pub fn build(records: &[Arc<User>]) -> Self {
        let started = Instant::now();
        let entries: Vec<IndexEntry> = records.iter().cloned().map(IndexEntry::new).collect();
        debug!(
            users = entries.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "search index built"
        );
        Self {
            entries,
            fingerprint: Fingerprint::of(records),
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::build(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_user;

    fn leanne() -> Arc<User> {
        let mut user = sample_user(1, "Leanne Graham", "Sincere@april.biz");
        user.username = "Bret".to_string();
        Arc::new(user)
    }

    #[test]
    fn searchable_text_is_lowercased_field_join() {
        let entry = IndexEntry::new(leanne());
        assert!(entry
            .searchable_text
            .starts_with("leanne graham bret sincere@april.biz romaguera-crona"));
        assert!(entry.searchable_text.contains("gwenborough kulas light hildegard.org"));
        assert!(entry.searchable_text.ends_with("1-770-736-8031 x56442"));
    }

    #[test]
    fn tokens_include_derived_parts_without_duplicates() {
        let entry = IndexEntry::new(leanne());
        for expected in ["leanne", "graham", "sincere", "sincere@april.biz", "romaguera-crona"] {
            assert!(entry.tokens.contains(expected), "missing {expected}");
        }
        let count = entry.tokens.iter().filter(|t| t.as_str() == "leanne").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn single_character_text_tokens_are_dropped_but_name_words_kept() {
        let mut user = sample_user(7, "Kurtis Q Weissnat", "Telly.Hoeger@billy.biz");
        user.address.street = "a Rex Trail".to_string();
        let entry = IndexEntry::new(Arc::new(user));
        assert!(!entry.tokens.contains("a"));
        assert!(entry.tokens.contains("q"));
        assert!(entry.tokens.contains("telly.hoeger"));
    }

    #[test]
    fn fingerprint_tracks_identity_fields_only() {
        let a = vec![leanne()];
        let mut changed_city = (*leanne()).clone();
        changed_city.address.city = "Elsewhere".to_string();
        let b = vec![Arc::new(changed_city)];
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));

        let mut renamed = (*leanne()).clone();
        renamed.name = "Leanne G.".to_string();
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&[Arc::new(renamed)]));
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&[]));
    }

    #[test]
    fn build_preserves_record_order() {
        let records = vec![
            Arc::new(sample_user(3, "Clementine Bauch", "Nathan@yesenia.net")),
            leanne(),
        ];
        let index = SearchIndex::build(&records);
        let ids: Vec<u64> = index.entries().iter().map(|e| e.record.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(SearchIndex::default().is_empty());
    }
}
