//! Identifier Index (C3, §4.3).
//!
//! Normalizes the flat tag stream produced by C2 into lookup structures:
//! an exact-name index, a case-folded secondary index, and a word-token
//! index (compound identifiers split on case/underscore/hyphen boundaries)
//! that powers the `word` fuzzy strategy (§4.5) and C6's vocabulary.

use crate::types::Tag;
use std::collections::HashMap;

/// Splits a compound identifier into lowercase word tokens. Handles
/// `camelCase`, `PascalCase`, `snake_case`, and `kebab-case` uniformly by
/// treating `_`/`-` as separators and inserting a boundary before an
/// uppercase letter that follows a lowercase one or precedes a lowercase one
/// (so `HTTPServer` splits as `http`/`server`, not `h`/`t`/`t`/`p`/...).
pub fn split_identifier_words(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = identifier.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).map(|c| c.is_lowercase()).unwrap_or(false);
            if prev_lower || (next_lower && current.chars().last().map(char::is_uppercase).unwrap_or(false)) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// In-memory index over a rebuilt tag set. `rebuild` is idempotent: calling
/// it again with a new `(files, tags)` snapshot fully replaces prior state.
#[derive(Debug, Default)]
pub struct IdentifierIndex {
    tags: Vec<Tag>,
    by_name: HashMap<String, Vec<usize>>,
    by_name_ci: HashMap<String, Vec<usize>>,
    by_word: HashMap<String, Vec<usize>>,
}

impl IdentifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds all index structures from a fresh tag set. Readers always
    /// see either the prior complete index or this new one (§5): the caller
    /// is expected to swap this struct behind a snapshot pointer, not mutate
    /// it in place while readers are active.
    pub fn rebuild(&mut self, tags: Vec<Tag>) {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name_ci: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_word: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, tag) in tags.iter().enumerate() {
            by_name.entry(tag.name.clone()).or_default().push(i);
            by_name_ci.entry(tag.name.to_lowercase()).or_default().push(i);
            for word in split_identifier_words(&tag.name) {
                by_word.entry(word).or_default().push(i);
            }
        }

        self.tags = tags;
        self.by_name = by_name;
        self.by_name_ci = by_name_ci;
        self.by_word = by_word;
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Exact, case-sensitive lookup (§4.3: "stored exactly as written").
    pub fn lookup(&self, name: &str) -> Vec<&Tag> {
        self.by_name
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.tags[i]).collect())
            .unwrap_or_default()
    }

    /// Case-insensitive lookup via the secondary map.
    pub fn lookup_ci(&self, name: &str) -> Vec<&Tag> {
        self.by_name_ci
            .get(&name.to_lowercase())
            .map(|idxs| idxs.iter().map(|&i| &self.tags[i]).collect())
            .unwrap_or_default()
    }

    /// All tags whose identifier contains `word` as one of its split tokens.
    pub fn lookup_word(&self, word: &str) -> Vec<&Tag> {
        self.by_word
            .get(&word.to_lowercase())
            .map(|idxs| idxs.iter().map(|&i| &self.tags[i]).collect())
            .unwrap_or_default()
    }

    /// The distinct set of identifiers currently indexed (the "universe" fed
    /// to C5/C6/C9).
    pub fn identifiers(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    /// Pre-split word tokens for an identifier, used by C6's vocabulary
    /// builder without re-deriving the split.
    pub fn words_for(&self, name: &str) -> Vec<String> {
        split_identifier_words(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TagCategory, TagKind};

    fn tag(name: &str) -> Tag {
        Tag {
            name: name.to_string(),
            kind: TagKind::Def,
            category: TagCategory::Function,
            file: "a.rs".into(),
            line: 1,
            signature: None,
            language: Some("rs".into()),
        }
    }

    #[test]
    fn splits_camel_snake_kebab_pascal() {
        assert_eq!(split_identifier_words("authenticateUser"), vec!["authenticate", "user"]);
        assert_eq!(split_identifier_words("authenticate_user"), vec!["authenticate", "user"]);
        assert_eq!(split_identifier_words("authenticate-user"), vec!["authenticate", "user"]);
        assert_eq!(split_identifier_words("AuthenticateUser"), vec!["authenticate", "user"]);
        assert_eq!(split_identifier_words("HTTPServer"), vec!["http", "server"]);
    }

    #[test]
    fn rebuild_is_idempotent_and_replaces_state() {
        let mut idx = IdentifierIndex::new();
        idx.rebuild(vec![tag("login")]);
        assert_eq!(idx.len(), 1);
        idx.rebuild(vec![tag("logout"), tag("login")]);
        assert_eq!(idx.len(), 2);
        assert!(idx.lookup("logout").len() == 1);
    }

    #[test]
    fn case_insensitive_lookup() {
        let mut idx = IdentifierIndex::new();
        idx.rebuild(vec![tag("AuthenticateUser")]);
        assert_eq!(idx.lookup_ci("authenticateuser").len(), 1);
        assert!(idx.lookup("authenticateuser").is_empty());
    }

    #[test]
    fn word_index_powers_word_lookup() {
        let mut idx = IdentifierIndex::new();
        idx.rebuild(vec![tag("user_auth")]);
        assert_eq!(idx.lookup_word("auth").len(), 1);
        assert_eq!(idx.lookup_word("user").len(), 1);
    }
}
