//! Token vocabularies for object labels and predicates.

use log::info;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{Object, Relationship};

/// Count token occurrences. When an allow-list is given, tokens outside it are
/// ignored rather than counted.
pub fn count_tokens<'a, I>(tokens: I, allow_list: Option<&HashSet<String>>) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counter: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        if allow_list.is_some_and(|allowed| !allowed.contains(token)) {
            continue;
        }
        *counter.entry(token.to_string()).or_insert(0) += 1;
    }
    counter
}

/// Bidirectional token/index mapping with token frequencies.
///
/// Indices start at 1 (0 is reserved) and follow lexicographic token order, so
/// the mapping depends only on the set of kept tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    token_to_idx: BTreeMap<String, i32>,
    idx_to_token: Vec<String>,
    counts: BTreeMap<String, usize>,
    distinct_seen: usize,
}

impl Vocabulary {
    /// Build a vocabulary from token counts, optionally keeping only the `limit`
    /// most frequent tokens (ties broken lexicographically). A limit of zero
    /// disables the cutoff.
    pub fn from_counts(counts: HashMap<String, usize>, limit: Option<usize>) -> Self {
        let distinct_seen = counts.len();
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)));
        if let Some(limit) = limit.filter(|&limit| limit > 0) {
            ranked.truncate(limit);
        }

        let counts: BTreeMap<String, usize> = ranked.into_iter().collect();
        let mut token_to_idx = BTreeMap::new();
        let mut idx_to_token = Vec::with_capacity(counts.len());
        // BTreeMap iteration is already lexicographic
        for (i, token) in counts.keys().enumerate() {
            token_to_idx.insert(token.clone(), i as i32 + 1);
            idx_to_token.push(token.clone());
        }

        Self {
            token_to_idx,
            idx_to_token,
            counts,
            distinct_seen,
        }
    }

    /// Vocabulary over every name of every object.
    pub fn for_objects(
        objects: &[Vec<Object>],
        allow_list: Option<&HashSet<String>>,
        limit: Option<usize>,
    ) -> Self {
        let tokens = objects
            .iter()
            .flatten()
            .flat_map(|obj| obj.names.iter().map(String::as_str));
        Self::from_counts(count_tokens(tokens, allow_list), limit)
    }

    /// Vocabulary over every relationship predicate.
    pub fn for_predicates(
        relationships: &[Vec<Relationship>],
        allow_list: Option<&HashSet<String>>,
        limit: Option<usize>,
    ) -> Self {
        let tokens = relationships
            .iter()
            .flatten()
            .map(|rel| rel.predicate.as_str());
        Self::from_counts(count_tokens(tokens, allow_list), limit)
    }

    pub fn index(&self, token: &str) -> Option<i32> {
        self.token_to_idx.get(token).copied()
    }

    pub fn token(&self, index: i32) -> Option<&str> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.idx_to_token.get(slot).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_idx.contains_key(token)
    }

    /// Corpus frequency of a kept token, 0 if the token is not in the vocabulary.
    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.idx_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx_to_token.is_empty()
    }

    pub fn token_to_idx(&self) -> &BTreeMap<String, i32> {
        &self.token_to_idx
    }

    pub fn idx_to_token(&self) -> BTreeMap<i32, String> {
        self.idx_to_token
            .iter()
            .enumerate()
            .map(|(i, token)| (i as i32 + 1, token.clone()))
            .collect()
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn print_summary(&self, kind: &str) {
        info!("Keeping {} / {} {}", self.len(), self.distinct_seen, kind);
    }
}
