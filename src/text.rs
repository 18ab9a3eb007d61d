//! Label and predicate normalization.
//!
//! Every object name and predicate goes through [`normalize`] before it is
//! counted or compared, optionally followed by an [`AliasMap`] lookup.

use std::collections::HashMap;

// Characters that show up in free-text annotations and their ASCII stand-ins
const REPLACEMENTS: &[(char, &str)] = &[
    ('½', "half"),
    ('—', "-"),
    ('™', ""),
    ('¢', "cent"),
    ('ç', "c"),
    ('û', "u"),
    ('é', "e"),
    ('°', " degree"),
    ('è', "e"),
    ('…', ""),
];

/// Normalize a token: trim, substitute special characters, lowercase ASCII and
/// strip ASCII punctuation.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out.retain(|c| !c.is_ascii_punctuation());
    out.make_ascii_lowercase();
    out
}

/// Normalize raw bytes, silently dropping any sequence that is not valid UTF-8.
pub fn normalize_bytes(raw: &[u8]) -> String {
    normalize(&decode_lossy(raw))
}

/// Decode valid UTF-8 runs and skip invalid bytes instead of substituting
/// U+FFFD. Lone surrogates decoded from JSON escapes are dropped the same way.
pub fn decode_lossy(mut raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    loop {
        match std::str::from_utf8(raw) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = raw.split_at(e.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    out.push_str(valid);
                }
                match e.error_len() {
                    Some(len) => raw = &rest[len..],
                    None => return out,
                }
            }
        }
    }
}

/// Maps alias tokens to their canonical form.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    targets: HashMap<String, String>,
}

impl AliasMap {
    /// Parse alias groups, one comma-separated group per line. The first term
    /// of a line is the target for the whole line, unless that term was
    /// already aliased by an earlier line.
    pub fn parse(content: &str) -> Self {
        let mut targets: HashMap<String, String> = HashMap::new();
        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let terms: Vec<&str> = line.split(',').collect();
            let target = targets
                .get(terms[0])
                .cloned()
                .unwrap_or_else(|| terms[0].to_string());
            for term in terms {
                targets.insert(term.to_string(), target.clone());
            }
        }
        Self { targets }
    }

    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        self.targets.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Normalize a token and resolve it through an optional alias map.
pub fn canonicalize(text: &str, aliases: Option<&AliasMap>) -> String {
    let token = normalize(text);
    match aliases {
        Some(aliases) => aliases.resolve(&token).to_string(),
        None => token,
    }
}
