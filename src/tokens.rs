//! Placeholder tokens protecting GROQ syntax during JSON conversion.
//!
//! Every syntactically significant substring gets a fixed-width
//! placeholder (`__TKN` + three digits + `__`). The bridge swaps these in
//! before treating a projection as JSON and swaps them back afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Shared prefix of every placeholder.
pub const PLACEHOLDER_PREFIX: &str = "__TKN";

/// Width of a placeholder in bytes.
pub const PLACEHOLDER_LEN: usize = 10;

/// Where a registered substring is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    /// Operators, quotes, the dereference marker and significant spaces.
    Anywhere,
    /// JSON-structural characters: only replaced inside string literals and
    /// inside bracket or paren groups, where they are not structure.
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub text: &'static str,
    pub placeholder: String,
    pub scope: TokenScope,
}

const TABLE: &[(&str, TokenScope)] = &[
    ("->", TokenScope::Anywhere),
    ("=>", TokenScope::Anywhere),
    ("==", TokenScope::Anywhere),
    ("!=", TokenScope::Anywhere),
    (">=", TokenScope::Anywhere),
    ("<=", TokenScope::Anywhere),
    ("&&", TokenScope::Anywhere),
    ("||", TokenScope::Anywhere),
    ("...", TokenScope::Anywhere),
    ("..", TokenScope::Anywhere),
    ("[", TokenScope::Anywhere),
    ("]", TokenScope::Anywhere),
    ("(", TokenScope::Anywhere),
    (")", TokenScope::Anywhere),
    ("@", TokenScope::Anywhere),
    ("\"", TokenScope::Anywhere),
    ("'", TokenScope::Anywhere),
    (":", TokenScope::Anywhere),
    (".", TokenScope::Anywhere),
    ("*", TokenScope::Anywhere),
    ("!", TokenScope::Anywhere),
    (">", TokenScope::Anywhere),
    ("<", TokenScope::Anywhere),
    ("=", TokenScope::Anywhere),
    ("+", TokenScope::Anywhere),
    ("-", TokenScope::Anywhere),
    ("/", TokenScope::Anywhere),
    ("%", TokenScope::Anywhere),
    ("|", TokenScope::Anywhere),
    ("$", TokenScope::Anywhere),
    ("^", TokenScope::Anywhere),
    ("&", TokenScope::Anywhere),
    ("?", TokenScope::Anywhere),
    (";", TokenScope::Anywhere),
    ("#", TokenScope::Anywhere),
    ("~", TokenScope::Anywhere),
    ("`", TokenScope::Anywhere),
    ("\\", TokenScope::Anywhere),
    (" ", TokenScope::Anywhere),
    ("{", TokenScope::Structural),
    ("}", TokenScope::Structural),
    (",", TokenScope::Structural),
    ("\t", TokenScope::Structural),
    ("\n", TokenScope::Structural),
    ("\r", TokenScope::Structural),
];

/// Immutable process-wide token table.
#[derive(Debug)]
pub struct TokenRegistry {
    entries: Vec<TokenEntry>,
    tokens: HashMap<&'static str, usize>,
    reverse_tokens: HashMap<String, usize>,
    sorted_keys: Vec<&'static str>,
}

static REGISTRY: Lazy<TokenRegistry> = Lazy::new(TokenRegistry::build);

impl TokenRegistry {
    pub fn global() -> &'static TokenRegistry {
        &REGISTRY
    }

    fn build() -> Self {
        let entries: Vec<TokenEntry> = TABLE
            .iter()
            .enumerate()
            .map(|(index, (text, scope))| TokenEntry {
                text,
                placeholder: format!("{}{:03}__", PLACEHOLDER_PREFIX, index),
                scope: *scope,
            })
            .collect();

        let tokens = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.text, index))
            .collect();
        let reverse_tokens = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.placeholder.clone(), index))
            .collect();

        let mut sorted_keys: Vec<&'static str> = entries.iter().map(|entry| entry.text).collect();
        // Longest first so scanning always takes the maximal match.
        sorted_keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        TokenRegistry {
            entries,
            tokens,
            reverse_tokens,
            sorted_keys,
        }
    }

    pub fn entries(&self) -> &[TokenEntry] {
        &self.entries
    }

    pub fn sorted_keys(&self) -> &[&'static str] {
        &self.sorted_keys
    }

    pub fn placeholder(&self, text: &str) -> Option<&str> {
        self.tokens
            .get(text)
            .map(|index| self.entries[*index].placeholder.as_str())
    }

    pub fn original(&self, placeholder: &str) -> Option<&'static str> {
        self.reverse_tokens
            .get(placeholder)
            .map(|index| self.entries[*index].text)
    }

    /// Longest registered substring at the start of `input` that may be
    /// replaced in the given context.
    pub fn longest_match(&self, input: &str, guarded: bool) -> Option<&TokenEntry> {
        self.sorted_keys.iter().find_map(|key| {
            if !input.starts_with(key) {
                return None;
            }
            let entry = &self.entries[self.tokens[key]];
            match entry.scope {
                TokenScope::Anywhere => Some(entry),
                TokenScope::Structural if guarded => Some(entry),
                TokenScope::Structural => None,
            }
        })
    }

    /// Placeholder for a single character, in any scope.
    pub fn char_placeholder(&self, ch: char) -> Option<&str> {
        let mut buf = [0u8; 4];
        self.placeholder(ch.encode_utf8(&mut buf))
    }
}

/// Replaces every recognized placeholder with its original substring.
///
/// Prefix occurrences that do not form a known placeholder are copied
/// through unchanged.
pub fn untokenize(text: &str) -> String {
    let registry = TokenRegistry::global();
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
        result.push_str(&rest[..start]);
        let candidate = rest.get(start..start + PLACEHOLDER_LEN);
        match candidate.and_then(|c| registry.original(c)) {
            Some(original) => {
                result.push_str(original);
                rest = &rest[start + PLACEHOLDER_LEN..];
            }
            None => {
                result.push_str(PLACEHOLDER_PREFIX);
                rest = &rest[start + PLACEHOLDER_PREFIX.len()..];
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_fixed_width_and_unique() {
        let registry = TokenRegistry::global();
        let mut seen = std::collections::HashSet::new();
        for entry in registry.entries() {
            assert_eq!(entry.placeholder.len(), PLACEHOLDER_LEN);
            assert!(entry.placeholder.starts_with(PLACEHOLDER_PREFIX));
            assert!(seen.insert(entry.placeholder.clone()));
        }
    }

    #[test]
    fn sorted_keys_are_longest_first() {
        let keys = TokenRegistry::global().sorted_keys();
        assert!(keys.windows(2).all(|w| w[0].len() >= w[1].len()));
        assert_eq!(keys[0], "...");
    }

    #[test]
    fn longest_match_prefers_multi_char_operators() {
        let registry = TokenRegistry::global();
        assert_eq!(registry.longest_match("->{", false).map(|e| e.text), Some("->"));
        assert_eq!(registry.longest_match("...}", false).map(|e| e.text), Some("..."));
        assert_eq!(registry.longest_match("-1", false).map(|e| e.text), Some("-"));
    }

    #[test]
    fn structural_tokens_only_match_when_guarded() {
        let registry = TokenRegistry::global();
        assert!(registry.longest_match(",a", false).is_none());
        assert_eq!(registry.longest_match(",a", true).map(|e| e.text), Some(","));
    }

    #[test]
    fn untokenize_passes_unknown_prefix_through() {
        assert_eq!(untokenize("a__TKN999__b"), "a__TKN999__b");
        assert_eq!(untokenize("tail__TKN"), "tail__TKN");
    }

    #[test]
    fn untokenize_restores_known_placeholders() {
        let registry = TokenRegistry::global();
        let arrow = registry.placeholder("->").unwrap_or_default().to_string();
        assert_eq!(untokenize(&format!("author{}name", arrow)), "author->name");
    }
}
