//! Conversion between GROQ projection fragments and an intermediate JSON
//! form, so projections can be merged structurally.
//!
//! A projection such as `{...,author{name}}` becomes
//! `{"<spread>":true,"author":{"name":true}}`, where `<spread>` stands for
//! the placeholder of `...`. Operators, quotes and anything inside string
//! literals or bracket groups are replaced with registry placeholders first,
//! so the JSON parser only ever sees object structure.
//!
//! # Examples
//!
//! ```
//! use groq_expr::bridge::{groq_to_json, json_to_groq};
//!
//! let json = groq_to_json("{title,author{name}}");
//! assert_eq!(json, r#"{"title":true,"author":{"name":true}}"#);
//! assert_eq!(json_to_groq(&json), "{title,author{name}}");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::error::BridgeError;
use crate::tokens::{TokenRegistry, untokenize};

static BARE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<pre>[{,])(?P<key>[^{}:,"\s]+)(?P<post>[,}])"#)
        .unwrap_or_else(|e| panic!("bare key pattern: {e}"))
});

static OBJECT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<pre>[{,])(?P<key>[^{}:,"\s]+):"#)
        .unwrap_or_else(|e| panic!("object key pattern: {e}"))
});

/// Replaces GROQ syntax in `text` with placeholders, leaving object
/// structure outside bracket groups untouched.
pub fn tokenize(text: &str) -> String {
    Scanner::new(text).scan()
}

/// Converts a projection fragment to its JSON form.
pub fn groq_to_json(text: &str) -> String {
    let tokenized = tokenize(text);
    let labeled = insert_object_colons(&tokenized);
    // Matches consume their trailing delimiter, so `{a,b,c}` needs two passes.
    let first = BARE_KEY.replace_all(&labeled, r#"${pre}"${key}":true${post}"#);
    let second = BARE_KEY.replace_all(&first, r#"${pre}"${key}":true${post}"#);
    OBJECT_KEY
        .replace_all(&second, r#"${pre}"${key}":"#)
        .into_owned()
}

/// Converts the JSON form back to a projection fragment.
pub fn json_to_groq(json: &str) -> String {
    let text = json
        .replace(":{", "{")
        .replace(":true", "")
        .replace('"', "");
    untokenize(&text)
}

/// Parses a projection (braced or not) into an ordered JSON map.
pub fn parse_projection(text: &str) -> Result<Map<String, JsonValue>, BridgeError> {
    let trimmed = text.trim();
    let braced = if trimmed.starts_with('{') && trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{{{}}}", trimmed)
    };
    let json = groq_to_json(&braced);
    match serde_json::from_str::<JsonValue>(&json)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(BridgeError::NotAnObject(text.to_string())),
    }
}

pub fn render_projection(map: &Map<String, JsonValue>) -> Result<String, BridgeError> {
    let json = serde_json::to_string(map)?;
    Ok(json_to_groq(&json))
}

fn is_structural(ch: char) -> bool {
    matches!(ch, '{' | '}' | ',')
}

/// Inserts the JSON colon before every `{` that opens a labeled object.
fn insert_object_colons(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 8);
    let mut previous: Option<char> = None;
    for ch in text.chars() {
        if ch == '{' && previous.is_some_and(|p| !matches!(p, '{' | ',' | ':')) {
            result.push(':');
        }
        result.push(ch);
        previous = Some(ch);
    }
    result
}

struct Scanner<'a> {
    input: &'a str,
    position: usize,
    output: String,
    quote: Option<char>,
    depth: usize,
    last_source: Option<char>,
    registry: &'static TokenRegistry,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner {
            input,
            position: 0,
            output: String::with_capacity(input.len() * 2),
            quote: None,
            depth: 0,
            last_source: None,
            registry: TokenRegistry::global(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self, ch: char) {
        self.position += ch.len_utf8();
        self.last_source = Some(ch);
    }

    fn emit_char(&mut self, ch: char) {
        match self.registry.char_placeholder(ch) {
            Some(placeholder) => self.output.push_str(placeholder),
            None => self.output.push(ch),
        }
    }

    fn scan(mut self) -> String {
        while let Some(ch) = self.current_char() {
            match self.quote {
                Some(quote) => self.scan_literal(ch, quote),
                None => self.scan_code(ch),
            }
        }
        self.output
    }

    fn scan_literal(&mut self, ch: char, quote: char) {
        if ch == '\\' {
            self.emit_char(ch);
            self.advance(ch);
            if let Some(escaped) = self.current_char() {
                self.emit_char(escaped);
                self.advance(escaped);
            }
            return;
        }
        if ch == quote {
            self.quote = None;
        }
        self.emit_char(ch);
        self.advance(ch);
    }

    fn scan_code(&mut self, ch: char) {
        if ch.is_whitespace() {
            self.skip_whitespace();
            return;
        }
        if ch == '"' || ch == '\'' {
            self.quote = Some(ch);
            self.emit_char(ch);
            self.advance(ch);
            return;
        }
        match ch {
            '[' | '(' => self.depth += 1,
            ']' | ')' => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }

        let guarded = self.depth > 0;
        let rest = &self.input[self.position..];
        match self.registry.longest_match(rest, guarded) {
            Some(entry) => {
                self.output.push_str(&entry.placeholder);
                self.position += entry.text.len();
                self.last_source = entry.text.chars().last();
            }
            None => {
                self.output.push(ch);
                self.advance(ch);
            }
        }
    }

    /// Collapses a whitespace run to one space. Outside bracket groups the
    /// space is dropped next to object structure.
    fn skip_whitespace(&mut self) {
        let before = self.last_source;
        while let Some(ch) = self.current_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.position += ch.len_utf8();
        }
        let after = self.current_char();
        let keep = match (before, after) {
            (Some(_), Some(_)) if self.depth > 0 => true,
            (Some(b), Some(a)) => !is_structural(b) && !is_structural(a),
            _ => false,
        };
        if keep {
            self.emit_char(' ');
        }
        self.last_source = Some(' ');
    }
}
