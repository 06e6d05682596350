//! Projection <-> JSON conversions behind the CLI subcommands.

use serde_json::Value as JsonValue;

use super::CliError;
use crate::bridge::{json_to_groq, parse_projection};
use crate::format::format_query;
use crate::includes::expand_includes;

pub fn format_text(query: &str) -> String {
    format_query(query)
}

/// Converts a projection to its JSON form, validating that it parses.
///
/// Keys keep their placeholder tokens so the output converts back exactly.
pub fn to_json(projection: &str, pretty: bool) -> Result<String, CliError> {
    let map = parse_projection(projection)?;
    let json = if pretty {
        serde_json::to_string_pretty(&map)?
    } else {
        serde_json::to_string(&map)?
    };
    Ok(json)
}

/// Converts the JSON form back to a projection.
pub fn from_json(json: &str) -> Result<String, CliError> {
    let value: JsonValue = serde_json::from_str(json)?;
    Ok(json_to_groq(&serde_json::to_string(&value)?))
}

/// Splits `path=fragment` at the first `=` outside brackets and quotes.
pub fn parse_include(arg: &str) -> Result<(String, String), CliError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut split = None;
    for (i, ch) in arg.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '=') if depth == 0 => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }
    match split {
        Some(i) if i > 0 => Ok((arg[..i].to_string(), arg[i + 1..].to_string())),
        _ => Err(CliError::InvalidInclude(arg.to_string())),
    }
}

pub fn expand_projection(projection: &str, includes: &[String]) -> Result<String, CliError> {
    let includes = includes
        .iter()
        .map(|arg| parse_include(arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(expand_includes(projection, &includes)?)
}
