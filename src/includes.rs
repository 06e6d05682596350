//! Merging of explicit include fragments into a projection.
//!
//! Each include is a dotted path (`author.company`, or
//! `blocks[_type == "video"]` for a narrowed collection) paired with the
//! projection entry its last member should get. Includes are applied
//! shortest path first so parents exist before their children.

use serde_json::{Map, Value as JsonValue};
use tracing::trace;

use crate::bridge::{parse_projection, render_projection, tokenize};
use crate::error::BridgeError;
use crate::projection::{ARRAY_FILTER, DEREFERENCING_SWITCH, SPREAD};
use crate::tokens::untokenize;

type Object = Map<String, JsonValue>;

/// Expands `projection` with every `(path, fragment)` include.
///
/// # Examples
///
/// ```
/// use groq_expr::includes::expand_includes;
///
/// let includes = vec![("author".to_string(), "author->{name}".to_string())];
/// assert_eq!(
///     expand_includes("{...}", &includes).unwrap(),
///     "{...,author->{name}}"
/// );
/// ```
pub fn expand_includes(
    projection: &str,
    includes: &[(String, String)],
) -> Result<String, BridgeError> {
    let mut root = parse_projection(projection)?;

    let mut ordered: Vec<&(String, String)> = includes.iter().collect();
    ordered.sort_by_key(|(path, _)| path.len());

    for (path, fragment) in ordered {
        let segments = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(BridgeError::IncludePath(path.clone()));
        };

        let fragment_map = parse_projection(fragment)?;
        let mut entries = fragment_map.into_iter();
        let (Some((fragment_key, fragment_value)), None) = (entries.next(), entries.next()) else {
            return Err(BridgeError::IncludePath(format!(
                "{}: fragment must hold exactly one entry",
                path
            )));
        };

        let mut target = &mut root;
        for segment in parents {
            target = descend(target, segment)?;
        }
        merge_entry(target, last, fragment_key, fragment_value);
        trace!(path = %path, "merged include");
    }

    normalize_filtered(&mut root);
    render_projection(&root)
}

/// Splits a dotted include path, ignoring dots inside brackets, parens
/// and string literals.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in path.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Splits `name[filter]` into its parts.
fn split_segment(segment: &str) -> (&str, Option<&str>) {
    match segment.find('[') {
        Some(start) if segment.ends_with(']') => (
            &segment[..start],
            Some(&segment[start + 1..segment.len() - 1]),
        ),
        _ => (segment, None),
    }
}

fn spread_object() -> JsonValue {
    let mut map = Object::new();
    map.insert(tokenize(SPREAD), JsonValue::Bool(true));
    JsonValue::Object(map)
}

fn conditional_key(filter: &str) -> String {
    tokenize(&format!("({})=>", filter))
}

/// Whether a projection entry key renders the member `name`: bare,
/// aliased (`"name": ...`), filtered (`name[...]`) or dereferenced
/// (`name->...`).
fn key_matches(key: &str, name: &str) -> bool {
    let key = untokenize(key);
    key == name
        || key.starts_with(&format!("\"{}\":", name))
        || key.starts_with(&format!("{}[", name))
        || key.starts_with(&format!("{}->", name))
}

fn find_key(map: &Object, name: &str) -> Option<String> {
    map.keys().find(|key| key_matches(key, name)).cloned()
}

fn find_switch_key(map: &Object) -> Option<String> {
    map.keys()
        .find(|key| untokenize(key).starts_with(DEREFERENCING_SWITCH))
        .cloned()
}

/// Returns the object holding the fields of `segment`, creating it when
/// missing. Dereferenced members descend into their switch block and
/// filtered segments into their conditional block.
fn descend<'m>(map: &'m mut Object, segment: &str) -> Result<&'m mut Object, BridgeError> {
    let (name, filter) = split_segment(segment);
    let key = match find_key(map, name) {
        Some(key) => key,
        None => {
            let key = tokenize(name);
            map.insert(key.clone(), spread_object());
            key
        }
    };

    let value = map
        .get_mut(&key)
        .ok_or_else(|| BridgeError::IncludePath(segment.to_string()))?;
    if !value.is_object() {
        *value = spread_object();
    }
    let JsonValue::Object(inner) = value else {
        return Err(BridgeError::IncludePath(segment.to_string()));
    };

    let inner = match find_switch_key(inner) {
        Some(switch) => match inner.get_mut(&switch) {
            Some(JsonValue::Object(fields)) => fields,
            _ => return Err(BridgeError::IncludePath(segment.to_string())),
        },
        None => inner,
    };

    match filter {
        Some(filter) => {
            let conditional = conditional_key(filter);
            let value = inner
                .entry(conditional)
                .or_insert_with(spread_object);
            if !value.is_object() {
                *value = spread_object();
            }
            match value {
                JsonValue::Object(fields) => Ok(fields),
                _ => Err(BridgeError::IncludePath(segment.to_string())),
            }
        }
        None => Ok(inner),
    }
}

/// Puts the fragment entry where `segment` lives, keeping its position
/// and merging with what is already there.
fn merge_entry(target: &mut Object, segment: &str, key: String, value: JsonValue) {
    let (name, filter) = split_segment(segment);
    let merged_key = key.clone();
    match find_key(target, name) {
        Some(existing) => {
            let previous = target.get(&existing).cloned().unwrap_or(JsonValue::Bool(true));
            let merged = merge_values(previous, value);
            replace_entry(target, &existing, key, merged);
        }
        None => {
            target.insert(key, value);
        }
    }

    if filter.is_some()
        && let Some(JsonValue::Object(fields)) = target.get_mut(&merged_key)
    {
        drop_bare_conditionals(fields);
    }
}

fn merge_values(previous: JsonValue, incoming: JsonValue) -> JsonValue {
    match (previous, incoming) {
        (JsonValue::Object(mut existing), JsonValue::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => {
                        let old = std::mem::replace(slot, JsonValue::Null);
                        *slot = merge_values(old, value);
                    }
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
            JsonValue::Object(existing)
        }
        (JsonValue::Object(existing), JsonValue::Bool(true)) => JsonValue::Object(existing),
        (_, incoming) => incoming,
    }
}

/// Rebuilds `map` with `old_key` swapped for `new_key`, in place.
fn replace_entry(map: &mut Object, old_key: &str, new_key: String, value: JsonValue) {
    let entries = std::mem::take(map);
    let mut replacement = Some((new_key, value));
    for (key, existing) in entries {
        if key == old_key {
            if let Some((new_key, value)) = replacement.take() {
                map.insert(new_key, value);
            }
        } else {
            map.insert(key, existing);
        }
    }
}

fn is_sole_spread(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => {
            map.len() == 1 && map.keys().all(|key| untokenize(key) == SPREAD)
        }
        _ => false,
    }
}

/// Conditional blocks that only add `...` say nothing beyond the spread.
fn drop_bare_conditionals(fields: &mut Object) {
    let bare: Vec<String> = fields
        .iter()
        .filter(|(key, value)| untokenize(key).ends_with("=>") && is_sole_spread(value))
        .map(|(key, _)| key.clone())
        .collect();
    for key in bare {
        fields.shift_remove(&key);
    }
}

/// Moves `name[filter]` entries into a sibling `name` or
/// `name[defined(@)]` entry as a `(filter)=>{...}` block, recursively.
fn normalize_filtered(map: &mut Object) {
    for value in map.values_mut() {
        if let JsonValue::Object(inner) = value {
            normalize_filtered(inner);
        }
    }

    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let plain = untokenize(&key);
        let (name, filter) = split_segment(&plain);
        let Some(filter) = filter else { continue };
        if format!("[{}]", filter) == ARRAY_FILTER {
            continue;
        }
        let sibling = map
            .keys()
            .find(|candidate| {
                let candidate = untokenize(candidate);
                candidate == name || candidate == format!("{}{}", name, ARRAY_FILTER)
            })
            .cloned();
        let Some(sibling) = sibling else { continue };

        let Some(filtered) = map.shift_remove(&key) else { continue };
        let fields = if filtered.is_object() {
            filtered
        } else {
            spread_object()
        };
        if let Some(target) = map.get_mut(&sibling) {
            if !target.is_object() {
                *target = spread_object();
            }
            if let JsonValue::Object(target) = target {
                target.insert(conditional_key(filter), fields);
            }
        }
    }
}
