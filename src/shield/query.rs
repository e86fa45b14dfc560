//! Bracket-aware decoding of query strings and urlencoded form bodies.
//!
//! `user[name]=ada&tags[]=a&tags[]=b` decodes to
//! `{"user":{"name":"ada"},"tags":["a","b"]}`. Repeated plain keys collect into
//! an array. Values are always strings.
//!
//! At most [`MAX_DEPTH`] bracket segments are split off a key; whatever
//! follows stays one literal segment, so `a[b][c][d][e][f][g]` nests
//! `b` through `f` and keys the innermost value by `[g]`.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Bracket segments split off a single key.
pub const MAX_DEPTH: usize = 5;

/// Decodes `a=1&b[c]=2` into a JSON object.
pub fn decode(input: &str) -> Value {
    let mut root = Map::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key);
        insert(&mut root, &segments, Value::String(value.into_owned()));
    }
    Value::Object(root)
}

/// Keeps the raw `key=value` pairs of `input` whose key path still exists in
/// `value`, in their original order and encoding.
///
/// `value` is expected to be a pruned copy of `decode(input)`: pairs whose
/// path was removed are dropped, every other pair is forwarded byte for byte.
pub fn retain_present(input: &str, value: &Value) -> String {
    input
        .split('&')
        .filter(|raw| !raw.is_empty())
        .filter(|raw| {
            form_urlencoded::parse(raw.as_bytes())
                .next()
                .is_some_and(|(key, _)| !key.is_empty() && path_exists(value, &split_key(&key)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn path_exists(value: &Value, segments: &[&str]) -> bool {
    let mut current = value;
    for segment in segments {
        match current {
            Value::Object(map) => match map.get(*segment) {
                Some(next) => current = next,
                None => return false,
            },
            _ => return true,
        }
    }
    true
}

fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return vec![key];
    };

    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        if segments.len() > MAX_DEPTH {
            segments.push(rest);
            return segments;
        }
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    if rest.is_empty() { segments } else { vec![key] }
}

fn insert(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((&head, tail)) = segments.split_first() else {
        return;
    };

    match tail.first() {
        None => match map.get_mut(head) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing @ Value::String(_)) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            Some(_) => {}
            None => {
                map.insert(head.to_owned(), value);
            }
        },
        Some(&"") => {
            let slot = map
                .entry(head.to_owned())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(value),
                Value::String(_) => {
                    let first = slot.take();
                    *slot = Value::Array(vec![first, value]);
                }
                _ => {}
            }
        }
        Some(_) => {
            let slot = map
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert(child, tail, value);
            }
        }
    }
}
