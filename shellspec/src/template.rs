//! `${...}` template values.
//!
//! Placeholders hold dotted identifiers only (`${name}`, `${s3.bucket}`); they
//! are looked up against the configuration scope with snake-cased keys, so
//! `${first_name}` finds a `first-name` or `firstName` entry.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::emit::scalar_to_string;
use crate::error::{Error, Result};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("valid regex"));

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$-]*(?:\.[A-Za-z_$][A-Za-z0-9_$-]*)*$").expect("valid regex")
});

pub fn is_template(s: &str) -> bool {
    s.contains("${")
}

/// Expand every placeholder in `template`. Unknown identifiers expand to "".
pub fn render(template: &str, ctx: &Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let path = expr.as_str().trim();
        if !PATH_RE.is_match(path) {
            return Err(Error::invalid_spec(format!(
                "unsupported template expression `{}`",
                path
            )));
        }
        out.push_str(&template[last..whole.start()]);
        if let Some(v) = lookup(ctx, path) {
            out.push_str(&render_value(v));
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Expand a definition's literal `value`: template strings are rendered,
/// lists are rendered element-wise and everything else is kept as is.
pub fn resolve(value: &Value, ctx: &Map<String, Value>) -> Result<Value> {
    match value {
        Value::String(s) if is_template(s) => Ok(Value::String(render(s, ctx)?)),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => scalar_to_string(other),
    }
}

fn lookup<'a>(ctx: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = find_key(ctx, first)?;
    for seg in segments {
        current = find_key(current.as_object()?, seg)?;
    }
    Some(current)
}

fn find_key<'a>(map: &'a Map<String, Value>, ident: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(ident) {
        return Some(v);
    }
    let wanted = snake_case(ident);
    map.iter()
        .find(|(k, _)| snake_case(k) == wanted)
        .map(|(_, v)| v)
}

/// `first-name`, `firstName` and `FIRST_NAME` all become `first_name`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (c.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit()))
                || (c.is_uppercase()
                    && prev.is_uppercase()
                    && next.is_some_and(char::is_lowercase))
                || (c.is_ascii_digit() != prev.is_ascii_digit());
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}
