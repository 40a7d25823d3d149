//! Rendering of the final token list into primitive argv strings.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::spec::ArgKind;
use crate::tokenize::Token;

pub fn emit(tokens: &[Token]) -> Result<Vec<String>> {
    let mut argv = Vec::new();
    for token in tokens {
        emit_token(token, &mut argv)?;
    }
    Ok(argv)
}

fn emit_token(token: &Token, argv: &mut Vec<String>) -> Result<()> {
    match &token.kind {
        ArgKind::Value | ArgKind::Values => {
            argv.extend(flatten(&token.value).into_iter().map(scalar_to_string));
        }
        ArgKind::Option | ArgKind::Flag => emit_named(token, argv),
        ArgKind::DoubleDash => {
            argv.push("--".to_string());
            argv.extend(
                flatten(&token.value)
                    .into_iter()
                    .filter(|v| !v.is_boolean())
                    .map(scalar_to_string),
            );
        }
        ArgKind::Variable | ArgKind::Collection | ArgKind::Unknown(_) => {
            return Err(Error::InvalidArgumentType(token.kind.to_string()));
        }
    }
    Ok(())
}

/// Options attach their value unless told otherwise; flags only on request.
pub fn attaches_value(token: &Token, value: &Value) -> bool {
    match &token.use_value {
        Some(use_value) => use_value.attaches(value),
        None => token.kind == ArgKind::Option,
    }
}

/// Whether any of the token's values would be emitted.
pub fn bears_value(token: &Token) -> bool {
    flatten(&token.value)
        .into_iter()
        .any(|v| attaches_value(token, v))
}

fn emit_named(token: &Token, argv: &mut Vec<String>) {
    let default_prefix = if token.kind == ArgKind::Option { "--" } else { "-" };
    let prefix = token.prefix.as_deref().unwrap_or(default_prefix);
    let name = format!("{}{}", prefix, token.key);
    let delimiter = token.join.as_ref().and_then(|j| j.delimiter());

    let mut attached = false;
    for value in flatten(&token.value) {
        if !attaches_value(token, value) {
            continue;
        }
        attached = true;
        let value = scalar_to_string(value);
        match delimiter {
            Some(d) => argv.push(format!("{}{}{}", name, d, value)),
            None => {
                argv.push(name.clone());
                argv.push(value);
            }
        }
    }
    if !attached {
        argv.push(name);
    }
}

/// Nested lists flattened in order; `null` contributes nothing.
pub fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other],
    }
}

pub fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
