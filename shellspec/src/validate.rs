//! Cross-argument constraints over the resolved token list.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::emit::scalar_to_string;
use crate::error::{Error, Result};
use crate::tokenize::Token;

/// Enforce `with`, `withAll`, `without` and `choices`, then drop tokens whose
/// `when`, `whenAll` or `unless` conditions do not hold.
///
/// Every check looks at the full, unfiltered list, so conditions may refer to
/// tokens before or after the one being checked.
pub fn validate(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let keep: Vec<bool> = {
        let present: HashSet<&str> = tokens.iter().flat_map(Token::names).collect();
        for token in &tokens {
            check_with(token, &present)?;
            check_with_all(token, &present)?;
            check_without(token, &tokens)?;
            check_choices(token)?;
        }
        tokens.iter().map(|t| conditions_hold(t, &present)).collect()
    };
    let kept = tokens
        .into_iter()
        .zip(keep)
        .filter_map(|(token, keep)| {
            if !keep {
                debug!(token = %token.name, "dropped by condition");
            }
            keep.then_some(token)
        })
        .collect();
    Ok(kept)
}

fn is_self(token: &Token, name: &str) -> bool {
    token.names().any(|n| n == name)
}

fn check_with(token: &Token, present: &HashSet<&str>) -> Result<()> {
    let with = &token.rules.with;
    if with.is_empty() || with.iter().any(|n| present.contains(n.as_str())) {
        return Ok(());
    }
    let expected = if with.len() == 1 {
        format!("`{}`", with[0])
    } else {
        format!("one of {}", quote_names(with))
    };
    Err(Error::CoOccurrenceViolation(format!(
        "the {} `{}` must be accompanied by {}",
        token.kind, token.name, expected
    )))
}

fn check_with_all(token: &Token, present: &HashSet<&str>) -> Result<()> {
    let missing: Vec<String> = token
        .rules
        .with_all
        .iter()
        .filter(|n| !present.contains(n.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::CoOccurrenceViolation(format!(
        "the {} `{}` must be accompanied by all of {} (missing {})",
        token.kind,
        token.name,
        quote_names(&token.rules.with_all),
        quote_names(&missing)
    )))
}

fn check_without(token: &Token, tokens: &[Token]) -> Result<()> {
    for name in &token.rules.without {
        if is_self(token, name) {
            continue;
        }
        if let Some(bad) = tokens.iter().find(|t| is_self(t, name)) {
            return Err(Error::MutualExclusionViolation(format!(
                "the {} `{}` and the {} `{}` cannot be used together",
                token.kind, token.name, bad.kind, bad.name
            )));
        }
    }
    Ok(())
}

fn check_choices(token: &Token) -> Result<()> {
    if token.rules.choices.is_empty() {
        return Ok(());
    }
    let allowed: Vec<String> = token.rules.choices.iter().map(scalar_to_string).collect();
    let values: Vec<&Value> = match &token.value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for value in values {
        let given = scalar_to_string(value);
        if !allowed.contains(&given) {
            return Err(Error::InvalidChoice(format!(
                "invalid choice \"{}\" for the {} `{}`, expected one of {}",
                given,
                token.kind,
                token.name,
                allowed
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
    }
    Ok(())
}

fn conditions_hold(token: &Token, present: &HashSet<&str>) -> bool {
    let rules = &token.rules;
    let when = rules.when.is_empty() || rules.when.iter().any(|n| present.contains(n.as_str()));
    let when_all = rules.when_all.iter().all(|n| present.contains(n.as_str()));
    let unless = !rules.unless.iter().any(|n| present.contains(n.as_str()));
    when && when_all && unless
}

fn quote_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ArgDef, ArgKind};
    use serde_json::json;

    fn token(name: &str, value: Value) -> Token {
        Token::from_def(&ArgDef::named(name), value)
    }

    fn names(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.name.as_str()).collect()
    }

    // ==================== with / withAll ====================

    #[test]
    fn test_with_satisfied_by_any() {
        let mut a = token("a", json!(true));
        a.rules.with = vec!["x".into(), "b".into()];
        let tokens = validate(vec![a, token("b", json!(1))]).unwrap();
        assert_eq!(names(&tokens), vec!["a", "b"]);
    }

    #[test]
    fn test_with_unsatisfied() {
        let mut formal = token("formal", json!(true));
        formal.rules.with = vec!["last-name".into()];
        let err = validate(vec![formal, token("first-name", json!("Jane"))]).unwrap_err();
        match err {
            Error::CoOccurrenceViolation(msg) => {
                assert!(msg.contains("`formal`"));
                assert!(msg.contains("`last-name`"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_with_all_lists_missing() {
        let mut a = token("a", json!(true));
        a.rules.with_all = vec!["b".into(), "c".into()];
        let err = validate(vec![a, token("b", json!(1))]).unwrap_err();
        assert!(matches!(err, Error::CoOccurrenceViolation(ref m) if m.contains("missing `c`")));
    }

    #[test]
    fn test_with_satisfied_by_aka() {
        let mut a = token("a", json!(true));
        a.rules.with = vec!["v".into()];
        let mut verbose = token("verbose", json!(true));
        verbose.aka = vec!["v".into()];
        assert!(validate(vec![a, verbose]).is_ok());
    }

    // ==================== without ====================

    #[test]
    fn test_without_conflict_names_both() {
        let mut quiet = token("quiet", json!(true));
        quiet.kind = ArgKind::Flag;
        quiet.rules.without = vec!["verbose".into()];
        let err = validate(vec![token("verbose", json!(true)), quiet]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("the flag `quiet` and the option `verbose` cannot be used together"));
    }

    #[test]
    fn test_without_absent_ok() {
        let mut quiet = token("quiet", json!(true));
        quiet.rules.without = vec!["verbose".into()];
        assert!(validate(vec![quiet]).is_ok());
    }

    // ==================== choices ====================

    #[test]
    fn test_choices_reject_scalar() {
        let mut bar = token("bar", json!("d"));
        bar.rules.choices = vec![json!("a"), json!("b"), json!("c")];
        let msg = validate(vec![bar]).unwrap_err().to_string();
        assert!(msg.contains("\"d\""));
        assert!(msg.contains("\"a\", \"b\", \"c\""));
    }

    #[test]
    fn test_choices_accept_all_declared() {
        for choice in ["a", "b", "c"] {
            let mut bar = token("bar", json!(choice));
            bar.rules.choices = vec![json!("a"), json!("b"), json!("c")];
            assert!(validate(vec![bar]).is_ok());
        }
    }

    #[test]
    fn test_choices_array_values() {
        let mut tags = token("tags", json!(["a", "c"]));
        tags.rules.choices = vec![json!("a"), json!("b"), json!("c")];
        assert!(validate(vec![tags.clone()]).is_ok());
        tags.value = json!(["a", "z"]);
        assert!(matches!(validate(vec![tags]), Err(Error::InvalidChoice(ref m)) if m.contains("\"z\"")));
    }

    #[test]
    fn test_choices_compare_stringified() {
        let mut level = token("level", json!(2));
        level.rules.choices = vec![json!(1), json!(2)];
        assert!(validate(vec![level]).is_ok());
    }

    // ==================== when / whenAll / unless ====================

    #[test]
    fn test_when_forward_and_backward_references() {
        let mut a = token("a", json!(true));
        a.rules.when = vec!["c".into()];
        let mut c = token("c", json!(true));
        c.rules.when = vec!["a".into()];
        let tokens = validate(vec![a, token("b", json!(1)), c]).unwrap();
        assert_eq!(names(&tokens), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_when_drops_without_failing() {
        let mut a = token("a", json!(true));
        a.rules.when = vec!["missing".into()];
        let tokens = validate(vec![a, token("b", json!(1))]).unwrap();
        assert_eq!(names(&tokens), vec!["b"]);
    }

    #[test]
    fn test_when_all_and_unless() {
        let mut a = token("a", json!(true));
        a.rules.when_all = vec!["b".into(), "c".into()];
        let mut d = token("d", json!(true));
        d.rules.unless = vec!["b".into()];
        let tokens = validate(vec![a, token("b", json!(1)), d]).unwrap();
        assert_eq!(names(&tokens), vec!["b"]);
    }

    #[test]
    fn test_conditions_use_unfiltered_list() {
        // b is dropped, but a still sees it
        let mut a = token("a", json!(true));
        a.rules.when = vec!["b".into()];
        let mut b = token("b", json!(true));
        b.rules.unless = vec!["a".into()];
        let tokens = validate(vec![a, b]).unwrap();
        assert_eq!(names(&tokens), vec!["a"]);
    }

    #[test]
    fn test_errors_raised_for_tokens_that_would_be_dropped() {
        let mut a = token("a", json!("zz"));
        a.rules.when = vec!["missing".into()];
        a.rules.choices = vec![json!("x")];
        assert!(matches!(validate(vec![a]), Err(Error::InvalidChoice(_))));
    }
}
