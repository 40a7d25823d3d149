//! Short-flag clustering (`-a -b -c` into `-abc`).

use tracing::debug;

use crate::emit::bears_value;
use crate::error::{Error, Result};
use crate::spec::{ArgKind, ConcatFlags};
use crate::tokenize::Token;

/// Which flags may be clustered, and whether they must be adjacent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConcatPolicy {
    /// Only flags marked `concatable: true`, adjacent runs only.
    #[default]
    Concatable,
    /// Every single-letter flag, adjacent runs only.
    Adjacent,
    /// Every single-letter flag, hoisted into one cluster at the first flag.
    All,
    /// The listed flags, hoisted into one cluster at the first of them.
    Given(Vec<String>),
}

impl From<&ConcatFlags> for ConcatPolicy {
    fn from(flags: &ConcatFlags) -> Self {
        match flags {
            ConcatFlags::Enabled(true) => ConcatPolicy::All,
            ConcatFlags::Enabled(false) => ConcatPolicy::Concatable,
            ConcatFlags::Mode(mode) if mode == "all" => ConcatPolicy::All,
            ConcatFlags::Mode(mode) if mode == "adjacent" => ConcatPolicy::Adjacent,
            ConcatFlags::Mode(_) => ConcatPolicy::Concatable,
            ConcatFlags::Given(names) => ConcatPolicy::Given(names.clone()),
        }
    }
}

impl ConcatPolicy {
    fn hoists(&self) -> bool {
        matches!(self, ConcatPolicy::All | ConcatPolicy::Given(_))
    }

    fn eligible(&self, token: &Token) -> bool {
        if token.kind != ArgKind::Flag || token.command || token.prefix.is_some() {
            return false;
        }
        if token.concatable == Some(false) {
            return false;
        }
        if token.cluster {
            return true;
        }
        let marked = token.concatable == Some(true);
        match self {
            ConcatPolicy::Concatable => marked,
            ConcatPolicy::Adjacent | ConcatPolicy::All => marked || token.key.chars().count() == 1,
            // The list is authoritative; `concatable: true` does not widen it
            ConcatPolicy::Given(names) => token.names().any(|n| names.iter().any(|g| g == n)),
        }
    }
}

/// Merge eligible flag tokens according to `policy`.
///
/// Non-flag tokens keep their relative order; a cluster sits where its first
/// flag was. Running this on its own output is a no-op.
pub fn concat_flags(tokens: Vec<Token>, policy: &ConcatPolicy) -> Result<Vec<Token>> {
    if policy.hoists() {
        hoist(tokens, policy)
    } else {
        Ok(adjacent(tokens, policy))
    }
}

fn adjacent(tokens: Vec<Token>, policy: &ConcatPolicy) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if policy.eligible(&token) {
            if let Some(prev) = out.last_mut() {
                if policy.eligible(prev) && !bears_value(prev) {
                    merge(prev, token);
                    debug!(cluster = %prev.key, "concatenated adjacent flags");
                    continue;
                }
            }
        }
        out.push(token);
    }
    out
}

fn hoist(tokens: Vec<Token>, policy: &ConcatPolicy) -> Result<Vec<Token>> {
    let eligible: Vec<bool> = tokens.iter().map(|t| policy.eligible(t)).collect();
    if eligible.iter().filter(|e| **e).count() < 2 {
        return Ok(tokens);
    }

    let mut cluster: Option<Token> = None;
    let mut valued: Option<String> = None;
    let mut slot = 0;
    let mut rest = Vec::with_capacity(tokens.len());
    for (token, is_flag) in tokens.into_iter().zip(eligible) {
        if !is_flag {
            rest.push(token);
            continue;
        }
        if let Some(flag) = &valued {
            return Err(Error::InvalidConcatenation(format!(
                "invalid use of `useValue` on concatenated flag `{}`: `{}` cannot follow a flag that takes a value",
                flag, token.name
            )));
        }
        if bears_value(&token) {
            valued = Some(token.name.clone());
        }
        match cluster.as_mut() {
            Some(head) => merge(head, token),
            None => {
                slot = rest.len();
                cluster = Some(token);
            }
        }
    }

    if let Some(cluster) = cluster {
        debug!(cluster = %cluster.key, "hoisted flag cluster");
        rest.insert(slot, cluster);
    }
    Ok(rest)
}

/// Append `next`'s letters to `head`; the value semantics come from `next`.
fn merge(head: &mut Token, next: Token) {
    head.name.push_str(&next.name);
    head.key.push_str(&next.key);
    head.value = next.value;
    head.use_value = next.use_value;
    head.join = next.join;
    head.cluster = true;
}
