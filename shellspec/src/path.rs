//! Command path and version resolution.

use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::spec::{ArgEntry, ArgKind, CommandNode, Spec, VersionEntry, DEFAULT_VERSION};

/// Ordered command path segments below the main command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPath(Vec<String>);

impl CommandPath {
    /// Split a dotted path; the empty string is the main command itself.
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for CommandPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<&String> for CommandPath {
    fn from(dotted: &String) -> Self {
        Self::parse(dotted)
    }
}

impl From<Vec<String>> for CommandPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for CommandPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Pick the active subtree of a possibly versioned node.
///
/// Aliases are followed until a concrete subtree is reached. An unknown
/// selector falls back to `default`; a `default` that is not declared means
/// the node's own args and commands.
pub fn select_version<'a>(node: &'a CommandNode, selector: Option<&str>) -> Result<&'a CommandNode> {
    if node.versions.is_empty() {
        return Ok(node);
    }
    let mut key = selector.unwrap_or(DEFAULT_VERSION).to_string();
    let mut seen: Vec<String> = Vec::new();
    loop {
        if seen.contains(&key) {
            return Err(Error::invalid_spec(format!(
                "version alias cycle through `{}`",
                key
            )));
        }
        seen.push(key.clone());
        match node.versions.get(&key) {
            Some(VersionEntry::Command(child)) => {
                trace!(version = %key, "selected version");
                return Ok(child);
            }
            Some(VersionEntry::Alias(target)) => key = target.clone(),
            None if key == DEFAULT_VERSION => return Ok(node),
            None if node.versions.contains_key(DEFAULT_VERSION) => {
                key = DEFAULT_VERSION.to_string();
            }
            None => {
                return Err(Error::command_not_found(format!("version `{}`", key)));
            }
        }
    }
}

/// A sub-command reachable from a node, declared inline or in `commands`.
#[derive(Debug, Clone, Copy)]
pub struct ChildCommand<'a> {
    pub name: &'a str,
    pub node: &'a CommandNode,
}

/// Find the child command called `name`, inline entries first.
pub fn find_child<'a>(node: &'a CommandNode, name: &str) -> Result<Option<ChildCommand<'a>>> {
    for entry in &node.args {
        if let ArgEntry::Command(cmd) = entry {
            let cmd_name = cmd.name()?;
            if cmd_name == name {
                return Ok(Some(ChildCommand {
                    name: cmd_name,
                    node: &cmd.node,
                }));
            }
        }
    }
    Ok(node
        .commands
        .get_key_value(name)
        .map(|(k, v)| ChildCommand { name: k, node: v }))
}

/// Every child command of a node in declaration order.
pub fn children(node: &CommandNode) -> Result<Vec<ChildCommand<'_>>> {
    let mut out = Vec::new();
    for entry in &node.args {
        if let ArgEntry::Command(cmd) = entry {
            out.push(ChildCommand {
                name: cmd.name()?,
                node: &cmd.node,
            });
        }
    }
    out.extend(
        node.commands
            .iter()
            .map(|(k, v)| ChildCommand { name: k, node: v }),
    );
    Ok(out)
}

/// The version-resolved nodes along `path`, root first.
pub fn resolve<'a>(
    spec: &'a Spec,
    path: &CommandPath,
    selector: Option<&str>,
) -> Result<Vec<&'a CommandNode>> {
    let mut node = select_version(&spec.root, selector)?;
    let mut trail = vec![node];
    for segment in path.segments() {
        let child = find_child(node, segment)?
            .ok_or_else(|| Error::command_not_found(format!("`{}` in `{}`", segment, path)))?;
        node = select_version(child.node, selector)?;
        trail.push(node);
    }
    Ok(trail)
}

/// Every dotted configuration path `spec` can consume.
///
/// With a command path, only the arguments along that path are listed;
/// otherwise the whole tree is walked.
pub fn config_paths(
    spec: &Spec,
    path: Option<&CommandPath>,
    selector: Option<&str>,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    match path {
        Some(path) => {
            let nodes = resolve(spec, path, selector)?;
            let mut prefix: Vec<&str> = Vec::new();
            for (i, node) in nodes.iter().enumerate() {
                push_arg_paths(node, &prefix, &mut out);
                if let Some(seg) = path.segments().get(i) {
                    prefix.push(seg);
                }
            }
        }
        None => {
            let root = select_version(&spec.root, selector)?;
            walk_paths(root, &mut Vec::new(), selector, &mut out)?;
        }
    }
    Ok(out)
}

fn walk_paths<'a>(
    node: &'a CommandNode,
    prefix: &mut Vec<&'a str>,
    selector: Option<&str>,
    out: &mut Vec<String>,
) -> Result<()> {
    push_arg_paths(node, prefix, out);
    for child in children(node)? {
        prefix.push(child.name);
        walk_paths(select_version(child.node, selector)?, prefix, selector, out)?;
        prefix.pop();
    }
    Ok(())
}

fn push_arg_paths(node: &CommandNode, prefix: &[&str], out: &mut Vec<String>) {
    let mut push = |name: &str| {
        let full = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix.join("."), name)
        };
        if !out.contains(&full) {
            out.push(full);
        }
    };
    for entry in &node.args {
        match entry {
            ArgEntry::Name(name) => push(name),
            ArgEntry::Arg(def) if def.kind != ArgKind::Collection => {
                for name in def.names() {
                    push(name);
                }
            }
            _ => {}
        }
    }
}
