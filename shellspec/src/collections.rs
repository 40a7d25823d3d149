//! Expansion of named argument collections into their points of use.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::spec::{ArgEntry, ArgKind, CommandNode, InlineCommand, Spec, VersionEntry};

type Registry<'a> = IndexMap<&'a str, &'a [ArgEntry]>;

/// Replace every `{type: collection, name}` argument with the contents of the
/// collection registered under `name`, recursively.
///
/// Collections may be declared on any command node and may reference other
/// collections. A reference to an unknown collection is dropped. The
/// returned tree no longer declares any collections.
pub fn expand_collections(spec: &Spec) -> Result<Spec> {
    let mut registry: Registry<'_> = IndexMap::new();
    gather(&spec.root, &mut registry)?;
    debug!(count = registry.len(), "gathered collections");

    let mut expanded = spec.clone();
    let mut stack = Vec::new();
    expanded.root = expand_node(&spec.root, &registry, &mut stack)?;
    Ok(expanded)
}

fn gather<'a>(node: &'a CommandNode, registry: &mut Registry<'a>) -> Result<()> {
    for (name, args) in &node.collections {
        if registry.insert(name.as_str(), args.as_slice()).is_some() {
            return Err(Error::invalid_spec(format!(
                "collection `{}` is declared more than once",
                name
            )));
        }
        gather_args(args, registry)?;
    }
    gather_args(&node.args, registry)?;
    for child in node.commands.values() {
        gather(child, registry)?;
    }
    for entry in node.versions.values() {
        if let VersionEntry::Command(child) = entry {
            gather(child, registry)?;
        }
    }
    Ok(())
}

fn gather_args<'a>(args: &'a [ArgEntry], registry: &mut Registry<'a>) -> Result<()> {
    for entry in args {
        if let ArgEntry::Command(cmd) = entry {
            gather(&cmd.node, registry)?;
        }
    }
    Ok(())
}

fn expand_node<'a>(
    node: &'a CommandNode,
    registry: &Registry<'a>,
    stack: &mut Vec<&'a str>,
) -> Result<CommandNode> {
    let mut out = node.clone();
    // Declarations may be copied in with their collection's members
    out.collections.clear();
    out.args = expand_args(&node.args, registry, stack)?;
    for (name, child) in &node.commands {
        out.commands.insert(name.clone(), expand_node(child, registry, stack)?);
    }
    for (name, entry) in &node.versions {
        if let VersionEntry::Command(child) = entry {
            out.versions.insert(
                name.clone(),
                VersionEntry::Command(expand_node(child, registry, stack)?),
            );
        }
    }
    Ok(out)
}

fn expand_args<'a>(
    args: &'a [ArgEntry],
    registry: &Registry<'a>,
    stack: &mut Vec<&'a str>,
) -> Result<Vec<ArgEntry>> {
    let mut out = Vec::with_capacity(args.len());
    for entry in args {
        match entry {
            ArgEntry::Arg(def) if def.kind == ArgKind::Collection => {
                let Some((&name, &members)) = registry.get_key_value(def.name.as_str()) else {
                    debug!(collection = %def.name, "dropping reference to unknown collection");
                    continue;
                };
                if stack.contains(&name) {
                    return Err(Error::invalid_spec(format!(
                        "collection `{}` references itself",
                        name
                    )));
                }
                trace!(collection = name, size = members.len(), "expanding collection");
                stack.push(name);
                let expanded = expand_args(members, registry, stack);
                stack.pop();
                out.extend(expanded?);
            }
            ArgEntry::Command(cmd) => {
                let node = expand_node(&cmd.node, registry, stack)?;
                out.push(ArgEntry::Command(InlineCommand {
                    command: cmd.command.clone(),
                    node,
                }));
            }
            other => out.push(other.clone()),
        }
    }
    Ok(out)
}
