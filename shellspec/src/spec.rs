//! Specification data model and document loading.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Name of the version entry used when no selector is given.
pub const DEFAULT_VERSION: &str = "default";

// =====================
// Document envelope
// =====================

/// A specification together with its optional envelope fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    /// Base configuration merged beneath every caller-supplied config.
    #[serde(default)]
    pub config: Value,
    pub spec: Spec,
}

impl From<Spec> for Definition {
    fn from(spec: Spec) -> Self {
        Self {
            kind: None,
            version: None,
            label: None,
            alias: None,
            config: Value::Null,
            spec,
        }
    }
}

/// Root of a command specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spec {
    /// Executable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Legacy spelling of `main`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
    #[serde(default, rename = "concatFlags")]
    pub concat_flags: ConcatFlags,
    #[serde(flatten)]
    pub root: CommandNode,
}

/// A command (or the root) with its arguments and nested commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub collections: IndexMap<String, Vec<ArgEntry>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub versions: IndexMap<String, VersionEntry>,
    #[serde(default, deserialize_with = "nullable_args")]
    pub args: Vec<ArgEntry>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub commands: IndexMap<String, CommandNode>,
}

/// Entry of a `versions` map: a concrete subtree or an alias to another entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionEntry {
    Alias(String),
    Command(CommandNode),
}

/// One element of an `args` list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ArgEntry {
    /// `"foo"` shorthand for `{ name: "foo" }`.
    Name(String),
    /// `{ command: "s3", args: [...] }`, matched against the next path segment.
    Command(InlineCommand),
    Arg(ArgDef),
}

impl<'de> serde::Deserialize<'de> for ArgEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;

        match value {
            serde_yaml::Value::String(name) => Ok(ArgEntry::Name(name)),
            serde_yaml::Value::Mapping(ref map) => {
                let has_command = map.iter().any(|(k, _)| {
                    if let serde_yaml::Value::String(s) = k {
                        s == "command"
                    } else {
                        false
                    }
                });
                if has_command {
                    let cmd: InlineCommand =
                        serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
                    return Ok(ArgEntry::Command(cmd));
                }
                let arg: ArgDef = serde_yaml::from_value(value).map_err(serde::de::Error::custom)?;
                Ok(ArgEntry::Arg(arg))
            }
            serde_yaml::Value::Null => Err(serde::de::Error::custom("invalid arguments: null entry")),
            _ => Err(serde::de::Error::custom(
                "invalid arguments: expected a name or an argument definition",
            )),
        }
    }
}

fn nullable_args<'de, D>(deserializer: D) -> std::result::Result<Vec<ArgEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ArgEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Command declared inline among its parent's arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineCommand {
    pub command: Value,
    #[serde(flatten)]
    pub node: CommandNode,
}

impl InlineCommand {
    pub fn name(&self) -> Result<&str> {
        match &self.command {
            Value::String(s) if !s.is_empty() => Ok(s),
            _ => Err(Error::invalid_spec("command must be a string")),
        }
    }
}

// =====================
// Argument definitions
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgKind {
    /// `--name value`
    #[default]
    Option,
    /// `-name`, value only on request
    Flag,
    Value,
    Values,
    /// Written into config for templates, never emitted.
    Variable,
    /// Expansion marker for a named collection.
    Collection,
    /// Literal `--` followed by the value(s).
    DoubleDash,
    /// Unrecognized `type`; loads, but fails once it reaches the emitter.
    Unknown(String),
}

impl ArgKind {
    pub fn as_str(&self) -> &str {
        match self {
            ArgKind::Option => "option",
            ArgKind::Flag => "flag",
            ArgKind::Value => "value",
            ArgKind::Values => "values",
            ArgKind::Variable => "variable",
            ArgKind::Collection => "collection",
            ArgKind::DoubleDash => "--",
            ArgKind::Unknown(other) => other,
        }
    }
}

impl From<&str> for ArgKind {
    fn from(s: &str) -> Self {
        match s {
            "option" => ArgKind::Option,
            "flag" => ArgKind::Flag,
            "value" => ArgKind::Value,
            "values" => ArgKind::Values,
            "variable" => ArgKind::Variable,
            "collection" => ArgKind::Collection,
            "--" => ArgKind::DoubleDash,
            other => ArgKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ArgKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ArgKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ArgKind::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgDef {
    pub name: String,
    /// Display name override, defaults to `name`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub aka: OneOrMany<String>,
    #[serde(default, rename = "type")]
    pub kind: ArgKind,
    /// Literal or `${...}` template.
    #[serde(default, alias = "template")]
    pub value: Option<Value>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Option<OneOrMany<Value>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub with: OneOrMany<String>,
    #[serde(default)]
    pub with_all: OneOrMany<String>,
    #[serde(default)]
    pub without: OneOrMany<String>,
    #[serde(default)]
    pub when: OneOrMany<String>,
    #[serde(default)]
    pub when_all: OneOrMany<String>,
    #[serde(default)]
    pub unless: OneOrMany<String>,
    #[serde(default)]
    pub use_value: Option<UseValue>,
    #[serde(default)]
    pub join: Option<Join>,
    #[serde(default)]
    pub concatable: Option<bool>,
    /// Overrides the `--` / `-` prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Prompt text when required and missing.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ArgDef {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    /// `name` followed by every `aka`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aka.as_slice().iter().map(String::as_str))
    }
}

/// A scalar or a list of scalars, as accepted by most list-valued fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    // Tried first so that a list of `Value`s is not taken as one array value
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

impl ValueType {
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::String, Value::String(_))
                | (ValueType::Number, Value::Number(_))
                | (ValueType::Boolean, Value::Bool(_))
        )
    }
}

/// Whether the value is emitted alongside an option/flag name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UseValue {
    Always(bool),
    /// Only when the supplied value has one of these primitive types.
    Types(OneOrMany<ValueType>),
}

impl UseValue {
    pub fn attaches(&self, value: &Value) -> bool {
        match self {
            UseValue::Always(b) => *b,
            UseValue::Types(types) => types.as_slice().iter().any(|t| t.matches(value)),
        }
    }
}

/// Glue name and value into a single element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Join {
    Enabled(bool),
    Delimiter(String),
}

impl Join {
    pub fn delimiter(&self) -> Option<&str> {
        match self {
            Join::Enabled(true) => Some("="),
            Join::Enabled(false) => None,
            Join::Delimiter(d) => Some(d),
        }
    }
}

/// Raw `concatFlags` switch: `true`, `false`, `"adjacent"`, `"all"` or a list of flag names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConcatFlags {
    Enabled(bool),
    Mode(String),
    Given(Vec<String>),
}

impl Default for ConcatFlags {
    fn default() -> Self {
        ConcatFlags::Enabled(false)
    }
}

// =====================
// Loading
// =====================

impl Spec {
    /// Executable name from `main`, or the legacy root `command`.
    pub fn main_name(&self) -> Result<&str> {
        if let Some(main) = self.main.as_deref().filter(|m| !m.is_empty()) {
            return Ok(main);
        }
        match &self.command {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(_) => Err(Error::invalid_spec("command must be a string")),
            None => Err(Error::invalid_spec("missing main command definition")),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Structural checks a schema validator would perform.
    pub fn validate(&self) -> Result<()> {
        self.main_name()?;
        if let ConcatFlags::Mode(mode) = &self.concat_flags {
            if mode != "adjacent" && mode != "all" {
                return Err(Error::invalid_spec(format!(
                    "concatFlags must be a boolean, \"adjacent\", \"all\" or a list of flags, got \"{}\"",
                    mode
                )));
            }
        }
        validate_node(&self.root)
    }
}

fn validate_node(node: &CommandNode) -> Result<()> {
    validate_args(&node.args)?;
    for args in node.collections.values() {
        validate_args(args)?;
    }
    for (name, child) in &node.commands {
        if name.is_empty() {
            return Err(Error::invalid_spec("command names must not be empty"));
        }
        validate_node(child)?;
    }
    for (name, entry) in &node.versions {
        match entry {
            VersionEntry::Alias(target) => {
                if target != DEFAULT_VERSION && !node.versions.contains_key(target) {
                    return Err(Error::invalid_spec(format!(
                        "version `{}` aliases unknown version `{}`",
                        name, target
                    )));
                }
            }
            VersionEntry::Command(child) => validate_node(child)?,
        }
    }
    Ok(())
}

fn validate_args(args: &[ArgEntry]) -> Result<()> {
    for entry in args {
        match entry {
            ArgEntry::Name(name) if name.is_empty() => {
                return Err(Error::invalid_spec("argument names must not be empty"));
            }
            ArgEntry::Name(_) => {}
            ArgEntry::Arg(def) => {
                if def.name.is_empty() {
                    return Err(Error::invalid_spec("argument names must not be empty"));
                }
            }
            ArgEntry::Command(cmd) => {
                cmd.name()?;
                validate_node(&cmd.node)?;
            }
        }
    }
    Ok(())
}

/// Load a specification document from YAML or JSON.
///
/// Accepts either a bare specification or a definition envelope with a
/// top-level `spec` key.
pub fn parse_definition(text: &str) -> Result<Definition> {
    let val: serde_yaml::Value = serde_yaml::from_str(text)?;
    if val.get("spec").is_some() {
        let def: Definition = serde_yaml::from_value(val)?;
        Ok(def)
    } else {
        let spec: Spec = serde_yaml::from_value(val)?;
        Ok(Definition::from(spec))
    }
}
