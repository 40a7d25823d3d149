//! Resolution of argument definitions against configuration into tokens.

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::path::{self, CommandPath};
use crate::scope::{is_usable, Scope};
use crate::spec::{ArgDef, ArgEntry, ArgKind, CommandNode, Join, OneOrMany, Spec, UseValue};
use crate::template;

/// Cross-argument constraints carried from a definition to its token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rules {
    pub with: Vec<String>,
    pub with_all: Vec<String>,
    pub without: Vec<String>,
    pub when: Vec<String>,
    pub when_all: Vec<String>,
    pub unless: Vec<String>,
    pub choices: Vec<Value>,
}

/// One resolved argument instance, about to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub name: String,
    pub key: String,
    pub kind: ArgKind,
    /// Raw resolved value; stringified by the emitter.
    pub value: Value,
    pub aka: Vec<String>,
    pub prefix: Option<String>,
    pub use_value: Option<UseValue>,
    pub join: Option<Join>,
    pub concatable: Option<bool>,
    /// Synthetic token carrying a command name.
    pub command: bool,
    /// Several flags already merged into one.
    pub cluster: bool,
    pub rules: Rules,
}

impl Token {
    pub fn command(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: name.to_string(),
            kind: ArgKind::Value,
            value: Value::String(name.to_string()),
            aka: Vec::new(),
            prefix: None,
            use_value: None,
            join: None,
            concatable: None,
            command: true,
            cluster: false,
            rules: Rules::default(),
        }
    }

    pub fn from_def(def: &ArgDef, value: Value) -> Self {
        let list = |names: &OneOrMany<String>| names.as_slice().to_vec();
        Self {
            name: def.name.clone(),
            key: def.key().to_string(),
            kind: def.kind.clone(),
            value,
            aka: list(&def.aka),
            prefix: def.prefix.clone(),
            use_value: def.use_value.clone(),
            join: def.join.clone(),
            concatable: def.concatable,
            command: false,
            cluster: false,
            rules: Rules {
                with: list(&def.with),
                with_all: list(&def.with_all),
                without: list(&def.without),
                when: list(&def.when),
                when_all: list(&def.when_all),
                unless: list(&def.unless),
                choices: def
                    .choices
                    .as_ref()
                    .map(|c| c.as_slice().to_vec())
                    .unwrap_or_default(),
            },
        }
    }

    /// `name` followed by every `aka`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aka.iter().map(String::as_str))
    }
}

/// Resolve `spec` against `config` along `path`.
///
/// The first token is always the main command. Parent arguments precede the
/// sub-command name, which precedes the sub-command's own tokens.
pub fn tokenize(
    spec: &Spec,
    config: &Value,
    path: &CommandPath,
    version: Option<&str>,
) -> Result<Vec<Token>> {
    let main = spec.main_name()?;
    let tokenizer = Tokenizer { version };
    let mut tokens = vec![Token::command(main)];
    let mut trail = vec![main.to_string()];
    let root = path::select_version(&spec.root, version)?;
    tokenizer.walk(
        root,
        path.segments(),
        Scope::root(config),
        &mut trail,
        &mut tokens,
    )?;
    debug!(count = tokens.len(), path = %path, "tokenized");
    Ok(tokens)
}

struct Tokenizer<'v> {
    version: Option<&'v str>,
}

impl Tokenizer<'_> {
    fn walk(
        &self,
        node: &CommandNode,
        path: &[String],
        mut scope: Scope,
        trail: &mut Vec<String>,
        tokens: &mut Vec<Token>,
    ) -> Result<()> {
        let mut descended = false;
        for entry in &node.args {
            match entry {
                ArgEntry::Name(name) => {
                    self.resolve_arg(&ArgDef::named(name.as_str()), &mut scope, trail, tokens)?;
                }
                ArgEntry::Arg(def) => self.resolve_arg(def, &mut scope, trail, tokens)?,
                ArgEntry::Command(cmd) => {
                    let name = cmd.name()?;
                    if !descended && path.first().is_some_and(|head| head == name) {
                        descended = true;
                        self.descend(name, &cmd.node, path, &scope, trail, tokens)?;
                    }
                }
            }
        }

        if !descended {
            if let Some(head) = path.first() {
                let child = node.commands.get(head).ok_or_else(|| {
                    Error::command_not_found(format!("`{}` in `{}`", head, trail.join(".")))
                })?;
                self.descend(head, child, path, &scope, trail, tokens)?;
            }
        }
        Ok(())
    }

    fn descend(
        &self,
        name: &str,
        node: &CommandNode,
        path: &[String],
        scope: &Scope,
        trail: &mut Vec<String>,
        tokens: &mut Vec<Token>,
    ) -> Result<()> {
        trace!(command = name, "descending");
        tokens.push(Token::command(name));
        trail.push(name.to_string());
        let node = path::select_version(node, self.version)?;
        self.walk(node, &path[1..], scope.child(name), trail, tokens)?;
        trail.pop();
        Ok(())
    }

    fn resolve_arg(
        &self,
        def: &ArgDef,
        scope: &mut Scope,
        trail: &[String],
        tokens: &mut Vec<Token>,
    ) -> Result<()> {
        if def.kind == ArgKind::Collection {
            debug!(collection = %def.name, "skipping unexpanded collection reference");
            return Ok(());
        }

        check_aliases(def, scope)?;

        if def.required && scope.usable(def.names()).is_none() {
            return Err(Error::MissingRequiredConfig(format!(
                "{}.{}",
                trail.join("."),
                def.name
            )));
        }

        // A value given under any `aka` shadows the default
        if let Some(default) = &def.default {
            if scope.usable(def.names()).is_none() {
                scope.apply_default(&def.name, default);
            }
        }

        let supplied = scope.usable(def.names()).map(|(_, v)| v.clone());
        if supplied.is_none() && def.kind != ArgKind::Variable {
            return Ok(());
        }

        let value = match &def.value {
            Some(literal) => template::resolve(literal, &scope.template_context())?,
            None => supplied.unwrap_or(Value::Null),
        };

        if def.kind == ArgKind::Variable {
            if !value.is_null() {
                trace!(variable = %def.name, "declared");
                scope.declare(&def.name, value);
            }
            return Ok(());
        }

        tokens.push(Token::from_def(def, value));
        Ok(())
    }
}

/// Config may name an argument by `name` or any `aka`, but only once.
fn check_aliases(def: &ArgDef, scope: &Scope) -> Result<()> {
    if def.aka.is_empty() {
        return Ok(());
    }
    let mut found: Option<(&str, &Value)> = None;
    for name in def.names() {
        let Some(value) = scope.get(name).filter(|v| is_usable(v)) else {
            continue;
        };
        match found {
            Some((first, first_value)) if first_value != value => {
                return Err(Error::MutualExclusionViolation(format!(
                    "the {} `{}` was given as both `{}` and `{}`",
                    def.kind, def.name, first, name
                )));
            }
            Some(_) => {}
            None => found = Some((name, value)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aws() -> Spec {
        Spec::from_json(json!({
            "main": "aws",
            "args": [
                {"name": "debug", "type": "option"},
                {"name": "endpoint-url", "type": "option"}
            ],
            "commands": {
                "s3": {
                    "commands": {
                        "cp": {"args": ["src", "dest"]}
                    }
                }
            }
        }))
        .unwrap()
    }

    fn names(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_tokenize_nested_path_order() {
        let config = json!({"debug": true, "s3": {"cp": {"src": "./foo", "dest": "./bar"}}});
        let tokens = tokenize(&aws(), &config, &CommandPath::parse("s3.cp"), None).unwrap();
        assert_eq!(names(&tokens), vec!["aws", "debug", "s3", "cp", "src", "dest"]);
        assert!(tokens[0].command && tokens[2].command && tokens[3].command);
        assert_eq!(tokens[1].value, json!(true));
        assert_eq!(tokens[4].kind, ArgKind::Option);
    }

    #[test]
    fn test_tokenize_skips_unusable_values() {
        let config = json!({"debug": false, "endpoint-url": ""});
        let tokens = tokenize(&aws(), &config, &CommandPath::default(), None).unwrap();
        assert_eq!(names(&tokens), vec!["aws"]);
    }

    #[test]
    fn test_tokenize_unknown_command() {
        let err = tokenize(&aws(), &json!({}), &CommandPath::parse("s3.mv"), None).unwrap_err();
        assert!(matches!(err, Error::CommandNotFound(ref m) if m.contains("`mv`")));
    }

    #[test]
    fn test_tokenize_inline_command_in_place() {
        let spec = Spec::from_json(json!({
            "main": "git",
            "args": [
                "verbose",
                {"command": "commit", "args": [{"name": "message", "key": "m", "type": "flag", "useValue": true}]},
                {"name": "after", "type": "flag"}
            ]
        }))
        .unwrap();
        let config = json!({"verbose": true, "after": true, "commit": {"message": "hi"}});
        let tokens = tokenize(&spec, &config, &CommandPath::parse("commit"), None).unwrap();
        assert_eq!(names(&tokens), vec!["git", "verbose", "commit", "message", "after"]);
    }

    #[test]
    fn test_tokenize_required_missing() {
        let spec = Spec::from_json(json!({
            "main": "aws",
            "commands": {"s3": {"args": [{"name": "bucket", "required": true}]}}
        }))
        .unwrap();
        let err = tokenize(&spec, &json!({"s3": {}}), &CommandPath::parse("s3"), None).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredConfig(ref m) if m == "aws.s3.bucket"));
    }

    #[test]
    fn test_tokenize_required_satisfied_by_aka() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "args": [{"name": "verbose", "aka": "v", "type": "flag", "required": true}]
        }))
        .unwrap();
        let tokens = tokenize(&spec, &json!({"v": true}), &CommandPath::default(), None).unwrap();
        assert_eq!(names(&tokens), vec!["tool", "verbose"]);
    }

    #[test]
    fn test_tokenize_aka_conflict() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "args": [{"name": "output", "aka": ["o", "out"]}]
        }))
        .unwrap();
        let err = tokenize(&spec, &json!({"o": "a", "out": "b"}), &CommandPath::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::MutualExclusionViolation(ref m) if m.contains("`o`") && m.contains("`out`")));
        assert!(tokenize(&spec, &json!({"o": "a", "out": "a"}), &CommandPath::default(), None).is_ok());
    }

    #[test]
    fn test_tokenize_default_applied() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "args": [{"name": "level", "default": 3}]
        }))
        .unwrap();
        let tokens = tokenize(&spec, &json!({}), &CommandPath::default(), None).unwrap();
        assert_eq!(tokens[1].value, json!(3));
    }

    #[test]
    fn test_tokenize_default_yields_to_aka_value() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "args": [{"name": "output", "aka": "o", "default": "a.txt"}]
        }))
        .unwrap();
        let tokens = tokenize(&spec, &json!({"o": "b.txt"}), &CommandPath::default(), None).unwrap();
        assert_eq!(names(&tokens), vec!["tool", "output"]);
        assert_eq!(tokens[1].value, json!("b.txt"));

        let tokens = tokenize(&spec, &json!({}), &CommandPath::default(), None).unwrap();
        assert_eq!(tokens[1].value, json!("a.txt"));
    }

    #[test]
    fn test_tokenize_template_value() {
        let spec = Spec::from_json(json!({
            "main": "greet",
            "args": [
                {"name": "full", "type": "option", "value": "${first_name} ${last_name}"}
            ]
        }))
        .unwrap();
        let config = json!({"first-name": "Jane", "last-name": "Doe", "full": true});
        let tokens = tokenize(&spec, &config, &CommandPath::default(), None).unwrap();
        assert_eq!(tokens[1].value, json!("Jane Doe"));
    }

    #[test]
    fn test_tokenize_variables_thread_to_siblings_and_children() {
        let spec = Spec::from_json(json!({
            "main": "deploy",
            "args": [
                {"name": "target", "type": "variable", "value": "${env}-${region}"},
                {"name": "stack", "type": "option", "value": "stack-${target}"}
            ],
            "commands": {
                "push": {"args": [{"name": "tag", "value": "${target}:latest"}]}
            }
        }))
        .unwrap();
        let config = json!({"env": "prod", "region": "eu", "stack": true, "push": {"tag": true}});
        let tokens = tokenize(&spec, &config, &CommandPath::parse("push"), None).unwrap();
        assert_eq!(names(&tokens), vec!["deploy", "stack", "push", "tag"]);
        assert_eq!(tokens[1].value, json!("stack-prod-eu"));
        assert_eq!(tokens[3].value, json!("prod-eu:latest"));
    }

    #[test]
    fn test_tokenize_does_not_mutate_caller_config() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "args": [{"name": "v", "type": "variable", "value": "x"}, {"name": "d", "default": 1}]
        }))
        .unwrap();
        let config = json!({});
        tokenize(&spec, &config, &CommandPath::default(), None).unwrap();
        assert_eq!(config, json!({}));
    }

    #[test]
    fn test_tokenize_versioned_root() {
        let spec = Spec::from_json(json!({
            "main": "tool",
            "versions": {
                "1": {"args": ["legacy"]},
                "2": {"args": ["modern"]},
                "default": "2"
            }
        }))
        .unwrap();
        let config = json!({"legacy": "a", "modern": "b"});
        let v1 = tokenize(&spec, &config, &CommandPath::default(), Some("1")).unwrap();
        let v2 = tokenize(&spec, &config, &CommandPath::default(), None).unwrap();
        assert_eq!(names(&v1), vec!["tool", "legacy"]);
        assert_eq!(names(&v2), vec!["tool", "modern"]);
    }
}
