//! Prompt descriptors for required-but-missing values, and merging of the
//! answers back into configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::emit::scalar_to_string;
use crate::error::{Error, Result};
use crate::path::{self, CommandPath};
use crate::scope::Scope;
use crate::spec::{ArgDef, ArgEntry, ArgKind, Spec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Input,
    List,
}

/// One question for an interactive front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    /// Dotted path (`main.command.arg`), also the answer's location.
    pub name: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: PromptKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

/// Interactive collaborator that turns descriptors into an answers object
/// nested by each descriptor's dotted name.
pub trait Prompter {
    fn prompt(&mut self, prompts: &[PromptDescriptor]) -> Result<Value>;
}

/// Which side wins when prompted answers and configuration collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    AnswersWin,
    ConfigWins,
}

impl std::str::FromStr for MergePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "answers" | "answers-win" => Ok(MergePolicy::AnswersWin),
            "config" | "config-wins" => Ok(MergePolicy::ConfigWins),
            other => Err(Error::Parse(format!("unknown merge policy `{}`", other))),
        }
    }
}

/// A descriptor for every `required` argument along `path` that `config`
/// does not supply under its name or any `aka`.
pub fn derive_prompts(
    spec: &Spec,
    config: &Value,
    path: &CommandPath,
    version: Option<&str>,
) -> Result<Vec<PromptDescriptor>> {
    let main = spec.main_name()?;
    let nodes = path::resolve(spec, path, version)?;
    let mut scope = Scope::root(config);
    let mut trail = vec![main.to_string()];
    let mut prompts = Vec::new();

    for (depth, node) in nodes.iter().enumerate() {
        for entry in &node.args {
            let named;
            let def = match entry {
                ArgEntry::Name(name) => {
                    named = ArgDef::named(name.as_str());
                    &named
                }
                ArgEntry::Arg(def) => def,
                ArgEntry::Command(_) => continue,
            };
            if !def.required || matches!(def.kind, ArgKind::Collection | ArgKind::Variable) {
                continue;
            }
            if scope.usable(def.names()).is_none() {
                prompts.push(describe(def, &trail));
            }
        }
        if let Some(segment) = path.segments().get(depth) {
            scope = scope.child(segment);
            trail.push(segment.clone());
        }
    }
    debug!(count = prompts.len(), path = %path, "derived prompts");
    Ok(prompts)
}

fn describe(def: &ArgDef, trail: &[String]) -> PromptDescriptor {
    let name = format!("{}.{}", trail.join("."), def.name);
    let choices: Option<Vec<String>> = def
        .choices
        .as_ref()
        .filter(|c| !c.is_empty())
        .map(|c| c.as_slice().iter().map(scalar_to_string).collect());
    PromptDescriptor {
        message: def.message.clone().unwrap_or_else(|| name.clone()),
        kind: if choices.is_some() {
            PromptKind::List
        } else {
            PromptKind::Input
        },
        choices,
        name,
    }
}

/// Fold prompted answers (nested under the main command name) into `config`.
pub fn merge_answers(config: &Value, answers: &Value, main: &str, policy: MergePolicy) -> Value {
    let answered = answers.get(main).cloned().unwrap_or(Value::Null);
    match policy {
        MergePolicy::AnswersWin => deep_merge(config.clone(), answered),
        MergePolicy::ConfigWins => deep_merge(answered, config.clone()),
    }
}

/// Merge `overlay` onto `base`; objects merge key by key, anything else in
/// `overlay` replaces `base` unless it is `null`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                let merged = match base.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base.insert(k, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Write `value` at a dotted path, creating (or replacing non-object)
/// intermediate levels.
pub fn set_path(target: &mut Value, dotted: &str, value: Value) {
    let mut current = target;
    let mut segments = dotted.split('.').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aws() -> Spec {
        Spec::from_json(json!({
            "main": "aws",
            "args": [{"name": "profile", "required": true, "message": "Which profile?"}],
            "commands": {
                "s3": {
                    "commands": {
                        "cp": {"args": [
                            {"name": "src", "required": true},
                            {"name": "dest", "required": true, "aka": "d"},
                            {"name": "acl", "required": true, "choices": ["private", "public-read"]},
                            {"name": "quiet", "type": "flag"}
                        ]}
                    }
                }
            }
        }))
        .unwrap()
    }

    // ==================== derive_prompts tests ====================

    #[test]
    fn test_prompts_for_missing_required_along_path() {
        let config = json!({"s3": {"cp": {"src": "./foo", "d": "./bar"}}});
        let prompts = derive_prompts(&aws(), &config, &CommandPath::parse("s3.cp"), None).unwrap();
        let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["aws.profile", "aws.s3.cp.acl"]);
        assert_eq!(prompts[0].message, "Which profile?");
        assert_eq!(prompts[0].kind, PromptKind::Input);
        assert_eq!(prompts[1].message, "aws.s3.cp.acl");
        assert_eq!(prompts[1].kind, PromptKind::List);
        assert_eq!(
            prompts[1].choices,
            Some(vec!["private".to_string(), "public-read".to_string()])
        );
    }

    #[test]
    fn test_no_prompts_when_satisfied() {
        let config = json!({"profile": "dev"});
        assert!(derive_prompts(&aws(), &config, &CommandPath::default(), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_prompt_serializes_type_field() {
        let prompts = derive_prompts(
            &aws(),
            &json!({"profile": "x"}),
            &CommandPath::parse("s3.cp"),
            None,
        )
        .unwrap();
        let value = serde_json::to_value(&prompts[0]).unwrap();
        assert_eq!(value, json!({"name": "aws.s3.cp.src", "message": "aws.s3.cp.src", "type": "input"}));
    }

    // ==================== merge tests ====================

    #[test]
    fn test_merge_answers_policies() {
        let config = json!({"profile": "dev", "s3": {"cp": {"src": "a"}}});
        let answers = json!({"aws": {"profile": "prod", "s3": {"cp": {"dest": "b"}}}});

        let merged = merge_answers(&config, &answers, "aws", MergePolicy::AnswersWin);
        assert_eq!(merged, json!({"profile": "prod", "s3": {"cp": {"src": "a", "dest": "b"}}}));

        let merged = merge_answers(&config, &answers, "aws", MergePolicy::ConfigWins);
        assert_eq!(merged["profile"], json!("dev"));
        assert_eq!(merged["s3"]["cp"]["dest"], json!("b"));
    }

    #[test]
    fn test_merge_ignores_foreign_roots() {
        let merged = merge_answers(&json!({"a": 1}), &json!({"other": {"a": 2}}), "aws", MergePolicy::AnswersWin);
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn test_merge_policy_from_str() {
        assert_eq!("config".parse::<MergePolicy>().unwrap(), MergePolicy::ConfigWins);
        assert_eq!("answers-win".parse::<MergePolicy>().unwrap(), MergePolicy::AnswersWin);
        assert!("nope".parse::<MergePolicy>().is_err());
    }

    // ==================== set_path tests ====================

    #[test]
    fn test_set_path_creates_levels() {
        let mut v = Value::Null;
        set_path(&mut v, "aws.s3.cp.src", json!("./foo"));
        set_path(&mut v, "aws.debug", json!(true));
        assert_eq!(v, json!({"aws": {"s3": {"cp": {"src": "./foo"}}, "debug": true}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_level() {
        let mut v = json!({"a": 1});
        set_path(&mut v, "a.b", json!(2));
        assert_eq!(v, json!({"a": {"b": 2}}));
    }
}
