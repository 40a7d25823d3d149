//! Configuration scopes for one resolution pass.
//!
//! A scope owns a copy of its command's config object. Values written by
//! `variable` arguments are recorded separately and handed down to child
//! scopes, so the caller's configuration is never mutated.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: Map<String, Value>,
    inherited: Map<String, Value>,
    declared: Map<String, Value>,
}

impl Scope {
    pub fn root(config: &Value) -> Self {
        Self {
            values: config.as_object().cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Scope for the sub-command `name`: its nested config object plus every
    /// variable visible here.
    pub fn child(&self, name: &str) -> Self {
        let values = self
            .values
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut inherited = self.inherited.clone();
        for (k, v) in &self.declared {
            inherited.insert(k.clone(), v.clone());
        }
        Self {
            values,
            inherited,
            declared: Map::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.declared
            .get(name)
            .or_else(|| self.values.get(name))
            .or_else(|| self.inherited.get(name))
    }

    /// The first usable value under any of `names`, with the name it was found under.
    pub fn usable<'a, I>(&self, names: I) -> Option<(&'a str, &Value)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .find_map(|n| self.get(n).filter(|v| is_usable(v)).map(|v| (n, v)))
    }

    /// Set `name` unless config already holds a non-null value for it.
    pub fn apply_default(&mut self, name: &str, default: &Value) {
        if self.get(name).map_or(true, Value::is_null) {
            self.values.insert(name.to_string(), default.clone());
        }
    }

    /// Record a `variable` value for later siblings and descendants.
    pub fn declare(&mut self, name: &str, value: Value) {
        self.declared.insert(name.to_string(), value);
    }

    /// Flattened view used for template expansion; local values win.
    pub fn template_context(&self) -> Map<String, Value> {
        let mut ctx = self.inherited.clone();
        for (k, v) in self.values.iter().chain(self.declared.iter()) {
            ctx.insert(k.clone(), v.clone());
        }
        ctx
    }
}

/// Whether a config value should trigger emission of its argument.
///
/// `null`, `false`, `""` and `[]` are treated as absent; `0` is a value.
pub fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_usable() {
        assert!(!is_usable(&json!(null)));
        assert!(!is_usable(&json!(false)));
        assert!(!is_usable(&json!("")));
        assert!(!is_usable(&json!([])));
        assert!(is_usable(&json!(0)));
        assert!(is_usable(&json!(true)));
        assert!(is_usable(&json!("x")));
        assert!(is_usable(&json!({})));
    }

    #[test]
    fn test_root_scope_from_non_object() {
        let scope = Scope::root(&json!(null));
        assert!(scope.get("anything").is_none());
    }

    #[test]
    fn test_child_scope_nested_config() {
        let scope = Scope::root(&json!({"debug": true, "s3": {"cp": {"src": "./foo"}}}));
        let s3 = scope.child("s3");
        assert!(s3.get("debug").is_none());
        let cp = s3.child("cp");
        assert_eq!(cp.get("src"), Some(&json!("./foo")));
        assert!(scope.child("missing").get("src").is_none());
    }

    #[test]
    fn test_declared_variables_flow_to_children() {
        let mut scope = Scope::root(&json!({"sub": {"own": 1}}));
        scope.declare("region", json!("eu-west-1"));
        assert_eq!(scope.get("region"), Some(&json!("eu-west-1")));
        let child = scope.child("sub");
        assert_eq!(child.get("region"), Some(&json!("eu-west-1")));
        assert_eq!(child.get("own"), Some(&json!(1)));
        let grandchild = child.child("deeper");
        assert_eq!(grandchild.get("region"), Some(&json!("eu-west-1")));
    }

    #[test]
    fn test_child_config_wins_over_inherited() {
        let mut scope = Scope::root(&json!({"sub": {"region": "us-east-1"}}));
        scope.declare("region", json!("eu-west-1"));
        assert_eq!(scope.child("sub").get("region"), Some(&json!("us-east-1")));
    }

    #[test]
    fn test_apply_default_only_when_missing() {
        let mut scope = Scope::root(&json!({"a": "set", "b": null}));
        scope.apply_default("a", &json!("default"));
        scope.apply_default("b", &json!("default"));
        scope.apply_default("c", &json!(3));
        assert_eq!(scope.get("a"), Some(&json!("set")));
        assert_eq!(scope.get("b"), Some(&json!("default")));
        assert_eq!(scope.get("c"), Some(&json!(3)));
    }

    #[test]
    fn test_usable_checks_all_names() {
        let scope = Scope::root(&json!({"verbose": false, "v": true}));
        let found = scope.usable(["verbose", "v"]);
        assert_eq!(found, Some(("v", &json!(true))));
    }

    #[test]
    fn test_template_context_merges_layers() {
        let mut scope = Scope::root(&json!({"sub": {"name": "x"}}));
        scope.declare("region", json!("eu"));
        let mut child = scope.child("sub");
        child.declare("local", json!(1));
        let ctx = child.template_context();
        assert_eq!(ctx.get("region"), Some(&json!("eu")));
        assert_eq!(ctx.get("name"), Some(&json!("x")));
        assert_eq!(ctx.get("local"), Some(&json!(1)));
    }
}
