//! Declarative command specifications compiled into argument vectors.
//!
//! A [`ShellSpec`] holds a loaded specification. Each call to
//! [`ShellSpec::get_argv`] resolves it against a configuration object along a
//! command path and returns the argv to hand to the executable.

use std::process::{Child, Command, Stdio};

use serde_json::Value;
use tracing::debug;

pub mod cli;
pub mod collections;
pub mod concat;
pub mod emit;
pub mod error;
pub mod path;
pub mod prompt;
pub mod scope;
pub mod spec;
pub mod template;
pub mod tokenize;
pub mod validate;

pub use concat::ConcatPolicy;
pub use error::{Error, Result};
pub use path::CommandPath;
pub use prompt::{MergePolicy, PromptDescriptor, PromptKind, Prompter};
pub use spec::{parse_definition, ArgDef, ArgKind, Definition, Spec};
pub use tokenize::Token;

// =====================
// Public API
// =====================

/// A validated, collection-expanded specification and its runtime options.
#[derive(Debug, Clone)]
pub struct ShellSpec {
    spec: Spec,
    main: String,
    bound_config: Value,
    label: Option<String>,
    alias: Option<String>,
    version: Option<String>,
    merge_policy: MergePolicy,
    concat: ConcatPolicy,
}

impl ShellSpec {
    pub fn new(spec: Spec) -> Result<Self> {
        Self::from_definition(Definition::from(spec))
    }

    pub fn from_definition(definition: Definition) -> Result<Self> {
        definition.spec.validate()?;
        let spec = collections::expand_collections(&definition.spec)?;
        let main = spec.main_name()?.to_string();
        let concat = ConcatPolicy::from(&spec.concat_flags);
        debug!(main = %main, concat = ?concat, "loaded specification");
        Ok(Self {
            spec,
            main,
            bound_config: definition.config,
            label: definition.label,
            alias: definition.alias,
            version: None,
            merge_policy: MergePolicy::default(),
            concat,
        })
    }

    /// Load a YAML or JSON document, bare or wrapped in a definition envelope.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_definition(parse_definition(text)?)
    }

    #[must_use]
    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Caller config layered over the envelope's bound config.
    fn effective_config(&self, config: &Value) -> Value {
        prompt::deep_merge(self.bound_config.clone(), config.clone())
    }

    /// Resolved, validated and concatenated tokens, before emission.
    pub fn get_tokens<P: Into<CommandPath>>(&self, config: &Value, command: P) -> Result<Vec<Token>> {
        let path = command.into();
        let config = self.effective_config(config);
        let tokens = tokenize::tokenize(&self.spec, &config, &path, self.version.as_deref())?;
        let tokens = validate::validate(tokens)?;
        concat::concat_flags(tokens, &self.concat)
    }

    pub fn get_argv<P: Into<CommandPath>>(&self, config: &Value, command: P) -> Result<Vec<String>> {
        let argv = emit::emit(&self.get_tokens(config, command)?)?;
        debug!(argv = ?argv, "computed argv");
        Ok(argv)
    }

    pub fn get_prompts<P: Into<CommandPath>>(
        &self,
        config: &Value,
        command: P,
    ) -> Result<Vec<PromptDescriptor>> {
        let config = self.effective_config(config);
        prompt::derive_prompts(&self.spec, &config, &command.into(), self.version.as_deref())
    }

    /// Ask `prompter` for every missing required value, then compute argv.
    pub fn prompted_argv<P, Q>(&self, config: &Value, command: P, prompter: &mut Q) -> Result<Vec<String>>
    where
        P: Into<CommandPath>,
        Q: Prompter + ?Sized,
    {
        let path = command.into();
        let config = self.answer_prompts(config, &path, prompter)?;
        self.get_argv(&config, path)
    }

    fn answer_prompts<Q: Prompter + ?Sized>(
        &self,
        config: &Value,
        path: &CommandPath,
        prompter: &mut Q,
    ) -> Result<Value> {
        let prompts = self.get_prompts(config, path.clone())?;
        if prompts.is_empty() {
            return Ok(config.clone());
        }
        let answers = prompter.prompt(&prompts)?;
        Ok(prompt::merge_answers(config, &answers, &self.main, self.merge_policy))
    }

    /// The unspawned process for `command`, with inherited stdio.
    pub fn command<P: Into<CommandPath>>(&self, config: &Value, command: P) -> Result<Command> {
        let argv = self.get_argv(config, command)?;
        build_command(&argv)
    }

    pub fn spawn<P: Into<CommandPath>>(&self, config: &Value, command: P) -> Result<Child> {
        let mut cmd = self.command(config, command)?;
        debug!(program = %self.main, "spawning");
        Ok(cmd.spawn()?)
    }

    pub fn prompted_spawn<P, Q>(&self, config: &Value, command: P, prompter: &mut Q) -> Result<Child>
    where
        P: Into<CommandPath>,
        Q: Prompter + ?Sized,
    {
        let argv = self.prompted_argv(config, command, prompter)?;
        debug!(program = %self.main, "spawning");
        Ok(build_command(&argv)?.spawn()?)
    }

    /// Dotted config paths consumed along `command`, or by the whole tree.
    pub fn get_config_paths(&self, command: Option<&CommandPath>) -> Result<Vec<String>> {
        path::config_paths(&self.spec, command, self.version.as_deref())
    }
}

fn build_command(argv: &[String]) -> Result<Command> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::invalid_spec("empty argv"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    Ok(cmd)
}
