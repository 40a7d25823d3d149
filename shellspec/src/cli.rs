use std::fs;
use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use tracing::debug;

use crate::path::CommandPath;
use crate::prompt::{self, MergePolicy, PromptDescriptor, PromptKind, Prompter};
use crate::{Error, ShellSpec};

pub fn build_cli() -> Command {
    let path_arg = || {
        Arg::new("path")
            .help("Dotted command path below the main command, e.g. s3.cp")
            .num_args(1)
            .index(1)
    };

    Command::new("shellspec")
        .about("Compile a declarative command specification into argv and run it")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        // Global options
        .arg(
            Arg::new("spec-file")
                .long("spec-file")
                .short('s')
                .help("Path to the specification (YAML or JSON)")
                .num_args(1)
                .global(true),
        )
        .arg(
            Arg::new("config-file")
                .long("config-file")
                .short('c')
                .help("Path to the configuration object (YAML or JSON)")
                .num_args(1)
                .global(true),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .help("Set a config value, 'dotted.path=value' (repeatable)")
                .num_args(1)
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("spec-version")
                .long("spec-version")
                .help("Version of the specification to resolve")
                .num_args(1)
                .global(true),
        )
        .arg(
            Arg::new("merge-policy")
                .long("merge-policy")
                .help("Which side wins when prompted answers collide with config")
                .num_args(1)
                .value_parser(["answers", "config"])
                .default_value("answers")
                .global(true),
        )
        .arg(
            Arg::new("json-output")
                .long("json-output")
                .short('j')
                .help("Output in JSON format")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("argv")
                .about("Print the argument vector for a command path")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("prompts")
                .about("Print the prompts for required values missing from config")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("paths")
                .about("Print the configuration paths the specification consumes")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Prompt for missing values, then run the command")
                .arg(path_arg())
                .arg(
                    Arg::new("no-prompt")
                        .long("no-prompt")
                        .help("Fail instead of prompting for missing required values")
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Read a YAML or JSON configuration object; no file means an empty object.
pub fn load_config(path: Option<&str>) -> anyhow::Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path))?;
    let value: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse config file: {}", path))?;
    match value {
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(_) => Ok(value),
        _ => bail!("Config file {} must hold an object", path),
    }
}

pub fn load_spec(path: &str) -> anyhow::Result<ShellSpec> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read spec file: {}", path))?;
    ShellSpec::parse(&text).with_context(|| format!("Failed to load spec file: {}", path))
}

/// Apply `dotted.path=value` assignments; values are read as YAML scalars.
pub fn apply_sets(config: &mut Value, sets: &[String]) -> anyhow::Result<()> {
    for set in sets {
        let (path, raw) = set
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --set '{}', expected path=value", set))?;
        if path.trim().is_empty() {
            bail!("Invalid --set '{}', empty path", set);
        }
        let value = if raw.is_empty() {
            Value::String(String::new())
        } else {
            serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        prompt::set_path(config, path.trim(), value);
    }
    Ok(())
}

/// Line-oriented prompter over any reader/writer pair.
pub struct StdinPrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StdinPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &PromptDescriptor) -> crate::Result<String> {
        loop {
            match &prompt.choices {
                Some(choices) if prompt.kind == PromptKind::List => {
                    write!(self.output, "{} [{}]: ", prompt.message, choices.join("/"))?
                }
                _ => write!(self.output, "{}: ", prompt.message)?,
            }
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("no answer for {}", prompt.name),
                )));
            }
            let answer = line.trim().to_string();
            match &prompt.choices {
                Some(choices) if !choices.contains(&answer) => {
                    writeln!(self.output, "expected one of: {}", choices.join(", "))?;
                }
                _ => return Ok(answer),
            }
        }
    }
}

impl<R: BufRead, W: Write> Prompter for StdinPrompter<R, W> {
    fn prompt(&mut self, prompts: &[PromptDescriptor]) -> crate::Result<Value> {
        let mut answers = Value::Object(serde_json::Map::new());
        for p in prompts {
            let answer = self.ask(p)?;
            prompt::set_path(&mut answers, &p.name, Value::String(answer));
        }
        Ok(answers)
    }
}

fn command_path(matches: &ArgMatches) -> CommandPath {
    matches
        .get_one::<String>("path")
        .map(|p| CommandPath::parse(p))
        .unwrap_or_default()
}

fn render_lines(items: &[String], json_output: bool) -> anyhow::Result<String> {
    if json_output {
        Ok(serde_json::to_string_pretty(items)?)
    } else {
        Ok(items.join("\n"))
    }
}

fn render_prompts(prompts: &[PromptDescriptor], json_output: bool) -> anyhow::Result<String> {
    if json_output {
        return Ok(serde_json::to_string_pretty(prompts)?);
    }
    Ok(prompts
        .iter()
        .map(|p| match &p.choices {
            Some(choices) => format!("{}: {} [{}]", p.name, p.message, choices.join("/")),
            None => format!("{}: {}", p.name, p.message),
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

fn print_block(text: &str) {
    if !text.is_empty() {
        println!("{}", text);
    }
}

/// Run the selected subcommand, returning the process exit code.
pub fn drive_command(matches: &ArgMatches, prompter: &mut dyn Prompter) -> anyhow::Result<i32> {
    let spec_file = matches
        .get_one::<String>("spec-file")
        .ok_or_else(|| anyhow!("--spec-file is required"))?;
    let mut shell = load_spec(spec_file)?;
    if let Some(version) = matches.get_one::<String>("spec-version") {
        shell = shell.with_version(version.as_str());
    }
    let policy: MergePolicy = matches
        .get_one::<String>("merge-policy")
        .map(|p| p.parse::<MergePolicy>())
        .transpose()?
        .unwrap_or_default();
    shell = shell.with_merge_policy(policy);

    let mut config = load_config(matches.get_one::<String>("config-file").map(String::as_str))?;
    let sets: Vec<String> = matches
        .get_many::<String>("set")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    apply_sets(&mut config, &sets)?;
    let json_output = matches.get_flag("json-output");

    match matches.subcommand() {
        Some(("argv", sub)) => {
            let argv = shell.get_argv(&config, command_path(sub))?;
            print_block(&render_lines(&argv, json_output)?);
            Ok(0)
        }
        Some(("prompts", sub)) => {
            let prompts = shell.get_prompts(&config, command_path(sub))?;
            print_block(&render_prompts(&prompts, json_output)?);
            Ok(0)
        }
        Some(("paths", sub)) => {
            let path = sub.get_one::<String>("path").map(|p| CommandPath::parse(p));
            let paths = shell.get_config_paths(path.as_ref())?;
            print_block(&render_lines(&paths, json_output)?);
            Ok(0)
        }
        Some(("run", sub)) => {
            let path = command_path(sub);
            let mut child = if sub.get_flag("no-prompt") {
                shell.spawn(&config, path)?
            } else {
                shell.prompted_spawn(&config, path, prompter)?
            };
            let status = child
                .wait()
                .with_context(|| format!("Failed to wait for {}", shell.main()))?;
            debug!(status = ?status, "child exited");
            Ok(status.code().unwrap_or(1))
        }
        _ => bail!("Unknown subcommand"),
    }
}
