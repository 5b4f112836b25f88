//! Programmatic invocation: run a management command from code.
//!
//! `call_command` takes keyword options instead of an argv. It rebuilds the
//! argv fragment the parser needs (positionals plus every required option
//! the caller supplied), parses it to pick up defaults for everything else,
//! lays the caller's keyword values on top and executes the command.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::{SeahorseError, SeahorseResult};
use crate::management::base::Command;
use crate::management::parser::{Argument, ParseFailure};
use crate::management::registry::CommandRegistry;
use crate::management::value::{Options, Value};

/// A command to call: by registered name, or an instance used directly.
#[derive(Clone)]
pub enum CommandRef {
    Name(String),
    Instance {
        name: String,
        command: Arc<dyn Command>,
    },
}

impl CommandRef {
    /// Wraps an instance; its name is the last segment of the module that
    /// defines `C`.
    pub fn instance<C: Command + 'static>(command: C) -> Self {
        CommandRef::Instance {
            name: module_name::<C>(),
            command: Arc::new(command),
        }
    }

    pub fn named(name: impl Into<String>, command: Arc<dyn Command>) -> Self {
        CommandRef::Instance {
            name: name.into(),
            command,
        }
    }
}

impl From<&str> for CommandRef {
    fn from(name: &str) -> Self {
        CommandRef::Name(name.to_string())
    }
}

impl From<String> for CommandRef {
    fn from(name: String) -> Self {
        CommandRef::Name(name)
    }
}

fn module_name<C>() -> String {
    let path = std::any::type_name::<C>();
    let mut segments = path.rsplit("::");
    segments.next();
    segments.next().unwrap_or(path).to_string()
}

/// Keyword spelling of an option: its shortest flag without leading dashes,
/// inner dashes turned into underscores.
fn keyword_alias(argument: &Argument) -> Option<String> {
    argument
        .shortest_flag()
        .map(|flag| flag.trim_start_matches('-').replace('-', "_"))
}

/// Calls the given command with positional `args` and keyword `options`.
///
/// Keywords may use either an option's destination or its shortest flag
/// spelling. Unknown keywords fail with [`SeahorseError::InvalidKeyword`];
/// parse failures surface as catchable `CommandError`s. `skip_checks`
/// defaults to true unless the caller set it.
pub fn call_command(
    registry: &CommandRegistry,
    command: impl Into<CommandRef>,
    args: &[Value],
    options: Options,
) -> SeahorseResult<Option<String>> {
    let (name, mut command) = match command.into() {
        CommandRef::Name(name) => match registry.fetch(&name) {
            Ok(command) => (name, command),
            Err(SeahorseError::UnknownCommand { name }) => {
                return Err(SeahorseError::command(format!("Unknown command: '{name}'")))
            }
            Err(err) => return Err(err),
        },
        CommandRef::Instance { name, command } => {
            let bound = registry.bind(&name, command);
            (name, bound)
        }
    };

    let parser = command.create_parser("", &name);
    let actions = parser.actions();

    let mut opt_mapping: BTreeMap<String, String> = BTreeMap::new();
    for argument in actions.iter().filter(|a| !a.is_positional()) {
        if let Some(alias) = keyword_alias(argument) {
            opt_mapping.insert(alias, argument.get_dest().to_string());
        }
    }

    let mut arg_options: BTreeMap<String, Value> = BTreeMap::new();
    for (key, value) in options.iter() {
        let dest = opt_mapping.get(key).unwrap_or(key);
        arg_options.insert(dest.clone(), value.clone());
    }

    let mut parse_args: Vec<String> = args.iter().flat_map(Value::to_tokens).collect();

    let required_members = parser.required_group_members();
    for argument in actions.iter().filter(|a| !a.is_positional()) {
        let dest = argument.get_dest();
        let Some(value) = arg_options.get(dest) else {
            continue;
        };
        let in_required_group = required_members.iter().any(|m| std::ptr::eq(*m, *argument));
        if !(argument.is_required() || in_required_group) {
            continue;
        }
        let matching = opt_mapping.values().filter(|d| d.as_str() == dest).count();
        if matching > 1 {
            return Err(SeahorseError::invalid_keyword(format!(
                "Cannot pass the dest {dest:?} that matches multiple arguments as a keyword option."
            )));
        }
        if let Some(flag) = argument.canonical_flag() {
            parse_args.push(flag.to_string());
        }
        if argument.takes_value() {
            parse_args.extend(value.to_tokens());
        }
    }
    tracing::debug!(command = %name, tokens = ?parse_args, "rebuilt argv for programmatic call");

    let mut merged = match parser.parse(&parse_args) {
        Ok(defaults) => defaults,
        Err(ParseFailure::Usage { message, usage }) => {
            return Err(parser.usage_error(message, usage));
        }
        Err(ParseFailure::Display { text }) => {
            command.streams().stdout.write(&text)?;
            return Ok(None);
        }
    };
    let mut overrides = Options::new();
    for (dest, value) in arg_options {
        overrides.insert(dest, value);
    }
    if let Some(sink) = options.stdout_sink() {
        overrides = overrides.stdout(sink.clone());
    }
    if let Some(sink) = options.stderr_sink() {
        overrides = overrides.stderr(sink.clone());
    }
    merged.merge(overrides);

    let mut valid: BTreeSet<String> = actions.iter().map(|a| a.get_dest().to_string()).collect();
    valid.extend(command.stealth_options().into_iter().map(String::from));
    valid.extend(opt_mapping.keys().cloned());
    let unknown: Vec<String> = options
        .keys()
        .into_iter()
        .filter(|key| !valid.contains(key))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !unknown.is_empty() {
        return Err(SeahorseError::invalid_keyword(format!(
            "Unknown option(s) for {name} command: {}. Valid options are: {}.",
            unknown.join(", "),
            valid.into_iter().collect::<Vec<_>>().join(", "),
        )));
    }

    let positional = merged.take_args();
    if !options.contains("skip_checks") {
        merged.insert("skip_checks", true);
    }

    let guard = command.cleanup_guard();
    let result = command.execute(&positional, &merged);
    let cleanup = guard.finish();
    let output = result?;
    cleanup?;
    Ok(output)
}
