//! Management command framework and the top-level dispatcher.
//!
//! [`ManagementUtility`] takes a raw argv, handles the special `help` and
//! `version` invocations itself and hands everything else to the command
//! registered under `argv[1]`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{print_error, SeahorseError, SeahorseResult};
use crate::version::get_version;

pub mod base;
pub mod call;
pub mod commands;
pub mod output;
pub mod parser;
pub mod registry;
pub mod value;

pub use base::{BaseCommand, CheckScope, Command, Streams};
pub use call::{call_command, CommandRef};
pub use output::{OutputBuffer, OutputWrapper, Palette, SharedSink, Sink};
pub use parser::{Action, Argument, CommandParser, Nargs, ParseFailure, ValueType};
pub use registry::{CommandFactory, CommandRegistry, CommandSource, Namespace};
pub use value::{Options, Value};

use registry::namespace_label;

/// Program name shown when argv does not carry one.
const DEFAULT_PROG_NAME: &str = "seahorse";

/// Help label for commands registered as live instances.
const INSTANCE_LABEL: &str = "registered";

/// Encapsulates the logic of the `seahorse` command-line entry point.
pub struct ManagementUtility {
    argv: Vec<String>,
    prog_name: String,
    registry: CommandRegistry,
    stdout: SharedSink,
    stderr: SharedSink,
}

impl ManagementUtility {
    pub fn new(argv: Vec<String>) -> Self {
        let prog_name = argv
            .first()
            .and_then(|arg0| Path::new(arg0).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_PROG_NAME)
            .to_string();
        Self {
            argv,
            prog_name,
            registry: CommandRegistry::with_core(),
            stdout: SharedSink::stdout(),
            stderr: SharedSink::stderr(),
        }
    }

    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sends dispatcher and command output to the given sinks.
    pub fn with_sinks(mut self, stdout: SharedSink, stderr: SharedSink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn prog_name(&self) -> &str {
        &self.prog_name
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The general help text, or a bare sorted list of command names.
    pub fn main_help_text(&self, commands_only: bool) -> String {
        let commands = self.registry.get_commands();
        if commands_only {
            return commands.keys().cloned().collect::<Vec<_>>().join("\n");
        }

        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, source) in commands {
            let label = match source {
                CommandSource::Namespace(namespace) => namespace_label(namespace),
                CommandSource::Instance(_) => INSTANCE_LABEL,
            };
            groups.entry(label).or_default().push(name);
        }

        let mut lines = vec![
            String::new(),
            format!(
                "Type '{} help <subcommand>' for help on a specific subcommand.",
                self.prog_name
            ),
            String::new(),
            "Available subcommands:".to_string(),
        ];
        for (label, names) in groups {
            lines.push(String::new());
            lines.push(format!("[{label}]"));
            lines.extend(names.into_iter().map(|name| format!("    {name}")));
        }
        lines.join("\n")
    }

    /// Resolves `subcommand`, bound to this utility's sinks.
    pub fn fetch_command(&self, subcommand: &str) -> SeahorseResult<BaseCommand> {
        let command = self.registry.fetch(subcommand)?;
        Ok(command.with_sinks(self.stdout.clone(), self.stderr.clone()))
    }

    /// Figures out which subcommand is being run and runs it. Returns the
    /// process exit status.
    pub fn execute(&self) -> SeahorseResult<i32> {
        let subcommand = self.argv.get(1).map(String::as_str).unwrap_or("help");
        let rest = self.argv.get(2..).unwrap_or_default();
        let invocation = self.argv.get(1..).unwrap_or_default();
        let positionals = self.sniff_positionals(rest);
        tracing::debug!(%subcommand, ?positionals, "dispatching");

        let out = OutputWrapper::new(self.stdout.clone());
        if subcommand == "help" {
            if rest.iter().any(|token| token == "--commands") {
                out.write(&self.main_help_text(true))?;
            } else if let Some(name) = positionals.first() {
                match self.fetch_command(name) {
                    Ok(command) => command.print_help(&self.prog_name, name)?,
                    Err(SeahorseError::UnknownCommand { name }) => return self.unknown_command(&name),
                    Err(err) => return Err(err),
                }
            } else {
                out.write(&self.main_help_text(false))?;
            }
            Ok(0)
        } else if subcommand == "version" || invocation == ["--version"] {
            out.write(get_version())?;
            Ok(0)
        } else if invocation == ["--help"] || invocation == ["-h"] {
            out.write(&self.main_help_text(false))?;
            Ok(0)
        } else {
            match self.fetch_command(subcommand) {
                Ok(mut command) => command.run_from_argv(&self.argv),
                Err(SeahorseError::UnknownCommand { name }) => self.unknown_command(&name),
                Err(err) => Err(err),
            }
        }
    }

    /// Lenient pre-parse of the tokens after the subcommand. Never fails:
    /// when the parser rejects the tokens they are classified as given.
    fn sniff_positionals(&self, tokens: &[String]) -> Vec<String> {
        let mut parser = CommandParser::new(self.prog_name.clone());
        parser.add_argument(Argument::positional("args").nargs(Nargs::Remainder));
        let seen = match parser.parse(tokens) {
            Ok(mut options) => options.take_args(),
            Err(failure) => {
                tracing::debug!(?failure, "lenient pre-parse rejected the tokens");
                tokens.to_vec()
            }
        };
        seen.into_iter().filter(|token| !token.starts_with('-')).collect()
    }

    fn unknown_command(&self, name: &str) -> SeahorseResult<i32> {
        let err = OutputWrapper::new(self.stderr.clone());
        err.write(&SeahorseError::unknown_command(name).to_string())?;
        err.write(&format!("Type '{} help' for usage.", self.prog_name))?;
        Ok(1)
    }
}

/// Runs the dispatcher over `argv` and returns the process exit status.
/// Errors that escape the dispatcher are reported on stderr.
pub fn execute_from_command_line(argv: Vec<String>) -> i32 {
    match ManagementUtility::new(argv).execute() {
        Ok(code) => code,
        Err(err) => {
            let code = err.returncode();
            print_error(err);
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(argv: &[&str]) -> (ManagementUtility, OutputBuffer, OutputBuffer) {
        let out = OutputBuffer::new();
        let err = OutputBuffer::new();
        let utility = ManagementUtility::new(argv.iter().map(|s| s.to_string()).collect())
            .with_sinks(out.shared(), err.shared());
        (utility, out, err)
    }

    #[test]
    fn prog_name_is_the_basename_of_argv0() {
        let (utility, _, _) = dispatcher(&["/opt/bin/seahorse", "help"]);
        assert_eq!(utility.prog_name(), "seahorse");
        let (utility, _, _) = dispatcher(&[]);
        assert_eq!(utility.prog_name(), DEFAULT_PROG_NAME);
    }

    #[test]
    fn main_help_groups_commands_by_namespace_label() {
        let (utility, _, _) = dispatcher(&["seahorse"]);
        let text = utility.main_help_text(false);
        assert!(text.contains("Type 'seahorse help <subcommand>'"));
        assert!(text.contains("[core]\n    aks\n    eks\n    gke"));
        assert_eq!(utility.main_help_text(true), "aks\neks\ngke");
    }

    #[test]
    fn sniffing_keeps_positionals_and_tolerates_unknown_flags() {
        let (utility, _, _) = dispatcher(&["seahorse"]);
        let tokens: Vec<String> = ["--bogus", "eks", "-x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(utility.sniff_positionals(&tokens), vec!["eks".to_string()]);
    }

    #[test]
    fn help_for_an_unknown_command_exits_with_one() {
        let (utility, out, err) = dispatcher(&["seahorse", "help", "nope"]);
        assert_eq!(utility.execute().unwrap(), 1);
        assert!(out.contents().is_empty());
        assert_eq!(
            err.contents(),
            "Unknown command: 'nope'\nType 'seahorse help' for usage.\n"
        );
    }
}
