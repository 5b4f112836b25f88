//! The command contract and the execution wrapper shared by both call paths.
//!
//! A concrete command implements [`Command`]: it declares its options, its
//! help text and a `handle` operation. [`BaseCommand`] binds such an
//! implementation to its output streams and to the external [`Hooks`], and
//! provides the common flow around `handle`:
//!
//! 1. `create_parser` builds a fresh parser with the base options
//!    (`--version`, `-v/--verbosity`, `--traceback`, `--no-color`,
//!    `--force-color`, `--skip-checks`) followed by the command's own.
//! 2. `run_from_argv` parses a raw argv and reports `CommandError`s as an
//!    exit status unless a traceback was requested.
//! 3. `execute` rebinds the streams, runs system checks, calls `handle` and
//!    writes its output.
//!
//! Connections are closed after `run_from_argv` (and after `call_command`)
//! on every exit path.

use std::path::Path;
use std::sync::Arc;

use crate::errors::{SeahorseError, SeahorseResult, USAGE_RETURNCODE};
use crate::hooks::{Connections, Hooks, DEFAULT_DB_ALIAS};
use crate::management::output::{OutputWrapper, Palette, SharedSink};
use crate::management::parser::{Action, Argument, CommandParser, ParseFailure, ValueType};
use crate::management::value::Options;
use crate::version::get_version;

/// Keywords every command accepts without declaring them on its parser.
pub const BASE_STEALTH_OPTIONS: &[&str] = &["stderr", "stdout"];

/// Which system checks a command needs before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckScope {
    All,
    /// Only the checks with these tags; an empty list disables checks.
    Tags(Vec<String>),
}

impl CheckScope {
    pub fn none() -> Self {
        CheckScope::Tags(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CheckScope::Tags(tags) if tags.is_empty())
    }
}

/// The output streams a command writes to, plus its styles.
#[derive(Clone)]
pub struct Streams {
    pub stdout: OutputWrapper,
    pub stderr: OutputWrapper,
    pub style: Palette,
}

impl Streams {
    pub fn new(stdout: SharedSink, stderr: SharedSink) -> Self {
        let style = Palette::color();
        let mut stderr = OutputWrapper::new(stderr);
        stderr.set_style(style.error.clone());
        Self {
            stdout: OutputWrapper::new(stdout),
            stderr,
            style,
        }
    }
}

impl Default for Streams {
    fn default() -> Self {
        Self::new(SharedSink::stdout(), SharedSink::stderr())
    }
}

/// The contract every management command satisfies.
pub trait Command: Send + Sync {
    /// Short description shown in help output.
    fn help(&self) -> &str {
        ""
    }

    fn requires_system_checks(&self) -> CheckScope {
        CheckScope::All
    }

    /// Keywords `handle` understands that are not declared on the parser.
    fn stealth_options(&self) -> &[&'static str] {
        &[]
    }

    /// Base option flags to hide from help (they still parse).
    fn suppressed_base_arguments(&self) -> &[&'static str] {
        &[]
    }

    /// Whether output is framed by the transaction statements.
    fn output_transaction(&self) -> bool {
        false
    }

    /// Reported instead of a parser error when no positional was given.
    fn missing_args_message(&self) -> Option<&str> {
        None
    }

    fn version(&self) -> String {
        get_version().to_string()
    }

    /// Declares command-specific options.
    fn add_arguments(&self, _parser: &mut CommandParser) {}

    /// Does the work. A non-empty returned string is written to stdout.
    fn handle(
        &self,
        streams: &mut Streams,
        args: &[String],
        options: &Options,
    ) -> SeahorseResult<Option<String>>;
}

/// A resolved command bound to its streams and collaborators.
pub struct BaseCommand {
    name: String,
    command: Arc<dyn Command>,
    hooks: Hooks,
    streams: Streams,
    called_from_command_line: bool,
}

impl BaseCommand {
    pub fn new(name: impl Into<String>, command: Arc<dyn Command>, hooks: Hooks) -> Self {
        Self {
            name: name.into(),
            command,
            hooks,
            streams: Streams::default(),
            called_from_command_line: false,
        }
    }

    /// Replaces the default process streams.
    pub fn with_sinks(mut self, stdout: SharedSink, stderr: SharedSink) -> Self {
        self.streams = Streams::new(stdout, stderr);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &Arc<dyn Command> {
        &self.command
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Base stealth options plus the command's own.
    pub fn stealth_options(&self) -> Vec<&'static str> {
        let mut options = BASE_STEALTH_OPTIONS.to_vec();
        options.extend_from_slice(self.command.stealth_options());
        options
    }

    /// Builds a fresh parser for `<prog_name> <subcommand>`.
    pub fn create_parser(&self, prog_name: &str, subcommand: &str) -> CommandParser {
        let prog = format!("{} {subcommand}", basename(prog_name))
            .trim()
            .to_string();
        let mut parser = CommandParser::new(prog)
            .description(Some(self.command.help().to_string()))
            .missing_args_message(self.command.missing_args_message().map(String::from))
            .called_from_command_line(self.called_from_command_line);

        self.add_base_argument(
            &mut parser,
            Argument::option(["--version"])
                .action(Action::Version(self.command.version()))
                .help("Show program's version number and exit."),
        );
        self.add_base_argument(
            &mut parser,
            Argument::option(["-v", "--verbosity"])
                .default(1)
                .value_type(ValueType::Int)
                .choices(["0", "1", "2", "3"])
                .help(
                    "Verbosity level; 0=minimal output, 1=normal output, \
                     2=verbose output, 3=very verbose output",
                ),
        );
        self.add_base_argument(
            &mut parser,
            Argument::option(["--traceback"])
                .action(Action::StoreTrue)
                .help("Raise on CommandError exceptions."),
        );
        self.add_base_argument(
            &mut parser,
            Argument::option(["--no-color"])
                .action(Action::StoreTrue)
                .help("Don't colorize the command output."),
        );
        self.add_base_argument(
            &mut parser,
            Argument::option(["--force-color"])
                .action(Action::StoreTrue)
                .help("Force colorization of the command output."),
        );
        if !self.command.requires_system_checks().is_empty() {
            self.add_base_argument(
                &mut parser,
                Argument::option(["--skip-checks"])
                    .action(Action::StoreTrue)
                    .help("Skip system checks."),
            );
        }
        self.command.add_arguments(&mut parser);
        parser
    }

    fn add_base_argument(&self, parser: &mut CommandParser, argument: Argument) {
        let suppressed = self.command.suppressed_base_arguments();
        let hidden = argument
            .flags()
            .iter()
            .any(|flag| suppressed.contains(&flag.as_str()));
        parser.add_argument(argument.hidden(hidden));
    }

    /// Writes this command's help to its stdout.
    pub fn print_help(&self, prog_name: &str, subcommand: &str) -> SeahorseResult<()> {
        let parser = self.create_parser(prog_name, subcommand);
        self.streams.stdout.write(&parser.format_help())?;
        Ok(())
    }

    /// Runs the command from a full argv (`[prog, subcommand, ...]`) and
    /// returns the process exit status.
    ///
    /// `CommandError`s are written to stderr as `Error: <message>` and turned
    /// into their return code, unless `--traceback` was given, in which case
    /// they propagate.
    pub fn run_from_argv(&mut self, argv: &[String]) -> SeahorseResult<i32> {
        self.called_from_command_line = true;
        let prog_name = argv.first().map(String::as_str).unwrap_or_default();
        let subcommand = argv.get(1).map(String::as_str).unwrap_or(&self.name);
        let parser = self.create_parser(prog_name, subcommand);
        let tokens = argv.get(2..).unwrap_or_default();

        let guard = self.cleanup_guard();
        let result = self.run_parsed(&parser, tokens);
        let cleanup = guard.finish();
        let code = result?;
        cleanup?;
        Ok(code)
    }

    fn run_parsed(&mut self, parser: &CommandParser, tokens: &[String]) -> SeahorseResult<i32> {
        let mut options = match parser.parse(tokens) {
            Ok(options) => options,
            Err(ParseFailure::Display { text }) => {
                self.streams.stdout.write(&text)?;
                return Ok(0);
            }
            Err(ParseFailure::Usage { message, usage }) => {
                return match parser.usage_error(message, usage) {
                    SeahorseError::Usage { usage, .. } => {
                        self.streams.stderr.write_styled(&usage, None)?;
                        Ok(USAGE_RETURNCODE)
                    }
                    other => Err(other),
                };
            }
        };
        let args = options.take_args();
        let traceback = options.flag("traceback");

        match self.execute(&args, &options) {
            Ok(_) => Ok(0),
            Err(err) if err.is_command_error() && !traceback => {
                let message = match &err {
                    SeahorseError::SystemCheck { message } => message.clone(),
                    other => format!("Error: {other}"),
                };
                self.streams.stderr.write(&message)?;
                Ok(err.returncode())
            }
            Err(err) => Err(err),
        }
    }

    /// Runs `handle` with the standard flow around it and returns its raw
    /// result. Stream overrides in `options` last for this call only.
    pub fn execute(&mut self, args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
        let saved = self.streams.clone();
        let result = self.execute_inner(args, options);
        self.streams = saved;
        result
    }

    fn execute_inner(&mut self, args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
        if options.flag("force_color") && options.flag("no_color") {
            return Err(SeahorseError::command(
                "The --no-color and --force-color options can't be used together.",
            ));
        }
        if let Some(sink) = options.stdout_sink() {
            self.streams.stdout = OutputWrapper::new(sink.clone());
        }
        if let Some(sink) = options.stderr_sink() {
            self.streams.stderr = OutputWrapper::new(sink.clone());
            self.streams.stderr.set_style(self.streams.style.error.clone());
        }
        if options.flag("force_color") {
            self.streams.stdout.force_color(true);
            self.streams.stderr.force_color(true);
            self.streams.stderr.set_style(self.streams.style.error.clone());
        } else if options.flag("no_color") {
            self.streams.style = Palette::plain();
            self.streams.stderr.set_style(None);
        }

        let scope = self.command.requires_system_checks();
        if !scope.is_empty() && !options.flag("skip_checks") {
            tracing::debug!(command = %self.name, ?scope, "running system checks");
            self.hooks.checks.run_checks(&scope)?;
        }

        let output = self.command.handle(&mut self.streams, args, options)?;
        if let Some(text) = output.as_deref().filter(|text| !text.is_empty()) {
            let text = if self.command.output_transaction() {
                self.transaction_banner(text, options)
            } else {
                text.to_string()
            };
            self.streams.stdout.write(&text)?;
        }
        Ok(output)
    }

    fn transaction_banner(&self, text: &str, options: &Options) -> String {
        let alias = options.get_str("database").unwrap_or(DEFAULT_DB_ALIAS);
        let (begin, end) = self.hooks.connections.transaction_sql(alias);
        let keyword = self.streams.style.sql_keyword.as_ref();
        let stdout = &self.streams.stdout;
        format!(
            "{}\n{text}\n{}",
            stdout.stylize(keyword, &begin),
            stdout.stylize(keyword, &end)
        )
    }

    pub(crate) fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(self.hooks.connections.clone())
    }
}

fn basename(prog_name: &str) -> &str {
    Path::new(prog_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(prog_name)
}

/// Closes connections, ignoring a connection layer that was never set up.
pub(crate) fn close_connections(connections: &dyn Connections) -> SeahorseResult<()> {
    match connections.close_all() {
        Err(SeahorseError::ImproperlyConfigured { message }) => {
            tracing::debug!(%message, "connection cleanup skipped");
            Ok(())
        }
        other => other,
    }
}

/// Closes connections when dropped, unless [`CleanupGuard::finish`] already
/// did. Failures during unwinding are logged, not raised.
pub(crate) struct CleanupGuard {
    connections: Option<Arc<dyn Connections>>,
}

impl CleanupGuard {
    fn new(connections: Arc<dyn Connections>) -> Self {
        Self {
            connections: Some(connections),
        }
    }

    pub(crate) fn finish(mut self) -> SeahorseResult<()> {
        match self.connections.take() {
            Some(connections) => close_connections(connections.as_ref()),
            None => Ok(()),
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(connections) = self.connections.take() {
            if let Err(error) = close_connections(connections.as_ref()) {
                tracing::warn!(%error, "closing connections failed during unwind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::hooks::{CheckRunner, NoChecks};
    use crate::management::output::OutputBuffer;

    struct Echo {
        transaction: bool,
        checks: CheckScope,
    }

    impl Command for Echo {
        fn help(&self) -> &str {
            "Echo the positional arguments."
        }

        fn requires_system_checks(&self) -> CheckScope {
            self.checks.clone()
        }

        fn output_transaction(&self) -> bool {
            self.transaction
        }

        fn suppressed_base_arguments(&self) -> &[&'static str] {
            &["--version"]
        }

        fn add_arguments(&self, parser: &mut CommandParser) {
            parser.add_argument(Argument::positional("args").nargs(crate::management::parser::Nargs::ZeroOrMore));
        }

        fn handle(&self, _: &mut Streams, args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
            if args.first().map(String::as_str) == Some("fail") {
                return Err(SeahorseError::command_with_code("asked to fail", 4));
            }
            if options.flag("explode") {
                return Err(SeahorseError::invalid_keyword("exploded"));
            }
            Ok(Some(args.join(" ")))
        }
    }

    fn echo() -> Arc<dyn Command> {
        Arc::new(Echo {
            transaction: false,
            checks: CheckScope::All,
        })
    }

    #[derive(Default)]
    struct CountingChecks(AtomicUsize, Mutex<Vec<CheckScope>>);

    impl CheckRunner for CountingChecks {
        fn run_checks(&self, scope: &CheckScope) -> SeahorseResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            self.1.lock().unwrap().push(scope.clone());
            Ok(())
        }
    }

    struct FailingConnections(&'static str);

    impl Connections for FailingConnections {
        fn close_all(&self) -> SeahorseResult<()> {
            match self.0 {
                "ok" => Ok(()),
                message => Err(SeahorseError::command(message)),
            }
        }
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn bound(command: Arc<dyn Command>, hooks: Hooks) -> (BaseCommand, OutputBuffer, OutputBuffer) {
        let out = OutputBuffer::new();
        let err = OutputBuffer::new();
        let base = BaseCommand::new("echo", command, hooks).with_sinks(out.shared(), err.shared());
        (base, out, err)
    }

    #[test]
    fn parser_prog_joins_basename_and_subcommand() {
        let (base, _, _) = bound(echo(), Hooks::default());
        let parser = base.create_parser("/usr/local/bin/seahorse", "echo");
        assert_eq!(parser.prog(), "seahorse echo");
        assert_eq!(base.create_parser("", "echo").prog(), "echo");
    }

    #[test]
    fn suppressed_base_arguments_still_parse() {
        let (base, _, _) = bound(echo(), Hooks::default());
        let parser = base.create_parser("seahorse", "echo");
        assert!(!parser.format_help().contains("--version"));
        assert!(parser.format_help().contains("--verbosity"));
        assert!(matches!(
            parser.parse(&argv(&["--version"])),
            Err(ParseFailure::Display { .. })
        ));
    }

    #[test]
    fn skip_checks_is_only_offered_when_checks_are_required() {
        let (base, _, _) = bound(
            Arc::new(Echo {
                transaction: false,
                checks: CheckScope::none(),
            }),
            Hooks::default(),
        );
        let parser = base.create_parser("seahorse", "echo");
        assert!(parser.arguments().iter().all(|a| a.get_dest() != "skip_checks"));
    }

    #[test]
    fn execute_writes_output_and_returns_raw_result() {
        let (mut base, out, _) = bound(
            Arc::new(Echo {
                transaction: true,
                checks: CheckScope::none(),
            }),
            Hooks::default(),
        );
        let result = base.execute(&argv(&["hello"]), &Options::new()).unwrap();
        assert_eq!(result.as_deref(), Some("hello"));
        assert_eq!(out.contents(), "BEGIN;\nhello\nCOMMIT;\n");
    }

    #[test]
    fn checks_run_unless_skipped() {
        let checks = Arc::new(CountingChecks::default());
        let hooks = Hooks::new(Arc::new(crate::hooks::UnconfiguredConnections), checks.clone());
        let (mut base, _, _) = bound(echo(), hooks);
        base.execute(&[], &Options::new()).unwrap();
        base.execute(&[], &Options::new().with("skip_checks", true)).unwrap();
        base.execute(&[], &Options::new().with("skip_checks", false)).unwrap();
        assert_eq!(checks.0.load(Ordering::SeqCst), 2);
        assert_eq!(checks.1.lock().unwrap()[0], CheckScope::All);
    }

    #[test]
    fn stream_overrides_last_for_one_execution() {
        let (mut base, out, _) = bound(echo(), Hooks::default());
        let other = OutputBuffer::new();
        base.execute(&argv(&["first"]), &Options::new().stdout(other.shared()))
            .unwrap();
        base.execute(&argv(&["second"]), &Options::new()).unwrap();
        assert_eq!(other.contents(), "first\n");
        assert_eq!(out.contents(), "second\n");
    }

    #[test]
    fn conflicting_colour_flags_are_rejected() {
        let (mut base, _, _) = bound(echo(), Hooks::default());
        let err = base
            .execute(&[], &Options::new().with("no_color", true).with("force_color", true))
            .unwrap_err();
        assert!(err.to_string().contains("can't be used together"));
    }

    #[test]
    fn command_errors_become_exit_codes_on_the_argv_path() {
        let (mut base, _, err) = bound(echo(), Hooks::default());
        let code = base.run_from_argv(&argv(&["seahorse", "echo", "fail"])).unwrap();
        assert_eq!(code, 4);
        assert_eq!(err.contents(), "Error: asked to fail\n");
    }

    #[test]
    fn traceback_reraises_command_errors() {
        let (mut base, _, _) = bound(echo(), Hooks::default());
        let err = base
            .run_from_argv(&argv(&["seahorse", "echo", "fail", "--traceback"]))
            .unwrap_err();
        assert_eq!(err.returncode(), 4);
    }

    #[test]
    fn usage_failures_exit_with_two_from_the_command_line() {
        let (mut base, _, err) = bound(echo(), Hooks::default());
        let code = base
            .run_from_argv(&argv(&["seahorse", "echo", "--verbosity", "9"]))
            .unwrap();
        assert_eq!(code, USAGE_RETURNCODE);
        assert!(err.contents().contains("--verbosity"));
    }

    #[test]
    fn version_flag_prints_version_and_succeeds() {
        let (mut base, out, _) = bound(echo(), Hooks::default());
        let code = base.run_from_argv(&argv(&["seahorse", "echo", "--version"])).unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.contents(), format!("{}\n", get_version()));
    }

    #[test]
    fn unconfigured_cleanup_is_swallowed_but_other_failures_propagate() {
        let (mut base, _, _) = bound(echo(), Hooks::default());
        assert_eq!(base.run_from_argv(&argv(&["seahorse", "echo"])).unwrap(), 0);

        let hooks = Hooks::new(Arc::new(FailingConnections("socket closed")), Arc::new(NoChecks));
        let (mut base, _, _) = bound(echo(), hooks);
        let err = base.run_from_argv(&argv(&["seahorse", "echo"])).unwrap_err();
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn stealth_options_include_the_base_sinks() {
        let (base, _, _) = bound(echo(), Hooks::default());
        assert_eq!(base.stealth_options(), vec!["stderr", "stdout"]);
    }
}
