//! Option parser adapter for management commands.
//!
//! A [`CommandParser`] is a declarative list of [`Argument`]s, mutually
//! exclusive groups and nested sub-parsers. Parsing is delegated to `clap`;
//! the adapter adds two things on top of it:
//!
//! - parse failures come back as a tagged [`ParseFailure`] and
//!   [`CommandParser::usage_error`] routes them either to a usage error for
//!   the command line or to a catchable `CommandError` for programmatic
//!   callers, depending on `called_from_command_line`;
//! - the declarations stay introspectable, which `call_command` relies on to
//!   rebuild an argv from keyword options.
//!
//! Values come back as an [`Options`] bag keyed by destination name.

use clap::builder::{PossibleValuesParser, TypedValueParser, ValueParser};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches};

use crate::errors::SeahorseError;
use crate::management::value::{Options, Value};

/// Options listed after all command-specific options in help output.
pub const SHOW_LAST: &[&str] = &[
    "--version",
    "--verbosity",
    "--traceback",
    "--no-color",
    "--force-color",
    "--skip-checks",
];

const SHOW_LAST_OFFSET: usize = 1000;

// ============================================================================
// ARGUMENT DECLARATIONS
// ============================================================================

/// What happens when an option appears on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Store the given value(s).
    Store,
    StoreTrue,
    StoreFalse,
    StoreConst(Value),
    /// Append each occurrence's value(s) to a list.
    Append,
    AppendConst(Value),
    /// Count occurrences.
    Count,
    /// Report the carried version string and stop.
    Version(String),
}

impl Action {
    /// Whether the option consumes value tokens.
    pub fn takes_value(&self) -> bool {
        matches!(self, Action::Store | Action::Append)
    }
}

/// How many value tokens an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
    Exactly(usize),
    /// Everything that is left, flags included.
    Remainder,
}

impl Nargs {
    fn is_single(self) -> bool {
        matches!(self, Nargs::One | Nargs::Optional)
    }
}

/// Type of the values an argument accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Str,
    Int,
}

/// One declared option or positional argument.
#[derive(Debug, Clone)]
pub struct Argument {
    flags: Vec<String>,
    dest: String,
    action: Action,
    nargs: Nargs,
    value_type: ValueType,
    default: Value,
    required: bool,
    choices: Vec<String>,
    help: Option<String>,
    hidden: bool,
    metavar: Option<String>,
}

impl Argument {
    /// An option spelled by `flags`, e.g. `["-v", "--verbosity"]`.
    ///
    /// The destination is taken from the first long flag (dashes become
    /// underscores), falling back to the first short one. Single-dash flags
    /// longer than one character are registered as long flags.
    pub fn option<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags: Vec<String> = flags.into_iter().map(|f| normalize_flag(f.into())).collect();
        let dest = flags
            .iter()
            .find(|f| f.starts_with("--"))
            .or_else(|| flags.first())
            .map(|f| f.trim_start_matches('-').replace('-', "_"))
            .unwrap_or_default();
        Self::with_flags(flags, dest)
    }

    /// A positional argument stored under `name`.
    pub fn positional(name: impl Into<String>) -> Self {
        Self::with_flags(Vec::new(), name.into())
    }

    fn with_flags(flags: Vec<String>, dest: String) -> Self {
        Self {
            flags,
            dest,
            action: Action::Store,
            nargs: Nargs::One,
            value_type: ValueType::Str,
            default: Value::Null,
            required: false,
            choices: Vec::new(),
            help: None,
            hidden: false,
            metavar: None,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        match &action {
            Action::StoreTrue if self.default.is_null() => self.default = Value::Bool(false),
            Action::StoreFalse if self.default.is_null() => self.default = Value::Bool(true),
            Action::Version(_) => self.default = Value::Bool(false),
            _ => {}
        }
        self.action = action;
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = nargs;
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Keeps the argument parseable but out of help output.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn get_dest(&self) -> &str {
        &self.dest
    }

    pub fn get_action(&self) -> &Action {
        &self.action
    }

    pub fn get_default(&self) -> &Value {
        &self.default
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_positional(&self) -> bool {
        self.flags.is_empty()
    }

    /// Positionals are required unless they accept zero values.
    pub fn is_required(&self) -> bool {
        if self.is_positional() {
            !matches!(self.nargs, Nargs::Optional | Nargs::ZeroOrMore | Nargs::Remainder)
        } else {
            self.required
        }
    }

    pub fn takes_value(&self) -> bool {
        self.is_positional() || self.action.takes_value()
    }

    /// The flag used when rebuilding an argv: the lexicographically smallest.
    pub fn canonical_flag(&self) -> Option<&str> {
        self.flags.iter().min().map(String::as_str)
    }

    /// The shortest flag, ties broken lexicographically.
    pub fn shortest_flag(&self) -> Option<&str> {
        self.flags
            .iter()
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(String::as_str)
    }

    fn is_show_last(&self) -> bool {
        self.flags.iter().any(|f| SHOW_LAST.contains(&f.as_str()))
    }

    fn to_clap(&self, id: String, display_order: usize) -> Arg {
        let mut arg = Arg::new(id).display_order(display_order).hide(self.hidden);
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }

        let mut has_long = false;
        let mut has_short = false;
        for flag in &self.flags {
            if let Some(long) = flag.strip_prefix("--") {
                arg = if has_long {
                    arg.visible_alias(long.to_string())
                } else {
                    arg.long(long.to_string())
                };
                has_long = true;
            } else if let Some(short) = flag.strip_prefix('-').and_then(|s| s.chars().next()) {
                arg = if has_short {
                    arg.visible_short_alias(short)
                } else {
                    arg.short(short)
                };
                has_short = true;
            }
        }

        arg = arg.required(self.is_required());
        if !self.takes_value() {
            return arg.action(ArgAction::Count);
        }

        let action = match self.action {
            Action::Append => ArgAction::Append,
            _ => ArgAction::Set,
        };
        arg = arg
            .action(action)
            .value_parser(self.value_parser())
            .value_name(
                self.metavar
                    .clone()
                    .unwrap_or_else(|| self.dest.to_uppercase()),
            );
        match self.nargs {
            Nargs::One => arg.num_args(1),
            Nargs::Optional => arg.num_args(0..=1),
            Nargs::ZeroOrMore => arg.num_args(0..),
            Nargs::OneOrMore => arg.num_args(1..),
            Nargs::Exactly(n) => arg.num_args(n),
            Nargs::Remainder => arg
                .num_args(0..)
                .allow_hyphen_values(true)
                .trailing_var_arg(true),
        }
    }

    fn value_parser(&self) -> ValueParser {
        match (self.value_type, self.choices.is_empty()) {
            (ValueType::Str, true) => ValueParser::string(),
            (ValueType::Str, false) => PossibleValuesParser::new(self.choices.clone()).into(),
            (ValueType::Int, true) => clap::value_parser!(i64).into(),
            (ValueType::Int, false) => PossibleValuesParser::new(self.choices.clone())
                .map(|s| s.parse::<i64>().unwrap_or_default())
                .into(),
        }
    }

    fn extract(&self, id: &str, matches: &ArgMatches) -> Result<Value, ParseFailure> {
        if !self.takes_value() {
            let count = matches
                .try_get_one::<u8>(id)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(0);
            if count == 0 {
                return Ok(self.default.clone());
            }
            return Ok(match &self.action {
                Action::Version(version) => {
                    return Err(ParseFailure::Display {
                        text: format!("{version}\n"),
                    })
                }
                Action::StoreTrue => Value::Bool(true),
                Action::StoreFalse => Value::Bool(false),
                Action::StoreConst(value) => value.clone(),
                Action::AppendConst(value) => {
                    let mut items = self.default_items();
                    items.extend(std::iter::repeat(value.clone()).take(usize::from(count)));
                    Value::List(items)
                }
                _ => Value::Int(self.default.as_int().unwrap_or(0) + i64::from(count)),
            });
        }

        let Some(occurrences) = self.collect_occurrences(id, matches) else {
            if self.default.is_null() && !self.nargs.is_single() && self.is_positional() {
                return Ok(Value::List(Vec::new()));
            }
            return Ok(self.default.clone());
        };
        Ok(match self.action {
            Action::Append => {
                let mut items = self.default_items();
                if self.nargs.is_single() {
                    items.extend(occurrences.into_iter().flatten());
                } else {
                    // One sub-list per occurrence of the flag.
                    items.extend(occurrences.into_iter().map(Value::List));
                }
                Value::List(items)
            }
            _ if self.nargs.is_single() => occurrences
                .into_iter()
                .flatten()
                .next()
                .unwrap_or_default(),
            _ => Value::List(occurrences.into_iter().flatten().collect()),
        })
    }

    /// Values given on the command line, grouped by occurrence.
    fn collect_occurrences(&self, id: &str, matches: &ArgMatches) -> Option<Vec<Vec<Value>>> {
        if matches.value_source(id) != Some(ValueSource::CommandLine) {
            return None;
        }
        let occurrences = match self.value_type {
            ValueType::Str => matches
                .try_get_occurrences::<String>(id)
                .ok()
                .flatten()
                .map(|occ| occ.map(|values| values.cloned().map(Value::Str).collect()).collect()),
            ValueType::Int => matches
                .try_get_occurrences::<i64>(id)
                .ok()
                .flatten()
                .map(|occ| occ.map(|values| values.copied().map(Value::Int).collect()).collect()),
        };
        Some(occurrences.unwrap_or_default())
    }

    fn default_items(&self) -> Vec<Value> {
        match &self.default {
            Value::List(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

fn normalize_flag(flag: String) -> String {
    if !flag.starts_with("--") && flag.starts_with('-') && flag.chars().count() > 2 {
        format!("-{flag}")
    } else {
        flag
    }
}

// ============================================================================
// PARSE RESULTS
// ============================================================================

/// Why a parse did not produce an options bag.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseFailure {
    /// Missing or invalid arguments.
    Usage { message: String, usage: String },
    /// The invocation asked for help or version text instead of a run.
    Display { text: String },
}

impl ParseFailure {
    fn from_clap(err: clap::Error) -> Self {
        let rendered = err.to_string();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                ParseFailure::Display { text: rendered }
            }
            _ => {
                // The error paragraph ends at the first blank line; the
                // usage block follows it.
                let message = rendered
                    .lines()
                    .take_while(|line| !line.trim().is_empty())
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim_start_matches("error: ")
                    .to_string();
                ParseFailure::Usage {
                    message,
                    usage: rendered,
                }
            }
        }
    }
}

// ============================================================================
// COMMAND PARSER
// ============================================================================

#[derive(Debug, Clone)]
struct ExclusiveGroup {
    required: bool,
    members: Vec<usize>,
}

/// Declarative parser for one management command.
#[derive(Debug, Clone)]
pub struct CommandParser {
    prog: String,
    description: Option<String>,
    missing_args_message: Option<String>,
    called_from_command_line: bool,
    arguments: Vec<Argument>,
    groups: Vec<ExclusiveGroup>,
    subparsers: Option<SubParsers>,
}

impl CommandParser {
    pub fn new(prog: impl Into<String>) -> Self {
        Self {
            prog: prog.into(),
            description: None,
            missing_args_message: None,
            called_from_command_line: false,
            arguments: Vec::new(),
            groups: Vec::new(),
            subparsers: None,
        }
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    /// Message reported when no positional token was supplied at all.
    pub fn missing_args_message(mut self, message: Option<String>) -> Self {
        self.missing_args_message = message;
        self
    }

    pub fn called_from_command_line(mut self, called: bool) -> Self {
        self.called_from_command_line = called;
        self
    }

    pub fn prog(&self) -> &str {
        &self.prog
    }

    pub fn is_called_from_command_line(&self) -> bool {
        self.called_from_command_line
    }

    pub fn add_argument(&mut self, argument: Argument) -> &mut Self {
        self.arguments.push(argument);
        self
    }

    /// Starts a group of options of which at most one (exactly one when
    /// `required`) may be given.
    pub fn add_mutually_exclusive_group(&mut self, required: bool) -> ExclusiveGroupBuilder<'_> {
        self.groups.push(ExclusiveGroup {
            required,
            members: Vec::new(),
        });
        let group = self.groups.len() - 1;
        ExclusiveGroupBuilder {
            parser: self,
            group,
        }
    }

    /// Adds nested sub-parsers; the chosen name is stored under `dest`.
    /// Children inherit this parser's error routing.
    pub fn add_subparsers(&mut self, dest: impl Into<String>, required: bool) -> &mut SubParsers {
        let subparsers = SubParsers {
            dest: dest.into(),
            required,
            prog: self.prog.clone(),
            called_from_command_line: self.called_from_command_line,
            parsers: Vec::new(),
        };
        self.subparsers.insert(subparsers)
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn subparsers(&self) -> Option<&SubParsers> {
        self.subparsers.as_ref()
    }

    /// Every declared argument, including those of nested sub-parsers.
    pub fn actions(&self) -> Vec<&Argument> {
        let mut actions: Vec<&Argument> = self.arguments.iter().collect();
        if let Some(subparsers) = &self.subparsers {
            for (_, parser) in &subparsers.parsers {
                actions.extend(parser.actions());
            }
        }
        actions
    }

    /// Members of the mutually exclusive groups marked as required.
    pub fn required_group_members(&self) -> Vec<&Argument> {
        self.groups
            .iter()
            .filter(|group| group.required)
            .flat_map(|group| group.members.iter().map(|&i| &self.arguments[i]))
            .collect()
    }

    /// Parses `tokens` (program and subcommand names excluded).
    pub fn parse(&self, tokens: &[String]) -> Result<Options, ParseFailure> {
        if let Some(message) = &self.missing_args_message {
            if tokens.iter().all(|token| token.starts_with('-')) {
                return Err(ParseFailure::Usage {
                    message: message.clone(),
                    usage: format!("error: {message}\n\n{}\n", self.format_usage()),
                });
            }
        }

        let matches = self
            .clap_command()
            .no_binary_name(true)
            .try_get_matches_from(tokens)
            .map_err(ParseFailure::from_clap)?;

        let mut options = Options::new();
        self.extract_into(&matches, &mut options)?;
        if !options.contains("args") {
            options.insert("args", Value::List(Vec::new()));
        }
        Ok(options)
    }

    /// Routes a usage failure according to how the parser was invoked.
    pub fn usage_error(&self, message: String, usage: String) -> SeahorseError {
        if self.called_from_command_line {
            SeahorseError::Usage { message, usage }
        } else {
            SeahorseError::command(format!("Error: {message}"))
        }
    }

    pub fn format_help(&self) -> String {
        self.clap_command().render_help().to_string()
    }

    pub fn format_usage(&self) -> String {
        self.clap_command().render_usage().to_string()
    }

    fn extract_into(&self, matches: &ArgMatches, options: &mut Options) -> Result<(), ParseFailure> {
        for (index, argument) in self.arguments.iter().enumerate() {
            let value = argument.extract(&arg_id(index, argument), matches)?;
            // The first declaration of a shared destination provides the
            // default; any later one only overrides it when actually given.
            if options.contains(argument.get_dest()) && value == *argument.get_default() {
                continue;
            }
            options.insert(argument.get_dest(), value);
        }
        if let Some(subparsers) = &self.subparsers {
            match matches.subcommand() {
                Some((name, sub_matches)) => {
                    options.insert(subparsers.dest.clone(), name);
                    if let Some(parser) = subparsers.get(name) {
                        parser.extract_into(sub_matches, options)?;
                    }
                }
                None => {
                    options.insert(subparsers.dest.clone(), Value::Null);
                }
            }
        }
        Ok(())
    }

    fn clap_command(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.prog.clone())
            .bin_name(self.prog.clone())
            .disable_help_subcommand(true);
        if let Some(description) = &self.description {
            cmd = cmd.about(description.clone());
        }

        for (index, argument) in self.arguments.iter().enumerate() {
            let order = if argument.is_show_last() {
                SHOW_LAST_OFFSET + index
            } else {
                index
            };
            cmd = cmd.arg(argument.to_clap(arg_id(index, argument), order));
        }

        for (index, group) in self.groups.iter().enumerate() {
            let ids: Vec<String> = group
                .members
                .iter()
                .map(|&i| arg_id(i, &self.arguments[i]))
                .collect();
            cmd = cmd.group(
                ArgGroup::new(format!("__group{index}"))
                    .args(ids)
                    .multiple(false)
                    .required(group.required),
            );
        }

        if let Some(subparsers) = &self.subparsers {
            for (name, parser) in &subparsers.parsers {
                cmd = cmd.subcommand(parser.clap_command().name(name.clone()));
            }
            cmd = cmd.subcommand_required(subparsers.required);
        }
        cmd
    }
}

fn arg_id(index: usize, argument: &Argument) -> String {
    format!("{}@{index}", argument.get_dest())
}

/// Adds arguments to one mutually exclusive group.
pub struct ExclusiveGroupBuilder<'a> {
    parser: &'a mut CommandParser,
    group: usize,
}

impl ExclusiveGroupBuilder<'_> {
    pub fn add_argument(&mut self, argument: Argument) -> &mut Self {
        self.parser.arguments.push(argument);
        let index = self.parser.arguments.len() - 1;
        self.parser.groups[self.group].members.push(index);
        self
    }
}

/// The sub-parsers attached to a [`CommandParser`].
#[derive(Debug, Clone)]
pub struct SubParsers {
    dest: String,
    required: bool,
    prog: String,
    called_from_command_line: bool,
    parsers: Vec<(String, CommandParser)>,
}

impl SubParsers {
    /// Adds a sub-parser named `name` that inherits the parent's error routing.
    pub fn add_parser(&mut self, name: impl Into<String>, help: Option<String>) -> &mut CommandParser {
        let name = name.into();
        let parser = CommandParser::new(format!("{} {name}", self.prog))
            .description(help)
            .called_from_command_line(self.called_from_command_line);
        self.parsers.push((name, parser));
        let last = self.parsers.len() - 1;
        &mut self.parsers[last].1
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn get(&self, name: &str) -> Option<&CommandParser> {
        self.parsers
            .iter()
            .find(|(parser_name, _)| parser_name == name)
            .map(|(_, parser)| parser)
    }

    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|(name, _)| name.as_str()).collect()
    }
}
