//! Seahorse error handling.
//!
//! Every failure the dispatcher can produce is a [`SeahorseError`]. The
//! variants follow the management-command taxonomy: usage problems found by
//! the option parser, business-rule failures raised by a command, lookups of
//! undeclared subcommands, bad keyword options on the programmatic path and
//! the "not configured" signal from the connection cleanup hook.
//!
//! Nothing in the library terminates the process. Callers turn errors into
//! exit codes with [`SeahorseError::returncode`] and render them with
//! [`print_error`].

use miette::Diagnostic;
use thiserror::Error;

/// Return code used when a `CommandError` does not carry its own.
pub const DEFAULT_RETURNCODE: i32 = 1;

/// Exit status of a usage failure on the command line.
pub const USAGE_RETURNCODE: i32 = 2;

/// Unified error type for all Seahorse failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum SeahorseError {
    /// Bad or missing arguments reported by the option parser.
    #[error("{message}")]
    #[diagnostic(code(seahorse::usage))]
    Usage {
        message: String,
        /// Full rendered parser output (error line, usage and hint).
        usage: String,
    },

    /// A problem while executing a command.
    #[error("{message}")]
    #[diagnostic(code(seahorse::command))]
    Command { message: String, returncode: i32 },

    /// Serious issues reported by the system check runner.
    #[error("{message}")]
    #[diagnostic(code(seahorse::system_check))]
    SystemCheck { message: String },

    #[error("Unknown command: '{name}'")]
    #[diagnostic(
        code(seahorse::unknown_command),
        help("run the `help --commands` subcommand to list the available commands")
    )]
    UnknownCommand { name: String },

    /// Keyword options the programmatic path cannot map onto the parser.
    #[error("{message}")]
    #[diagnostic(code(seahorse::invalid_keyword))]
    InvalidKeyword { message: String },

    /// A collaborator was used before it was configured.
    #[error("{message}")]
    #[diagnostic(code(seahorse::improperly_configured))]
    ImproperlyConfigured { message: String },

    #[error(transparent)]
    #[diagnostic(code(seahorse::io))]
    Io(#[from] std::io::Error),
}

impl SeahorseError {
    /// A `CommandError` with the default return code.
    pub fn command(message: impl Into<String>) -> Self {
        Self::command_with_code(message, DEFAULT_RETURNCODE)
    }

    pub fn command_with_code(message: impl Into<String>, returncode: i32) -> Self {
        SeahorseError::Command {
            message: message.into(),
            returncode,
        }
    }

    pub fn system_check(message: impl Into<String>) -> Self {
        SeahorseError::SystemCheck {
            message: message.into(),
        }
    }

    pub fn unknown_command(name: impl Into<String>) -> Self {
        SeahorseError::UnknownCommand { name: name.into() }
    }

    pub fn invalid_keyword(message: impl Into<String>) -> Self {
        SeahorseError::InvalidKeyword {
            message: message.into(),
        }
    }

    pub fn improperly_configured(message: impl Into<String>) -> Self {
        SeahorseError::ImproperlyConfigured {
            message: message.into(),
        }
    }

    /// True for failures of the `CommandError` family, which the argv path
    /// reports as a message instead of a full diagnostic.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            SeahorseError::Command { .. } | SeahorseError::SystemCheck { .. }
        )
    }

    /// Process exit status for this error.
    pub fn returncode(&self) -> i32 {
        match self {
            SeahorseError::Command { returncode, .. } => *returncode,
            SeahorseError::Usage { .. } => USAGE_RETURNCODE,
            _ => DEFAULT_RETURNCODE,
        }
    }
}

/// Result alias used across the crate.
pub type SeahorseResult<T> = Result<T, SeahorseError>;

/// Prints a SeahorseError with full miette diagnostics.
///
/// This is the "traceback" rendering: the error code, message and any help
/// text. Use it for errors that escape the dispatcher.
pub fn print_error(error: SeahorseError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_carries_returncode() {
        let err = SeahorseError::command_with_code("boom", 3);
        assert_eq!(err.returncode(), 3);
        assert!(err.is_command_error());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn system_check_is_a_command_error() {
        let err = SeahorseError::system_check("SystemCheckError: 1 issue");
        assert!(err.is_command_error());
        assert_eq!(err.returncode(), DEFAULT_RETURNCODE);
    }

    #[test]
    fn unknown_command_quotes_the_name() {
        let err = SeahorseError::unknown_command("bogus");
        assert_eq!(err.to_string(), "Unknown command: 'bogus'");
        assert!(!err.is_command_error());
        assert_eq!(err.returncode(), 1);
    }

    #[test]
    fn usage_errors_exit_with_two() {
        let err = SeahorseError::Usage {
            message: "the following required arguments were not provided".into(),
            usage: String::new(),
        };
        assert_eq!(err.returncode(), USAGE_RETURNCODE);
    }
}
