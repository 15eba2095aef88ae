//! Error types for declaration, binding and parsing.
//!
//! Every failure aborts the current parse pass and is returned unchanged to
//! the caller of [`Parser::run_args`](crate::Parser::run_args). Cells that were
//! already resolved keep their values.

use optbind_env::EnvError;
use thiserror::Error;

use crate::ValueKind;

/// Boxed error returned by command actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while declaring options or parsing input.
#[derive(Debug, Error)]
pub enum Error {
    /// Strict mode met an option or leftover token with no declaration.
    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    /// A process argument is not valid UTF-8. Carries a lossy rendering.
    #[error("argument is not valid unicode: {0}")]
    NonUnicodeArgument(String),

    /// A value-taking option reached end of input or had an empty `=` value.
    #[error("missing value for option {0}")]
    MissingValue(String),

    /// A value is not a member of the option's declared choice set.
    #[error("invalid value '{value}' for option {option}: expected one of {}", .choices.join(", "))]
    InvalidChoice {
        option: String,
        value: String,
        choices: Vec<String>,
    },

    /// The binder met an unsupported field, a malformed directive or a
    /// duplicate identity.
    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    /// A string could not be converted to the option's type.
    #[error("invalid value '{value}' for option {option}: expected {expected}")]
    TypeCoercion {
        option: String,
        value: String,
        expected: ValueKind,
    },

    /// An option, operand or command declaration is malformed.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// A manifest file could not be read or does not describe a valid parser.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// The environment source failed to load.
    #[error(transparent)]
    Env(#[from] EnvError),

    /// A command's run action returned an error.
    #[error("command `{command}` failed: {source}")]
    Action {
        command: String,
        source: ActionError,
    },
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
