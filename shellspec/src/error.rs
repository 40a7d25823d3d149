//! Error handling for shellspec.

use thiserror::Error;

/// The main error type for shellspec operations.
///
/// Every variant is fatal for the call that produced it: no stage of the
/// pipeline returns partial argv.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed specification (missing main command, bad command name, ...).
    #[error("invalid specification: {0}")]
    InvalidSpecification(String),
    /// A command path segment or version selector has no match.
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// A `required` argument has no usable value.
    #[error("missing required config: `{0}`")]
    MissingRequiredConfig(String),
    /// `with` / `withAll` unsatisfied.
    #[error("{0}")]
    CoOccurrenceViolation(String),
    /// `without` / `aka` conflict.
    #[error("{0}")]
    MutualExclusionViolation(String),
    /// Resolved value outside the declared `choices`.
    #[error("{0}")]
    InvalidChoice(String),
    /// A token type the emitter cannot render.
    #[error("invalid argument type: {0}")]
    InvalidArgumentType(String),
    /// A value-bearing flag that a concatenation policy cannot express.
    #[error("{0}")]
    InvalidConcatenation(String),
    /// The specification or configuration document could not be deserialized.
    #[error("parse error: {0}")]
    Parse(String),
    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_spec<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSpecification(msg.into())
    }

    pub fn command_not_found<S: Into<String>>(msg: S) -> Self {
        Self::CommandNotFound(msg.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

/// A Result type alias for shellspec operations.
pub type Result<T> = std::result::Result<T, Error>;
