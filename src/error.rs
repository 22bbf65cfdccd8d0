//! Error types for secretstruct operations

use crate::variable::VariableError;
use std::fmt;
use thiserror::Error;

/// The main error type for secretstruct operations
///
/// Collection errors (`InvalidInput`, `UnsupportedFieldType`) abort a call
/// before any variable is opened. Everything else is produced by a single
/// resolution unit and reaches the caller wrapped in [`SecretStructError::Field`].
#[derive(Error, Debug)]
pub enum SecretStructError {
    #[error("input param must be a secret struct")]
    InvalidInput,
    #[error("field {field} ({type_name}): unsupported field type")]
    UnsupportedFieldType { field: String, type_name: String },
    #[error("open variable {locator}: {source}")]
    Open {
        locator: String,
        #[source]
        source: VariableError,
    },
    #[error("fetch latest value: {0}")]
    Fetch(#[source] VariableError),
    #[error("latest value is nil")]
    InvalidLatestValue,
    #[error("can't use value of type {type_name}, must be bytes or string: type mismatch")]
    TypeMismatch { type_name: String },
    #[error("close variable: {0}")]
    Close(#[source] VariableError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("processing field {field:?} failed: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<SecretStructError>,
    },
    #[error("{}", Joined(.0))]
    Multiple(Vec<SecretStructError>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A type alias for `Result<T, SecretStructError>`
pub type Result<T> = std::result::Result<T, SecretStructError>;

struct Joined<'a>(&'a [SecretStructError]);

impl fmt::Display for Joined<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl SecretStructError {
    /// Wraps `self` with the name of the field whose processing failed.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        SecretStructError::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Combines two errors, keeping `self` as the primary one.
    ///
    /// Nested aggregates are flattened so that [`errors`](Self::errors) always
    /// yields leaf errors.
    pub fn combine(self, other: SecretStructError) -> Self {
        let mut errors = self.into_errors();
        errors.extend(other.into_errors());
        SecretStructError::Multiple(errors)
    }

    /// Merges `other` into `result` without ever discarding either failure.
    ///
    /// * both `Ok`: `Ok(())`
    /// * one `Err`: that error
    /// * both `Err`: a [`Multiple`](SecretStructError::Multiple) with `result`'s error first
    pub fn append(result: Result<()>, other: Result<()>) -> Result<()> {
        match (result, other) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Err(first), Err(second)) => Err(first.combine(second)),
        }
    }

    /// Builds the error for a set of failures, `None` if there were none.
    pub fn from_errors(mut errors: Vec<SecretStructError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(SecretStructError::Multiple(errors)),
        }
    }

    /// Returns the underlying error, looking through field wrappers and
    /// taking the primary cause of an aggregate.
    pub fn root(&self) -> &SecretStructError {
        match self {
            SecretStructError::Field { source, .. } => source.root(),
            SecretStructError::Multiple(errors) => match errors.first() {
                Some(primary) => primary.root(),
                None => self,
            },
            other => other,
        }
    }

    /// Name of the field this error is attributed to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            SecretStructError::Field { field, .. } => Some(field),
            SecretStructError::Multiple(errors) => errors.first().and_then(|e| e.field()),
            SecretStructError::UnsupportedFieldType { field, .. } => Some(field),
            _ => None,
        }
    }

    /// All causes carried by this error, primary first.
    pub fn errors(&self) -> Vec<&SecretStructError> {
        match self {
            SecretStructError::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    /// True if this error stems from cancellation or an expired deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.root(),
            SecretStructError::Cancelled | SecretStructError::DeadlineExceeded
        )
    }

    fn into_errors(self) -> Vec<SecretStructError> {
        match self {
            SecretStructError::Multiple(errors) => errors,
            other => vec![other],
        }
    }
}
