//! Analysis errors definition.

use dz_dex::errors::DexError;
use dz_dex::Addr;
use regex::Error as RegexError;
use std::fmt;
use std::io;
use thiserror::Error;

/// An alias for result that can be an [`AnalysisError`].
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("dex error: {0}")]
    Dex(#[from] DexError),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("configuration format error: {0}")]
    Json(#[from] serde_json::Error),

    /// A class, superclass, interface or member could not be resolved.
    #[error("{0}")]
    Resolution(String),

    /// The bytecode violates a verification rule.
    #[error("{0}")]
    Validation(ValidationError),

    /// Invalid setup of the class path or of the deodexing support.
    #[error("{0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub(crate) fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(ValidationError::new(message))
    }

    pub(crate) fn resolution<S: Into<String>>(message: S) -> Self {
        Self::Resolution(message.into())
    }

    pub(crate) fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Prefixes the error message with some context, keeping the error kind.
    #[must_use]
    pub fn context<S: fmt::Display>(self, context: S) -> Self {
        match self {
            Self::Resolution(msg) => Self::Resolution(format!("{context}: {msg}")),
            Self::Config(msg) => Self::Config(format!("{context}: {msg}")),
            Self::Validation(mut err) => {
                err.message = format!("{context}: {}", err.message);
                Self::Validation(err)
            }
            other => other,
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// A verification failure, together with the location it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code_address: Option<Addr>,
    pub opcode: Option<String>,
    pub method: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            code_address: None,
            opcode: None,
            method: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(method) = &self.method {
            write!(f, "\n    method: {method}")?;
        }
        if let (Some(addr), Some(opcode)) = (self.code_address, &self.opcode) {
            write!(f, "\n    opcode: {opcode} (code address {addr})")?;
        }
        Ok(())
    }
}

/// Shortcut for returning a validation failure.
pub(crate) fn invalid<T, S: Into<String>>(message: S) -> AnalysisResult<T> {
    Err(AnalysisError::validation(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let err = AnalysisError::resolution("Could not find definition for class La;")
            .context("Error while loading ClassPath class La;");
        assert!(matches!(err, AnalysisError::Resolution(_)));
        assert_eq!(
            err.to_string(),
            "Error while loading ClassPath class La;: Could not find definition for class La;"
        );

        let err = AnalysisError::validation("boom").context("outer");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "outer: boom");
    }

    #[test]
    fn validation_display() {
        let mut err = ValidationError::new("Invalid register type (Unknown) for register v1.");
        err.code_address = Some(Addr(4));
        err.opcode = Some("move".to_string());
        err.method = Some("La;->f()V".to_string());
        let s = err.to_string();
        assert!(s.starts_with("Invalid register type"));
        assert!(s.contains("La;->f()V"));
        assert!(s.contains("move (code address 0x4)"));
    }
}
