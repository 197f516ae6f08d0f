//! Dex errors definitions.

use crate::Addr;
use std::{fmt, io};
use thiserror::Error;

/// An alias for result that can be a [`DexError`].
pub type DexResult<T> = Result<T, DexError>;

/// The Dex error type.
#[derive(Debug, Error)]
pub enum DexError {
    /// Error that can be returned when doing [std::io](I/O) operations.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when formatting dex parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Error that can be returned when (de)serializing containers.
    #[error("container format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dex structure is invalid: {0}")]
    Structure(String),

    #[error("resource not found in dex tables: {0}")]
    ResNotFound(String),

    #[error("could not convert {} into {}", from, to)]
    Conversion { from: String, to: String },

    /// The container is readable but holds no class definitions at all.
    #[error("container has no classes")]
    NoClasses,

    #[error("Instruction not found (address: {0})")]
    InstructionNotFound(Addr),
}
