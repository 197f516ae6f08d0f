//! Global error handling.
//!
//! Each sub-crate of the project defines its own type error.
//! Their types are unified here, for example in a main function,
//! when winding results at the top-level.
//!
//! ```no_run
//! use dalvyze::prelude::*;
//! use dalvyze::dex;
//!
//! fn main() -> DzResult<()> { // can return a DzError
//!    let _dex = dex::open("app.json")?; // can return a DexError
//!    Ok(())
//! }
//! ```

use dz_analysis::errors::AnalysisError;
use dz_dex::errors::DexError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DzError`].
pub type DzResult<T> = Result<T, DzError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum DzError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned from [`dz_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from [`dz_dex`] functions.
    #[error(transparent)]
    Dex(#[from] DexError),
}
