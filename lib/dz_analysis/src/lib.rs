//! This crate provides the Dalvik bytecode analysis engine of the `Dalvyze` project:
//! class hierarchy resolution, register type inference, bytecode verification and
//! deodexing of optimized instructions.

pub mod accessors;
pub mod analyzer;
pub mod classpath;
pub mod config;
pub mod deodex;
pub mod errors;
pub mod register_type;
pub mod uids;
pub mod vtables;

#[cfg(test)]
pub(crate) mod testing;

use crate::analyzer::MethodAnalyzer;
use crate::classpath::ClassPath;
use crate::deodex::DeodexUtil;
use crate::errors::AnalysisResult;
use dz_dex::methods::EncodedMethod;
use dz_dex::Dex;

/// Runs the type inference then the verification of a method, returning the analyzer
/// holding the results.
pub fn analyze_and_verify<'a>(
    class_path: &'a ClassPath,
    dex: &mut Dex,
    method: &EncodedMethod,
    deodex: Option<&'a DeodexUtil>,
) -> AnalysisResult<MethodAnalyzer<'a>> {
    let mut analyzer = MethodAnalyzer::new(class_path, dex, method, deodex)?;
    analyzer.analyze(dex)?;
    analyzer.verify(dex)?;
    Ok(analyzer)
}
