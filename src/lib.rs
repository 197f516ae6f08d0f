//! # `Dalvyze`
//!
//! `dalvyze` is the main crate of the `Dalvyze` Dalvik bytecode analysis project.
//! The project is subdivided into multiple crates, `dalvyze` acts as entry point
//! by reexporting important structs and functions from those sub-crates. Most of
//! the reexport are done within the `dalvyze::prelude` namespace.
//!
//! ## Library basics
//!
//! A container is opened with the `dz_dex` API, then resolved against a class
//! path before its methods can be analyzed:
//!
//! ```no_run
//! use dalvyze::prelude::*;
//! use dalvyze::dex;
//!
//! let mut app = dex::open("app.json")?;
//! let config = ClassPathConfig::from_file("classpath.json")?;
//! let session = AnalysisSession::new();
//! let class_path = session.install(ClassPath::initialize(&config, "app.json", &app, &dex::JsonLoader)?)?;
//!
//! let methods: Vec<_> = app
//!     .iter_class_defs()
//!     .filter_map(|class| class.class_data())
//!     .flat_map(|data| data.iter_methods())
//!     .filter(|method| method.code().is_some())
//!     .cloned()
//!     .collect();
//! for method in &methods {
//!     let analyzer = dalvyze::analysis::analyze_and_verify(class_path, &mut app, method, None)?;
//!     println!("{}: {:?}", analyzer.method_string(), analyzer.analysis_state());
//! }
//! # Ok::<(), DzError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`dz_dex`] contains the decoded bytecode model: instructions, id pools,
//!    class definitions and the container loader,
//!  - [`dz_analysis`] contains the class path, the register type analysis and
//!    verification, and the deodexing support.

mod errors;

pub mod cli;
pub mod dz_deodex;
pub mod dz_vtables;
pub mod input;

pub use dz_analysis as analysis;
pub use dz_dex as dex;

/// Reexport module of commonly used structures and functions from `Dalvyze` project
/// sub-crates:
///
/// ```rust
/// use dalvyze::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DzError, DzResult};

    pub use dz_analysis::analyzer::{AnalysisState, MethodAnalyzer};
    pub use dz_analysis::classpath::{AnalysisSession, ClassPath};
    pub use dz_analysis::config::{ClassPathConfig, InlineTable};
    pub use dz_analysis::deodex::DeodexUtil;

    pub use dz_dex::{Addr, Dex};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DZ_LOG", "info")
            .write_style("DZ_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
