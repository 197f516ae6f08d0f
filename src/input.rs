use crate::prelude::*;
use clap::ArgMatches;
use dz_dex::JsonLoader;
use log::{debug, info};

/// Container given on the command line, with the class path configuration it is
/// analyzed against.
pub struct Input {
    pub name: String,
    pub dex: Dex,
    pub config: ClassPathConfig,
}

impl Input {
    pub fn open(args: &ArgMatches) -> DzResult<Self> {
        let name = args
            .get_one::<String>("input")
            .ok_or_else(|| DzError::BadArguments("--input needed".to_string()))?;
        let config = match args.get_one::<String>("config") {
            Some(path) => ClassPathConfig::from_file(path)?,
            None => ClassPathConfig::default(),
        };
        let dex = dz_dex::open(name)?;
        Ok(Self {
            name: name.clone(),
            dex,
            config,
        })
    }

    /// Builds the class path, taking boot entries from the container dependencies when
    /// it is an odex.
    pub fn class_path(&self) -> DzResult<ClassPath> {
        let class_path = if self.dex.odex_dependencies().is_some() {
            info!("initializing class path from odex dependencies");
            ClassPath::initialize_from_odex(&self.config, &self.name, &self.dex, &JsonLoader)?
        } else {
            ClassPath::initialize(&self.config, &self.name, &self.dex, &JsonLoader)?
        };
        Ok(class_path)
    }

    /// Deodexing support, needed for odex containers or when an inline table is
    /// configured. Odex containers default to the version 35 table.
    pub fn deodex_util(&self, class_path: &ClassPath) -> DzResult<Option<DeodexUtil>> {
        let util = match (&self.config.inline_table, self.dex.odex_dependencies()) {
            (Some(table), _) => Some(DeodexUtil::from_inline_table(table, class_path)?),
            (None, Some(_)) => Some(DeodexUtil::for_odex_version(35)?),
            (None, None) => None,
        };
        debug!("deodexing support: {}", util.is_some());
        Ok(util)
    }
}
