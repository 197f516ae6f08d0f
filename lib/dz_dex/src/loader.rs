//! Container loading.

use crate::errors::{DexError, DexResult};
use crate::Dex;
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Something able to turn a file into a decoded [`Dex`] container.
///
/// Implementations return [`DexError::NoClasses`] for readable files holding no class
/// definitions, which callers searching a boot class path are expected to skip.
pub trait ContainerLoader {
    fn load(&self, path: &Path) -> DexResult<Dex>;
}

/// Loader for containers serialized in JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl ContainerLoader for JsonLoader {
    fn load(&self, path: &Path) -> DexResult<Dex> {
        debug!("loading container {}", path.display());
        let file = File::open(path)?;
        let dex: Dex = serde_json::from_reader(BufReader::new(file))?;
        if dex.class_defs_count() == 0 {
            return Err(DexError::NoClasses);
        }
        Ok(dex)
    }
}

/// Open and parses the given container path.
pub fn open<P: AsRef<Path>>(path: P) -> DexResult<Dex> {
    JsonLoader.load(path.as_ref())
}

/// Writes the container at the given path.
pub fn save<P: AsRef<Path>>(dex: &Dex, path: P) -> DexResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), dex)?;
    Ok(())
}
