//! Boot class path entries lookup.

use crate::errors::{AnalysisError, AnalysisResult};
use dz_dex::errors::DexError;
use dz_dex::{ContainerLoader, Dex};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref DALVIK_CACHE_ODEX: Regex =
        Regex::new(r"@([^@]+)@classes\.dex$").expect("dalvik cache regex");
}

const EXTENSIONS: [&str; 4] = [".odex", ".jar", ".apk", ".zip"];

fn candidates(dir: &Path, entry: &str) -> Vec<PathBuf> {
    let base = entry.rfind('.').map_or(entry, |idx| &entry[..idx]);
    let mut paths = vec![dir.join(entry)];
    paths.extend(EXTENSIONS.iter().map(|ext| dir.join(format!("{base}{ext}"))));
    paths
}

/// Searches the given directories for a loadable container matching the boot entry.
///
/// The first loadable candidate wins. Unreadable files and files without any class are
/// skipped, any other loading failure aborts the search.
pub(crate) fn locate(
    dirs: &[PathBuf],
    entry: &str,
    loader: &dyn ContainerLoader,
) -> AnalysisResult<(PathBuf, Dex)> {
    for dir in dirs {
        for path in candidates(dir, entry) {
            if !path.is_file() {
                continue;
            }
            if let Err(err) = File::open(&path) {
                warn!(
                    "cannot open {} for reading ({err}), will continue looking",
                    path.display()
                );
                continue;
            }
            match loader.load(&path) {
                Ok(dex) => {
                    debug!("boot class path entry {entry} found at {}", path.display());
                    return Ok((path, dex));
                }
                Err(DexError::NoClasses) => {
                    debug!("skipping {}: no classes", path.display());
                }
                Err(err) => {
                    return Err(AnalysisError::config(format!(
                        "Error while reading boot class path entry \"{entry}\".: {err}"
                    )))
                }
            }
        }
    }
    Err(AnalysisError::config(format!(
        "Cannot locate boot class path file {entry}"
    )))
}

/// Turns the dependency list of an odex container into boot class path entries.
pub(crate) fn odex_boot_entries(dependencies: &[String]) -> AnalysisResult<Vec<String>> {
    dependencies
        .iter()
        .map(|dependency| {
            if dependency.ends_with(".odex") {
                let name = dependency
                    .rfind('/')
                    .map_or(dependency.as_str(), |idx| &dependency[idx + 1..]);
                Ok(name.to_string())
            } else if let Some(caps) = DALVIK_CACHE_ODEX.captures(dependency) {
                Ok(caps[1].to_string())
            } else {
                Err(AnalysisError::config(format!(
                    "Cannot parse dependency value {dependency}"
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dz_dex::classes::{ClassDefItem, ClassFlags};
    use dz_dex::JsonLoader;

    fn container_with_class(name: &str) -> Dex {
        let mut dex = Dex::new();
        let t = dex.intern_type(name);
        dex.add_class(ClassDefItem::new(t, ClassFlags::ACC_PUBLIC));
        dex
    }

    #[test]
    fn odex_dependencies() {
        let entries = odex_boot_entries(&[
            "/system/framework/core.odex".to_string(),
            "/data/dalvik-cache/system@framework@ext.jar@classes.dex".to_string(),
        ])
        .unwrap();
        assert_eq!(entries, vec!["core.odex", "ext.jar"]);

        let err = odex_boot_entries(&["/system/framework/core.jar".to_string()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot parse dependency value /system/framework/core.jar"
        );
    }

    #[test]
    fn extension_fallback() {
        let dir = tempfile::tempdir().unwrap();
        dz_dex::save(&container_with_class("LA;"), dir.path().join("core.jar")).unwrap();

        let (path, dex) = locate(&[dir.path().to_path_buf()], "core.odex", &JsonLoader).unwrap();
        assert_eq!(path, dir.path().join("core.jar"));
        assert!(dex.find_class_def("LA;").is_some());
    }

    #[test]
    fn empty_containers_are_skipped() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        dz_dex::save(&Dex::new(), first.path().join("core.jar")).unwrap();
        dz_dex::save(&container_with_class("LB;"), second.path().join("core.jar")).unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let (path, _) = locate(&dirs, "core.jar", &JsonLoader).unwrap();
        assert_eq!(path, second.path().join("core.jar"));

        let err = locate(&dirs, "missing.jar", &JsonLoader).unwrap_err();
        assert_eq!(err.to_string(), "Cannot locate boot class path file missing.jar");
    }

    #[test]
    fn corrupted_container_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.jar"), "not json").unwrap();
        let err = locate(&[dir.path().to_path_buf()], "core.jar", &JsonLoader).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Error while reading boot class path entry \"core.jar\"."));
    }
}
