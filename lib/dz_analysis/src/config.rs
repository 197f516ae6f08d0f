//! Class path and deodexing configuration.

use crate::errors::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Which inline method table `execute-inline` instructions are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineTable {
    /// Built-in table of the given odex version.
    Version(u32),
    /// Custom table file, one method descriptor per line.
    File(PathBuf),
}

/// Setup of a class path session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassPathConfig {
    /// Directories searched for boot class path entries, in order.
    pub dirs: Vec<PathBuf>,
    pub boot_entries: Vec<String>,
    pub extra_entries: Vec<String>,
    pub check_package_private_access: bool,
    pub inline_table: Option<InlineTable>,
    pub api_level: Option<u32>,
}

impl ClassPathConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let path = path.as_ref();
        log::debug!("loading class path configuration {}", path.display());
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    #[must_use]
    pub fn with_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_boot_entry<S: Into<String>>(mut self, entry: S) -> Self {
        self.boot_entries.push(entry.into());
        self
    }

    #[must_use]
    pub fn with_extra_entry<S: Into<String>>(mut self, entry: S) -> Self {
        self.extra_entries.push(entry.into());
        self
    }

    #[must_use]
    pub const fn with_package_private_access_check(mut self, check: bool) -> Self {
        self.check_package_private_access = check;
        self
    }

    #[must_use]
    pub fn with_inline_table(mut self, table: InlineTable) -> Self {
        self.inline_table = Some(table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_uses_defaults() {
        let config: ClassPathConfig = serde_json::from_str(
            r#"{ "dirs": ["/system/framework"], "inline_table": { "version": 36 } }"#,
        )
        .unwrap();
        assert_eq!(config.dirs, vec![PathBuf::from("/system/framework")]);
        assert!(config.boot_entries.is_empty());
        assert!(!config.check_package_private_access);
        assert_eq!(config.inline_table, Some(InlineTable::Version(36)));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "boot_entries": ["core.jar"], "check_package_private_access": true }}"#
        )
        .unwrap();
        let config = ClassPathConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config,
            ClassPathConfig::new()
                .with_boot_entry("core.jar")
                .with_package_private_access_check(true)
        );
        assert!(ClassPathConfig::from_file("/nonexistent/config.json").is_err());
    }

    #[test]
    fn builder_round_trip() {
        let config = ClassPathConfig::new()
            .with_dir("/system/framework")
            .with_boot_entry("core.jar")
            .with_extra_entry("services.jar")
            .with_inline_table(InlineTable::File(PathBuf::from("inline.txt")));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""inline_table":{"file":"inline.txt"}"#));
        let parsed: ClassPathConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
