//! Rule store abstraction and the TOML directory loader.
//!
//! Rules are administered externally; the engine only ever loads the active
//! set at run start. The [`RuleStore`] trait hides where the records live:
//! a rules directory of TOML files here, a database table in `sentra-db`.

use crate::error::{Result, RuleError};
use crate::rule::RuleRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source of active rule records.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Load every active rule record.
    async fn load_active_rules(&self) -> Result<Vec<RuleRecord>>;
}

/// File shape for TOML rule definitions: an array of `[[rule]]` tables.
#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleRecord>,
}

/// Loader for rule definitions from a directory of TOML files.
pub struct TomlRuleStore {
    /// Base directory containing rule definition files
    definitions_dir: PathBuf,
}

impl TomlRuleStore {
    /// Create a new store reading from the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(RuleError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Load all rule records from the definitions directory.
    ///
    /// Files that fail to parse are logged as warnings and skipped; one bad
    /// file must not take down the rest of the rule set.
    pub fn load_all(&self) -> Result<Vec<RuleRecord>> {
        let mut records = Vec::new();

        Self::walk_and_load_recursive(&self.definitions_dir, &mut records)?;

        info!(
            count = records.len(),
            dir = %self.definitions_dir.display(),
            "loaded rule definitions"
        );

        Ok(records)
    }

    /// Recursively walk directory and load all TOML files.
    fn walk_and_load_recursive(dir: &Path, records: &mut Vec<RuleRecord>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::walk_and_load_recursive(&path, records)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match Self::load_from_path(&path) {
                    Ok(mut file_records) => {
                        debug!(
                            path = %path.display(),
                            count = file_records.len(),
                            "loaded rule definition file"
                        );
                        records.append(&mut file_records);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to load rule definition file"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Load rule records from a specific file path.
    fn load_from_path(path: &Path) -> Result<Vec<RuleRecord>> {
        let contents = std::fs::read_to_string(path)?;

        let file: RuleFile = toml::from_str(&contents).map_err(|e| RuleError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(file.rules)
    }
}

#[async_trait]
impl RuleStore for TomlRuleStore {
    async fn load_active_rules(&self) -> Result<Vec<RuleRecord>> {
        Ok(self.load_all()?.into_iter().filter(|r| r.active).collect())
    }
}

/// In-memory rule store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    records: Vec<RuleRecord>,
}

impl MemoryRuleStore {
    /// Create a store holding the given records.
    #[must_use]
    pub fn new(records: Vec<RuleRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn load_active_rules(&self) -> Result<Vec<RuleRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }
}
