use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

use crate::table::{Table, empty_schema};

/// One CSV file per sheet name under a cache directory. Missing files read
/// back as the sheet's predefined empty schema. No locking: single-user,
/// single-process usage.
#[derive(Debug, Clone)]
pub struct SheetCache {
    dir: PathBuf,
}

impl SheetCache {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    pub fn read(&self, name: &str) -> Result<Table> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(empty_schema(name));
        }
        Table::read_csv_file(&path)
    }

    pub fn write(&self, name: &str, table: &Table) -> Result<()> {
        table.write_csv_file(&self.file_path(name))
    }

    pub fn invalidate(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete cache file {}", path.display()))?;
        }
        Ok(())
    }

    /// Delete every cache file in the directory.
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read cache directory {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "csv") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Age of the cache file since its last modification, or `None` when no
    /// file exists. Drives the freshness policy.
    pub fn age(&self, name: &str) -> Result<Option<Duration>> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat cache file {}", path.display()))?;
        // Clock skew can put mtime in the future; treat that as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(Some(age))
    }
}
