use crate::error::{Error, Result};
use std::{collections::HashMap, fs, path::Path};

/// Named SQL queries, usually loaded from a directory of `.sql` files
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    queries: HashMap<String, String>,
}

impl QueryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.sql` file of `dir`, named after the file stem
    /// (`sessions.sql` becomes `sessions`). Other entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or one of the query files cannot
    /// be read
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new();

        for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "sql") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping query file with a non UTF-8 name");
                continue;
            };

            let sql = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            registry.insert(name, sql);
        }

        tracing::debug!(dir = %dir.display(), queries = registry.len(), "custom queries loaded");

        Ok(registry)
    }

    /// Surrounding whitespace and a trailing `;` are stripped, prepared
    /// statements take a single statement
    pub fn insert(&mut self, name: impl Into<String>, sql: impl AsRef<str>) {
        let sql = sql.as_ref().trim();
        let sql = sql.strip_suffix(';').unwrap_or(sql).trim_end();
        self.queries.insert(name.into(), sql.to_string());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(String::as_str)
    }

    /// Query names in alphabetical order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
