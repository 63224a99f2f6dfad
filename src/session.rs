//! The one loaded dataset, owned by the caller and passed to every page.

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::data::filter::{apply_filters, Predicate};
use crate::data::loader::load_bytes;
use crate::data::model::Table;

const UNNAMED_DATASET: &str = "Uploaded Dataset";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no dataset loaded; open a file first")]
    NoDataset,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    table: Option<Table>,
    file_name: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` and make the result the current dataset. On failure
    /// the previous dataset stays in place.
    pub fn load(&mut self, file_name: &str, bytes: &[u8]) -> Result<&Table> {
        let table = load_bytes(file_name, bytes)?;
        log::info!(
            "session dataset {file_name}: {} rows x {} columns",
            table.n_rows(),
            table.n_cols()
        );
        self.file_name = Some(file_name.to_string());
        Ok(self.table.insert(table))
    }

    pub fn load_path(&mut self, path: &Path) -> Result<&Table> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load(&name, &bytes)
    }

    pub fn table(&self) -> Result<&Table, SessionError> {
        self.table.as_ref().ok_or(SessionError::NoDataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.file_name().unwrap_or(UNNAMED_DATASET)
    }

    /// The loaded table narrowed by `predicates`. The stored table is never
    /// modified.
    pub fn working_table(&self, predicates: &[Predicate]) -> Result<Table, SessionError> {
        Ok(apply_filters(self.table()?, predicates))
    }
}
