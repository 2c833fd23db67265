//! Atomic JSON output file

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LoopDataError, Result};
use crate::generator::{FieldValue, OutputRecord};

/// Writes selected fields of each record to one JSON file
///
/// Every write goes to a temporary file in the same directory which then
/// replaces the target, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileWriter {
    directory: PathBuf,
    path: PathBuf,
    /// (field identifier, output key)
    selection: Vec<(String, String)>,
}

impl JsonFileWriter {
    /// Create the writer, creating `directory` when it does not exist
    pub fn new(
        directory: &Path,
        filename: &str,
        fields: &[String],
        rename: &BTreeMap<String, String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(directory).map_err(|e| {
            LoopDataError::Config(format!(
                "Failed to create output directory {:?}: {}",
                directory, e
            ))
        })?;

        let mut selection: Vec<(String, String)> = fields
            .iter()
            .map(|field| (field.clone(), field.clone()))
            .collect();
        selection.extend(rename.iter().map(|(f, k)| (f.clone(), k.clone())));

        Ok(Self {
            directory: directory.to_path_buf(),
            path: directory.join(filename),
            selection,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply the field selection and renames to `record`
    pub fn select(&self, record: &OutputRecord) -> BTreeMap<String, FieldValue> {
        self.selection
            .iter()
            .filter_map(|(field, key)| record.get(field).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Write the selected part of `record`
    pub fn write(&self, record: &OutputRecord) -> Result<()> {
        let selected = self.select(record);
        let mut file = NamedTempFile::new_in(&self.directory)?;
        serde_json::to_writer(&mut file, &selected)?;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| LoopDataError::Io(e.error))?;
        debug!("Wrote {} fields to {:?}", selected.len(), self.path);
        Ok(())
    }
}
