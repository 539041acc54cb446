// crates/helios-core/src/sources.rs

use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{EtlError, Result};

/// A tabular data source. The pipeline only ever depends on this trait, never
/// on a concrete source, so remote sources can slot in behind the same seam.
pub trait DataSource {
    fn load(&self, path: &Path) -> Result<DataFrame>;
}

/// Local-file source for CSV exports. Spreadsheet exports are converted to
/// CSV upstream of this pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl FileSource {
    pub fn new() -> Self {
        FileSource
    }
}

/// Placeholder headers that spreadsheet exporters leave behind for blank or
/// auxiliary columns.
fn is_placeholder_column(name: &str) -> bool {
    name.is_empty() || name.starts_with("Unnamed")
}

impl DataSource for FileSource {
    fn load(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(EtlError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mut df = match extension.as_str() {
            "csv" => CsvReadOptions::default()
                .with_has_header(true)
                .with_ignore_errors(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?,
            other => {
                return Err(EtlError::UnsupportedFormat(format!(
                    "'{other}' (expected .csv; export spreadsheets to CSV first)"
                )));
            }
        };

        let placeholders: Vec<String> = df
            .get_column_names()
            .iter()
            .filter(|name| is_placeholder_column(name))
            .map(|name| name.to_string())
            .collect();
        for name in placeholders {
            debug!(column = %name, path = %path.display(), "dropping placeholder column");
            df = df.drop(&name)?;
        }

        Ok(df)
    }
}
