// crates/helios-core/src/schema.rs

use std::collections::HashMap;

use polars::prelude::*;

use crate::error::Result;

/// Renames columns according to the mapping; columns without an entry pass
/// through unchanged. Completeness is deliberately not validated, so upstream
/// schema drift surfaces as unmapped (and later unmelted) columns rather than
/// a hard failure.
pub fn rename_columns(df: &DataFrame, mapping: &HashMap<&str, &str>) -> Result<DataFrame> {
    let mut existing: Vec<String> = Vec::new();
    let mut renamed: Vec<String> = Vec::new();

    for name in df.get_column_names() {
        if let Some(new_name) = mapping.get(name.as_str()) {
            existing.push(name.to_string());
            renamed.push((*new_name).to_string());
        }
    }

    if existing.is_empty() {
        return Ok(df.clone());
    }

    let out = df.clone().lazy().rename(existing, renamed, true).collect()?;
    Ok(out)
}
