// crates/helios-core/src/keys.rs
//
// Grouping keys derived from the canonical timestamp. Two rows with the same
// `DateTime` always get identical keys, which is what makes `key_month`
// usable as the categorical group for imputation.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use polars::prelude::*;

use crate::datetime::{column_datetimes, DATETIME_COLUMN};
use crate::error::{EtlError, Result};

/// Adds `key` (`dd_mm_yyyy_HH`), `key_m` (`dd_mm_yyyy_HH_MM`) and `key_month`
/// (`mm_yyyy`) columns, all zero-padded. Null timestamps produce null keys.
pub fn calculate_keys(df: &DataFrame, datetime_col: &str) -> Result<DataFrame> {
    let stamps = column_datetimes(df, datetime_col)?;

    if df.height() > 0 && stamps.iter().all(Option::is_none) {
        return Err(EtlError::Schema(format!(
            "column '{datetime_col}' contains no parseable timestamps"
        )));
    }

    let mut key = Vec::with_capacity(stamps.len());
    let mut key_m = Vec::with_capacity(stamps.len());
    let mut key_month = Vec::with_capacity(stamps.len());

    for stamp in &stamps {
        match stamp {
            Some(dt) => {
                let date_part = format!("{:02}_{:02}_{:04}", dt.day(), dt.month(), dt.year());
                key.push(Some(format!("{date_part}_{:02}", dt.hour())));
                key_m.push(Some(format!(
                    "{date_part}_{:02}_{:02}",
                    dt.hour(),
                    dt.minute()
                )));
                key_month.push(Some(format!("{:02}_{:04}", dt.month(), dt.year())));
            }
            None => {
                key.push(None);
                key_m.push(None);
                key_month.push(None);
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Series::new("key".into(), key))?;
    out.with_column(Series::new("key_m".into(), key_m))?;
    out.with_column(Series::new("key_month".into(), key_month))?;
    Ok(out)
}

/// Applies `calculate_keys` to every table that carries the canonical
/// timestamp column; tables without one pass through unmodified.
pub fn generate_keys(tables: HashMap<String, DataFrame>) -> Result<HashMap<String, DataFrame>> {
    let mut out = HashMap::with_capacity(tables.len());
    for (name, df) in tables {
        let keyed = if df.column(DATETIME_COLUMN).is_ok() {
            calculate_keys(&df, DATETIME_COLUMN)?
        } else {
            df
        };
        out.insert(name, keyed);
    }
    Ok(out)
}
