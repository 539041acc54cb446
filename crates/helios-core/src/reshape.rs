// crates/helios-core/src/reshape.rs
//
// Structural transforms: stacking per-plant tables, unit conversion, the
// timestamp join, and the wide-to-long melt.

use polars::prelude::*;
use tracing::warn;

use crate::error::{EtlError, Result};

/// How `melt_to_long` treats a value column whose name does not decompose
/// into a plant prefix and metric suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeltMode {
    /// Fail with a schema error.
    Strict,
    /// Emit null `Plant`/`Metric` for that column and log a warning.
    #[default]
    Lenient,
}

/// Vertically concatenates same-schema tables, tagging rows with a constant
/// `Plant` label per source table unless the table already carries one.
/// Source order is preserved, both across and within tables.
pub fn combine(tables: &[DataFrame], plant_labels: &[&str]) -> Result<DataFrame> {
    if tables.is_empty() {
        return Ok(DataFrame::default());
    }

    let mut tagged: Vec<DataFrame> = Vec::with_capacity(tables.len());
    for (idx, table) in tables.iter().enumerate() {
        let mut df = table.clone();
        if df.column("Plant").is_err() {
            let label = plant_labels.get(idx).copied().ok_or_else(|| {
                EtlError::InvalidArgument(format!(
                    "no plant label provided for source table {idx}"
                ))
            })?;
            df.with_column(Series::new("Plant".into(), vec![label; df.height()]))?;
        }
        tagged.push(df);
    }

    let column_order: Vec<String> = tagged[0]
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut combined = tagged.remove(0);
    for df in tagged {
        let aligned = df.select(column_order.iter().map(|s| s.as_str()))?;
        combined.vstack_mut(&aligned)?;
    }
    Ok(combined)
}

/// Per-plant energy columns, detected by naming convention: a `UP` prefix and
/// an energy unit somewhere in the name.
pub fn detect_energy_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .filter(|name| {
            name.starts_with("UP") && (name.contains("kWh") || name.contains("MWh"))
        })
        .map(|name| name.to_string())
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Divides the named numeric columns by `factor` (kWh -> MWh at the default
/// factor of 1000). Absent or non-numeric columns are left untouched.
pub fn convert_units(df: &DataFrame, columns: &[String], factor: f64) -> Result<DataFrame> {
    let mut out = df.clone();
    for name in columns {
        let Ok(column) = out.column(name) else {
            continue;
        };
        if !is_numeric(column.dtype()) {
            continue;
        }
        let cast = column.cast(&DataType::Float64)?;
        let ca = cast.f64()?;
        let converted: Vec<Option<f64>> =
            (0..ca.len()).map(|idx| ca.get(idx).map(|v| v / factor)).collect();
        out.with_column(Series::new(name.as_str().into(), converted))?;
    }
    Ok(out)
}

/// Left join on the timestamp key. Left rows without a match keep nulls for
/// the right table's columns; duplicate keys on the right multiply rows,
/// which is standard relational behavior and accepted here.
pub fn merge_on_timestamp(left: &DataFrame, right: &DataFrame, key: &str) -> Result<DataFrame> {
    let joined = left
        .clone()
        .lazy()
        .join(
            right.clone().lazy(),
            &[col(key)],
            &[col(key)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(joined)
}

/// Splits a wide column name into its plant prefix (`UP<digits>`) and the
/// underscore-separated metric remainder.
fn decompose_plant_metric(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix("UP")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let metric = rest[digits.len()..].strip_prefix('_')?;
    if metric.is_empty() {
        return None;
    }
    Some((format!("UP{digits}"), metric.to_string()))
}

/// Melts wide per-plant-metric columns into long records: one output row per
/// (input row, value column), with `Plant`, `Metric` and a Float64 `Value`.
///
/// When `Plant` is already one of the id columns (combined PVSyst data), the
/// full column name becomes the metric and no prefix decomposition happens.
pub fn melt_to_long(
    df: &DataFrame,
    id_columns: &[String],
    value_columns: &[String],
    mode: MeltMode,
) -> Result<DataFrame> {
    if value_columns.is_empty() {
        return Ok(DataFrame::default());
    }

    let plant_in_ids = id_columns.iter().any(|name| name == "Plant");
    let height = df.height();
    let mut combined: Option<DataFrame> = None;

    for value_col in value_columns {
        let (plant, metric) = if plant_in_ids {
            (None, Some(value_col.clone()))
        } else {
            match decompose_plant_metric(value_col) {
                Some((plant, metric)) => (Some(plant), Some(metric)),
                None => match mode {
                    MeltMode::Strict => {
                        return Err(EtlError::Schema(format!(
                            "column '{value_col}' does not match the UP<n>_<metric> pattern"
                        )));
                    }
                    MeltMode::Lenient => {
                        warn!(column = %value_col, "column name does not decompose into plant/metric");
                        (None, None)
                    }
                },
            }
        };

        let mut columns: Vec<Column> = Vec::with_capacity(id_columns.len() + 3);
        for id in id_columns {
            columns.push(df.column(id)?.clone());
        }

        if !plant_in_ids {
            let plant_values: Vec<Option<&str>> = vec![plant.as_deref(); height];
            columns.push(Series::new("Plant".into(), plant_values).into());
        }
        let metric_values: Vec<Option<&str>> = vec![metric.as_deref(); height];
        columns.push(Series::new("Metric".into(), metric_values).into());

        let mut value = df.column(value_col)?.cast(&DataType::Float64)?;
        value.rename("Value".into());
        columns.push(value);

        let frame = DataFrame::new(columns)?;
        match combined.as_mut() {
            Some(acc) => acc.vstack_mut(&frame).map(|_| ())?,
            None => combined = Some(frame),
        }
    }

    Ok(combined.unwrap_or_default())
}
