// crates/helios-core/src/clean.rs
//
// Statistical cleaning: sparsity-gated missing-value imputation, sign
// correction for polarity-flipped meter readings, and IQR outlier rejection.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::warn;

use crate::error::{EtlError, Result};

/// Imputation strategy for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    Mean,
    Median,
    Ffill,
    Bfill,
}

impl std::str::FromStr for FillStrategy {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(FillStrategy::Mean),
            "median" => Ok(FillStrategy::Median),
            "ffill" => Ok(FillStrategy::Ffill),
            "bfill" => Ok(FillStrategy::Bfill),
            other => Err(EtlError::InvalidArgument(format!(
                "unsupported fill strategy '{other}'"
            ))),
        }
    }
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

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Linear-interpolation quantile over a sorted, non-empty sample.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
    }
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let cast = df.column(name)?.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok((0..ca.len()).map(|idx| ca.get(idx)).collect())
}

/// Group labels for the grouping column; nulls stay out of every group and
/// fall back to the table-wide statistic.
fn group_labels(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    if let Ok(ca) = column.str() {
        return Ok((0..ca.len())
            .map(|idx| ca.get(idx).map(|s| s.to_string()))
            .collect());
    }
    (0..column.len())
        .map(|idx| match column.get(idx)? {
            AnyValue::Null => Ok(None),
            av => Ok(Some(av.to_string())),
        })
        .collect()
}

fn directional_fill(values: &mut [Option<f64>], indices: &[usize], strategy: FillStrategy) {
    match strategy {
        FillStrategy::Ffill => {
            let mut last = None;
            for &idx in indices {
                match values[idx] {
                    Some(v) => last = Some(v),
                    None => values[idx] = last,
                }
            }
        }
        FillStrategy::Bfill => {
            let mut next = None;
            for &idx in indices.iter().rev() {
                match values[idx] {
                    Some(v) => next = Some(v),
                    None => values[idx] = next,
                }
            }
        }
        _ => {}
    }
}

fn drop_null_rows(df: &DataFrame) -> Result<DataFrame> {
    let height = df.height();
    let mut keep = vec![true; height];
    for column in df.get_columns() {
        for (idx, flag) in keep.iter_mut().enumerate() {
            if *flag && matches!(column.get(idx)?, AnyValue::Null) {
                *flag = false;
            }
        }
    }
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Fills missing values, or drops null-bearing rows outright when the worst
/// per-column null fraction is below `sparsity_threshold` (below-threshold
/// sparsity is treated as negligible and discarded rather than imputed).
///
/// Numeric columns are imputed per group when `group_column` is given, with a
/// deterministic fallback to the table-wide statistic for groups that yield
/// no usable value. Non-numeric columns take their mode, or `"Unknown"` when
/// entirely null.
pub fn fill_missing(
    df: &DataFrame,
    strategy: FillStrategy,
    group_column: Option<&str>,
    sparsity_threshold: f64,
) -> Result<DataFrame> {
    let height = df.height();
    if height == 0 {
        return Ok(df.clone());
    }

    let max_null_ratio = df
        .get_columns()
        .iter()
        .map(|c| c.null_count() as f64 / height as f64)
        .fold(0.0, f64::max);

    if max_null_ratio < sparsity_threshold {
        return drop_null_rows(df);
    }

    let group_column = group_column.filter(|name| df.column(name).is_ok());
    let groups: Option<Vec<Option<String>>> = match group_column {
        Some(name) => Some(group_labels(df, name)?),
        None => None,
    };

    let mut out = df.clone();
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    for name in &names {
        let column = out.column(name)?;
        if column.null_count() == 0 {
            continue;
        }

        if is_numeric(column.dtype()) {
            let mut values = column_f64(&out, name)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let global = match strategy {
                FillStrategy::Mean | FillStrategy::Ffill | FillStrategy::Bfill => mean(&present),
                FillStrategy::Median => median(&present),
            };

            match (&groups, strategy) {
                (Some(labels), FillStrategy::Mean | FillStrategy::Median) => {
                    let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();
                    for (idx, label) in labels.iter().enumerate() {
                        if let (Some(label), Some(v)) = (label.as_deref(), values[idx]) {
                            grouped.entry(label).or_default().push(v);
                        }
                    }
                    let stats: HashMap<&str, Option<f64>> = grouped
                        .into_iter()
                        .map(|(label, vals)| {
                            let stat = if strategy == FillStrategy::Mean {
                                mean(&vals)
                            } else {
                                median(&vals)
                            };
                            (label, stat)
                        })
                        .collect();
                    for (idx, slot) in values.iter_mut().enumerate() {
                        if slot.is_none() {
                            let fill = labels[idx]
                                .as_deref()
                                .and_then(|label| stats.get(label).copied().flatten())
                                .or(global);
                            *slot = fill;
                        }
                    }
                }
                (Some(labels), FillStrategy::Ffill | FillStrategy::Bfill) => {
                    let mut index_groups: HashMap<&str, Vec<usize>> = HashMap::new();
                    for (idx, label) in labels.iter().enumerate() {
                        if let Some(label) = label.as_deref() {
                            index_groups.entry(label).or_default().push(idx);
                        }
                    }
                    for indices in index_groups.values() {
                        directional_fill(&mut values, indices, strategy);
                    }
                    // Entirely-null groups, and rows whose group label is
                    // null, take the table-wide statistic.
                    for slot in values.iter_mut() {
                        if slot.is_none() {
                            *slot = global;
                        }
                    }
                }
                (None, FillStrategy::Mean | FillStrategy::Median) => {
                    for slot in values.iter_mut() {
                        if slot.is_none() {
                            *slot = global;
                        }
                    }
                }
                (None, FillStrategy::Ffill | FillStrategy::Bfill) => {
                    let indices: Vec<usize> = (0..height).collect();
                    directional_fill(&mut values, &indices, strategy);
                }
            }

            out.with_column(Series::new(name.as_str().into(), values))?;
        } else if matches!(column.dtype(), DataType::String) {
            let ca = column.str()?;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for idx in 0..ca.len() {
                if let Some(v) = ca.get(idx) {
                    *counts.entry(v).or_insert(0) += 1;
                }
            }
            // Ties break toward the lexicographically smallest value so the
            // result is deterministic.
            let mode = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(v, _)| v.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let filled: Vec<String> = (0..ca.len())
                .map(|idx| ca.get(idx).map(str::to_string).unwrap_or_else(|| mode.clone()))
                .collect();
            out.with_column(Series::new(name.as_str().into(), filled))?;
        } else {
            warn!(column = %name, dtype = %column.dtype(), "skipping imputation for unsupported dtype");
        }
    }

    Ok(out)
}

/// Replaces negative readings with their absolute value in the named columns.
/// Import/export meters occasionally report sign-flipped values when the
/// wiring polarity convention differs between plants. Absent columns are
/// silently skipped; integer columns keep their dtype.
pub fn fix_negatives(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut out = df.clone();
    for name in columns {
        let Ok(column) = out.column(name) else {
            continue;
        };
        let dtype = column.dtype().clone();
        if !is_numeric(&dtype) {
            continue;
        }
        let values: Vec<Option<f64>> = column_f64(&out, name)?
            .into_iter()
            .map(|opt| opt.map(f64::abs))
            .collect();
        let series = Series::new(name.as_str().into(), values).cast(&dtype)?;
        out.with_column(series)?;
    }
    Ok(out)
}

/// IQR outlier filter: keeps rows whose value lies inside
/// [Q1 - threshold * IQR, Q3 + threshold * IQR]. Rows with a null in the
/// target column are dropped with the outliers. Absent or non-numeric
/// columns make this a no-op. A zero-variance column keeps every row.
pub fn remove_outliers(df: &DataFrame, column: &str, threshold: f64) -> Result<DataFrame> {
    let Ok(target) = df.column(column) else {
        return Ok(df.clone());
    };
    if !is_numeric(target.dtype()) {
        return Ok(df.clone());
    }

    let values = column_f64(df, column)?;
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return Ok(df.clone());
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - threshold * iqr;
    let upper = q3 + threshold * iqr;

    let keep: Vec<bool> = values
        .iter()
        .map(|opt| opt.is_some_and(|v| v >= lower && v <= upper))
        .collect();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}
