// crates/helios-core/src/datetime.rs
//
// Normalizes heterogeneous date/time exports into one canonical `DateTime`
// column (Datetime, microseconds, no timezone) and derives calendar fields
// from it. Individual unparseable values degrade to null; only a missing
// column is an error.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::*;

use crate::error::{EtlError, Result};

/// Canonical timestamp column name shared across the pipeline.
pub const DATETIME_COLUMN: &str = "DateTime";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Prioritized time formats: 12-hour meridiem first, then 24-hour variants.
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%H:%M:%S", "%H:%M"];

/// A single format wins when it parses more than this share of non-null rows.
const FORMAT_ACCEPT_RATIO: f64 = 0.8;

/// Calendar resolution levels, coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Resolution {
    const ALL: [Resolution; 6] = [
        Resolution::Year,
        Resolution::Month,
        Resolution::Day,
        Resolution::Hour,
        Resolution::Minute,
        Resolution::Second,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Resolution::Year => "year",
            Resolution::Month => "month",
            Resolution::Day => "day",
            Resolution::Hour => "hour",
            Resolution::Minute => "minute",
            Resolution::Second => "second",
        }
    }

    /// Levels from `year` up to and including `self`.
    pub fn levels_through(self) -> &'static [Resolution] {
        let end = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        &Self::ALL[..=end]
    }
}

impl std::str::FromStr for Resolution {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.column_name() == s)
            .ok_or_else(|| EtlError::InvalidArgument(format!("unknown resolution '{s}'")))
    }
}

fn parse_date_value(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    // PVSyst monthly reports stamp rows as bare `YYYY-MM`.
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").ok()
}

fn parse_time_with(raw: &str, fmt: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), fmt).ok()
}

fn parse_time_value(raw: &str) -> Option<NaiveTime> {
    for fmt in TIME_FORMATS {
        if let Some(time) = parse_time_with(raw, fmt) {
            return Some(time);
        }
    }
    parse_time_with(raw, "%H:%M:%S%.f")
}

fn micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

fn from_micros(value: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_micros(value).map(|dt| dt.naive_utc())
}

/// Reads a column as dates, tolerating string, Date, and Datetime inputs.
fn column_dates(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let column = df
        .column(name)
        .map_err(|_| EtlError::Schema(format!("column '{name}' not found")))?;

    match column.dtype() {
        DataType::String => {
            let ca = column.str()?;
            Ok((0..ca.len())
                .map(|idx| ca.get(idx).and_then(parse_date_value))
                .collect())
        }
        DataType::Date | DataType::Datetime(_, _) => {
            let cast = column.cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
            let ca = cast.datetime()?;
            Ok((0..ca.len())
                .map(|idx| ca.get(idx).and_then(from_micros).map(|dt| dt.date()))
                .collect())
        }
        other => Err(EtlError::Schema(format!(
            "column '{name}' has unsupported dtype {other} for date parsing"
        ))),
    }
}

/// Reads a column as timestamps, re-parsing defensively so the operation is
/// idempotent on already-normalized columns.
pub(crate) fn column_datetimes(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let column = df
        .column(name)
        .map_err(|_| EtlError::Schema(format!("column '{name}' not found")))?;

    match column.dtype() {
        DataType::String => {
            let ca = column.str()?;
            Ok((0..ca.len())
                .map(|idx| {
                    ca.get(idx).and_then(|raw| {
                        let trimmed = raw.trim();
                        DATETIME_FORMATS
                            .iter()
                            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                            .or_else(|| {
                                parse_date_value(trimmed)
                                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                            })
                    })
                })
                .collect())
        }
        DataType::Date | DataType::Datetime(_, _) => {
            let cast = column.cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
            let ca = cast.datetime()?;
            Ok((0..ca.len()).map(|idx| ca.get(idx).and_then(from_micros)).collect())
        }
        other => Err(EtlError::Schema(format!(
            "column '{name}' has unsupported dtype {other} for datetime parsing"
        ))),
    }
}

pub(crate) fn datetime_series(name: &str, stamps: &[Option<NaiveDateTime>]) -> Result<Series> {
    let raw: Vec<Option<i64>> = stamps.iter().map(|opt| opt.map(micros)).collect();
    let series = Series::new(name.into(), raw)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok(series)
}

/// Parses a time column, selecting the first prioritized format that clears
/// the acceptance ratio over non-null rows, with a free-form fallback.
fn parse_time_column(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveTime>>> {
    let column = df.column(name)?;
    if !matches!(column.dtype(), DataType::String) {
        // Anything non-textual goes through the generic path via Display.
        let rendered: Vec<Option<String>> = (0..column.len())
            .map(|idx| match column.get(idx) {
                Ok(AnyValue::Null) | Err(_) => None,
                Ok(av) => Some(av.to_string()),
            })
            .collect();
        return Ok(rendered
            .iter()
            .map(|opt| opt.as_deref().and_then(parse_time_value))
            .collect());
    }

    let ca = column.str()?;
    let values: Vec<Option<&str>> = (0..ca.len()).map(|idx| ca.get(idx)).collect();
    let non_null = values.iter().flatten().count();

    if non_null > 0 {
        for fmt in TIME_FORMATS {
            let parsed: Vec<Option<NaiveTime>> = values
                .iter()
                .map(|opt| opt.and_then(|raw| parse_time_with(raw, fmt)))
                .collect();
            let hits = parsed.iter().flatten().count();
            if (hits as f64) > FORMAT_ACCEPT_RATIO * (non_null as f64) {
                return Ok(parsed);
            }
        }
    }

    Ok(values
        .iter()
        .map(|opt| opt.and_then(parse_time_value))
        .collect())
}

/// Builds the canonical timestamp column from a date column and an optional
/// time column, dropping both source columns afterwards.
///
/// Rows where either part fails to parse yield a null timestamp; the output
/// column always exists.
pub fn standardize_datetime(
    df: &DataFrame,
    date_col: &str,
    time_col: Option<&str>,
    out_col: &str,
) -> Result<DataFrame> {
    let dates = column_dates(df, date_col)?;

    let time_col = time_col.filter(|name| df.column(name).is_ok());

    let stamps: Vec<Option<NaiveDateTime>> = match time_col {
        Some(name) => {
            let times = parse_time_column(df, name)?;
            dates
                .iter()
                .zip(times.iter())
                .map(|(date, time)| match (date, time) {
                    (Some(d), Some(t)) => Some(d.and_time(*t)),
                    _ => None,
                })
                .collect()
        }
        None => dates
            .iter()
            .map(|date| date.and_then(|d| d.and_hms_opt(0, 0, 0)))
            .collect(),
    };

    let mut out = df.drop(date_col)?;
    if let Some(name) = time_col {
        out = out.drop(name)?;
    }
    out.with_column(datetime_series(out_col, &stamps)?)?;
    Ok(out)
}

/// Adds one Int32 calendar column per level from `year` through the requested
/// resolution. The source column is re-parsed in place, so repeat application
/// is a no-op beyond overwriting columns with identical values.
pub fn expand_datetime(df: &DataFrame, datetime_col: &str, resolution: Resolution) -> Result<DataFrame> {
    let stamps = column_datetimes(df, datetime_col)?;

    let mut out = df.clone();
    out.with_column(datetime_series(datetime_col, &stamps)?)?;

    for level in resolution.levels_through() {
        let values: Vec<Option<i32>> = stamps
            .iter()
            .map(|opt| {
                opt.map(|dt| match level {
                    Resolution::Year => dt.year(),
                    Resolution::Month => dt.month() as i32,
                    Resolution::Day => dt.day() as i32,
                    Resolution::Hour => dt.hour() as i32,
                    Resolution::Minute => dt.minute() as i32,
                    Resolution::Second => dt.second() as i32,
                })
            })
            .collect();
        out.with_column(Series::new(level.column_name().into(), values))?;
    }

    Ok(out)
}
