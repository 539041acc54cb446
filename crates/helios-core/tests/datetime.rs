use chrono::NaiveDateTime;
use helios_core::datetime::{expand_datetime, standardize_datetime, Resolution};
use helios_core::error::EtlError;
use polars::prelude::*;

fn parse_naive(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("parse timestamp")
}

fn naive_to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

fn datetime_values(df: &DataFrame) -> Vec<Option<i64>> {
    let ca = df
        .column("DateTime")
        .expect("DateTime column")
        .datetime()
        .expect("datetime dtype");
    (0..ca.len()).map(|idx| ca.get(idx)).collect()
}

#[test]
fn standardize_combines_date_and_time() {
    let df = df![
        "Date" => ["2024-01-01", "2024-01-02"],
        "Time" => ["12:00:00", "14:30:00"],
    ]
    .expect("df");

    let out = standardize_datetime(&df, "Date", Some("Time"), "DateTime").expect("standardize");

    assert!(out.column("Date").is_err());
    assert!(out.column("Time").is_err());
    let values = datetime_values(&out);
    assert_eq!(values[0], Some(naive_to_micros(parse_naive("2024-01-01 12:00:00"))));
    assert_eq!(values[1], Some(naive_to_micros(parse_naive("2024-01-02 14:30:00"))));
}

#[test]
fn standardize_prefers_meridiem_format_when_it_dominates() {
    let df = df![
        "Date" => ["2024-06-01", "2024-06-01", "2024-06-01"],
        "Time" => ["10:30 AM", "01:05 PM", "11:45 PM"],
    ]
    .expect("df");

    let out = standardize_datetime(&df, "Date", Some("Time"), "DateTime").expect("standardize");

    let values = datetime_values(&out);
    assert_eq!(values[1], Some(naive_to_micros(parse_naive("2024-06-01 13:05:00"))));
    assert_eq!(values[2], Some(naive_to_micros(parse_naive("2024-06-01 23:45:00"))));
}

#[test]
fn standardize_falls_back_to_free_form_below_threshold() {
    // No single format clears 80%, so each value is parsed individually.
    let df = df![
        "Date" => ["2024-06-01"; 5],
        "Time" => ["12:00:00", "13:00:00", "1:00 PM", "1:30 PM", "2:00 PM"],
    ]
    .expect("df");

    let out = standardize_datetime(&df, "Date", Some("Time"), "DateTime").expect("standardize");

    let values = datetime_values(&out);
    assert!(values.iter().all(Option::is_some));
    assert_eq!(values[2], Some(naive_to_micros(parse_naive("2024-06-01 13:00:00"))));
}

#[test]
fn standardize_nulls_out_unparseable_rows() {
    let df = df![
        "Date" => ["2024-01-01", "not a date"],
        "Time" => ["08:00:00", "08:00:00"],
    ]
    .expect("df");

    let out = standardize_datetime(&df, "Date", Some("Time"), "DateTime").expect("standardize");

    let values = datetime_values(&out);
    assert!(values[0].is_some());
    assert!(values[1].is_none());
}

#[test]
fn standardize_without_time_column_defaults_to_midnight() {
    let df = df!["Date" => ["2024-03-15"]].expect("df");

    let out = standardize_datetime(&df, "Date", None, "DateTime").expect("standardize");

    let values = datetime_values(&out);
    assert_eq!(values[0], Some(naive_to_micros(parse_naive("2024-03-15 00:00:00"))));
}

#[test]
fn standardize_handles_monthly_stamps() {
    let df = df!["Date" => ["2025-01"]].expect("df");

    let out = standardize_datetime(&df, "Date", None, "DateTime").expect("standardize");

    let values = datetime_values(&out);
    assert_eq!(values[0], Some(naive_to_micros(parse_naive("2025-01-01 00:00:00"))));
}

#[test]
fn expand_adds_levels_through_requested_resolution() {
    let df = df!["DateTime" => ["2024-01-01 10:15:30"]].expect("df");

    let out = expand_datetime(&df, "DateTime", Resolution::Minute).expect("expand");

    for name in ["year", "month", "day", "hour", "minute"] {
        assert!(out.column(name).is_ok(), "missing column {name}");
    }
    assert!(out.column("second").is_err());

    let minute = out.column("minute").expect("minute").i32().expect("i32");
    assert_eq!(minute.get(0), Some(15));
    let year = out.column("year").expect("year").i32().expect("i32");
    assert_eq!(year.get(0), Some(2024));
}

#[test]
fn expand_is_idempotent() {
    let df = df!["DateTime" => ["2024-01-01 10:15:30", "2024-02-02 23:59:59"]].expect("df");

    let once = expand_datetime(&df, "DateTime", Resolution::Minute).expect("first expand");
    let twice = expand_datetime(&once, "DateTime", Resolution::Minute).expect("second expand");

    assert!(once.equals(&twice));
}

#[test]
fn expand_missing_column_is_a_schema_error() {
    let df = df!["other" => [1i64]].expect("df");

    let result = expand_datetime(&df, "DateTime", Resolution::Day);
    assert!(matches!(result, Err(EtlError::Schema(_))));
}

#[test]
fn resolution_parses_from_config_strings() {
    use std::str::FromStr;

    assert_eq!(Resolution::from_str("minute").expect("parse"), Resolution::Minute);
    assert!(matches!(
        Resolution::from_str("fortnight"),
        Err(EtlError::InvalidArgument(_))
    ));
}
