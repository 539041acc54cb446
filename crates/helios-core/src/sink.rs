// crates/helios-core/src/sink.rs
//
// Persistence boundary. The pipeline talks to the `Sink` trait; the shipped
// implementation appends into PostgreSQL with per-row binds inside one
// transaction, so a failed run commits nothing.

use chrono::NaiveDateTime;
use polars::prelude::*;
use sqlx::PgPool;
use tracing::info;

use crate::error::{EtlError, Result};

/// What the orchestrator does with a failed insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkPolicy {
    /// Fail the run.
    #[default]
    Propagate,
    /// Log the error and record the destination as failed in the run summary.
    /// Matches the legacy tolerant behavior.
    Swallow,
}

#[allow(async_fn_in_trait)]
pub trait Sink {
    /// Appends the table into the named destination, returning the number of
    /// rows written. Zero with `Ok` always means "there was no data".
    async fn insert(&self, df: &DataFrame, destination: &str) -> Result<u64>;
}

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

enum BoundColumn {
    Float(Float64Chunked),
    Int(Int64Chunked),
    Text(StringChunked),
    Bool(BooleanChunked),
    Timestamp(Int64Chunked),
    Rendered(Vec<Option<String>>),
}

fn bind_column(column: &Column) -> Result<BoundColumn> {
    let bound = match column.dtype() {
        DataType::Float64 | DataType::Float32 => {
            BoundColumn::Float(column.cast(&DataType::Float64)?.f64()?.clone())
        }
        DataType::Int64
        | DataType::Int32
        | DataType::Int16
        | DataType::Int8
        | DataType::UInt64
        | DataType::UInt32
        | DataType::UInt16
        | DataType::UInt8 => BoundColumn::Int(column.cast(&DataType::Int64)?.i64()?.clone()),
        DataType::String => BoundColumn::Text(column.str()?.clone()),
        DataType::Boolean => BoundColumn::Bool(column.bool()?.clone()),
        DataType::Datetime(_, _) | DataType::Date => BoundColumn::Timestamp(
            column
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
                .cast(&DataType::Int64)?
                .i64()?
                .clone(),
        ),
        _ => {
            let rendered = (0..column.len())
                .map(|idx| match column.get(idx)? {
                    AnyValue::Null => Ok(None),
                    av => Ok(Some(av.to_string())),
                })
                .collect::<Result<Vec<Option<String>>>>()?;
            BoundColumn::Rendered(rendered)
        }
    };
    Ok(bound)
}

impl PostgresSink {
    async fn insert_rows(&self, df: &DataFrame, destination: &str) -> Result<u64> {
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let column_list = names
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=names.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(destination)
        );

        let bound: Vec<BoundColumn> = df
            .get_columns()
            .iter()
            .map(bind_column)
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for row in 0..df.height() {
            let mut query = sqlx::query(&statement);
            for column in &bound {
                query = match column {
                    BoundColumn::Float(ca) => query.bind(ca.get(row)),
                    BoundColumn::Int(ca) => query.bind(ca.get(row)),
                    BoundColumn::Text(ca) => query.bind(ca.get(row).map(str::to_string)),
                    BoundColumn::Bool(ca) => query.bind(ca.get(row)),
                    BoundColumn::Timestamp(ca) => {
                        let stamp: Option<NaiveDateTime> = ca
                            .get(row)
                            .and_then(chrono::DateTime::from_timestamp_micros)
                            .map(|dt| dt.naive_utc());
                        query.bind(stamp)
                    }
                    BoundColumn::Rendered(values) => query.bind(values[row].clone()),
                };
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(df.height() as u64)
    }
}

impl Sink for PostgresSink {
    async fn insert(&self, df: &DataFrame, destination: &str) -> Result<u64> {
        if df.height() == 0 {
            info!(destination, "nothing to insert: table is empty");
            return Ok(0);
        }

        let inserted = self
            .insert_rows(df, destination)
            .await
            .map_err(|err| EtlError::Sink {
                destination: destination.to_string(),
                message: err.to_string(),
            })?;
        info!(destination, rows = inserted, "insert complete");
        Ok(inserted)
    }
}
