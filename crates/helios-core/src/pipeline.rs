// crates/helios-core/src/pipeline.rs
//
// The batch orchestrator. One run walks a fixed state sequence over the
// named table map; every transform takes complete tables and produces
// complete tables, and nothing reaches the sink until every transform for a
// given output has succeeded.

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::clean::{fill_missing, fix_negatives, remove_outliers};
use crate::config::PipelineConfig;
use crate::datetime::{expand_datetime, standardize_datetime, Resolution, DATETIME_COLUMN};
use crate::error::{EtlError, Result};
use crate::keys::generate_keys;
use crate::mappings::rename_dict;
use crate::reshape::{combine, convert_units, detect_energy_columns, melt_to_long, merge_on_timestamp};
use crate::schema::rename_columns;
use crate::sink::{Sink, SinkPolicy};
use crate::sources::DataSource;

/// Logical table names the fixed pipeline operates on.
const ENERGY_TABLE: &str = "energy";
const METEO_TABLE: &str = "meteo";
const PVSYST_TABLE: &str = "pvsyst";

/// Derived columns that exist on both sides of the energy/meteo merge; the
/// right side sheds them so the join key stays the only shared column.
const DERIVED_COLUMNS: &[&str] = &[
    "year", "month", "day", "hour", "minute", "second", "key", "key_m", "key_month",
];

#[derive(Debug, Default)]
pub struct RunSummary {
    pub loaded_rows: Vec<(String, usize)>,
    pub inserted_rows: Vec<(String, u64)>,
    /// Destinations whose insert failed under the swallow policy. Always
    /// empty under the propagate policy.
    pub failed_destinations: Vec<String>,
}

pub struct EtlPipeline<L: DataSource, S: Sink> {
    config: PipelineConfig,
    loader: L,
    sink: S,
}

impl<L: DataSource, S: Sink> EtlPipeline<L, S> {
    pub fn new(config: PipelineConfig, loader: L, sink: S) -> Self {
        Self {
            config,
            loader,
            sink,
        }
    }

    fn take_table(tables: &mut HashMap<String, DataFrame>, name: &str) -> Result<DataFrame> {
        tables
            .remove(name)
            .ok_or_else(|| EtlError::Schema(format!("pipeline table '{name}' is missing")))
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut tables: HashMap<String, DataFrame> = HashMap::new();

        for spec in &self.config.tables {
            let df = self.loader.load(Path::new(&spec.path))?;
            info!(table = %spec.name, rows = df.height(), "loaded");
            summary.loaded_rows.push((spec.name.clone(), df.height()));
            tables.insert(spec.name.clone(), df);
        }
        info!(state = "Loading", tables = tables.len(), "state complete");

        for spec in &self.config.tables {
            let df = Self::take_table(&mut tables, &spec.name)?;
            let mut df = standardize_datetime(
                &df,
                &spec.date_column,
                spec.time_column.as_deref(),
                DATETIME_COLUMN,
            )?;
            if spec.time_column.is_some() {
                df = expand_datetime(&df, DATETIME_COLUMN, Resolution::Minute)?;
            }
            tables.insert(spec.name.clone(), df);
        }
        info!(state = "DatetimeStandardized", "state complete");

        let mut tables = generate_keys(tables)?;
        info!(state = "KeysGenerated", "state complete");

        for spec in &self.config.tables {
            if let Some(selector) = spec.rename.as_deref() {
                let mapping = rename_dict(selector).ok_or_else(|| {
                    EtlError::Config(format!("unknown rename dictionary '{selector}'"))
                })?;
                let df = Self::take_table(&mut tables, &spec.name)?;
                tables.insert(spec.name.clone(), rename_columns(&df, mapping)?);
            }
        }
        info!(state = "SchemaMapped", "state complete");

        let mut members = Vec::with_capacity(self.config.pvsyst.members.len());
        for name in &self.config.pvsyst.members {
            members.push(Self::take_table(&mut tables, name)?);
        }
        let labels: Vec<&str> = self
            .config
            .pvsyst
            .plant_labels
            .iter()
            .map(String::as_str)
            .collect();
        let pvsyst = combine(&members, &labels)?;
        info!(state = "Combined", rows = pvsyst.height(), "state complete");
        tables.insert(PVSYST_TABLE.to_string(), pvsyst);

        let energy = Self::take_table(&mut tables, ENERGY_TABLE)?;
        let energy_columns = detect_energy_columns(&energy);
        let energy = convert_units(&energy, &energy_columns, self.config.unit_factor)?;
        info!(
            state = "UnitsConverted",
            columns = energy_columns.len(),
            factor = self.config.unit_factor,
            "state complete"
        );

        let meteo = Self::take_table(&mut tables, METEO_TABLE)?;
        let mut meteo_slim = meteo.clone();
        for name in DERIVED_COLUMNS {
            if meteo_slim.column(name).is_ok() {
                meteo_slim = meteo_slim.drop(name)?;
            }
        }
        let consolidated = merge_on_timestamp(&energy, &meteo_slim, DATETIME_COLUMN)?;
        info!(state = "Merged", rows = consolidated.height(), "state complete");

        let cleaning = &self.config.cleaning;
        let mut consolidated = fill_missing(
            &consolidated,
            cleaning.strategy,
            Some(cleaning.group_column.as_str()),
            cleaning.sparsity_threshold,
        )?;
        let signed_columns: Vec<String> = consolidated
            .get_column_names()
            .iter()
            .filter(|name| name.contains("Imp") || name.contains("Exp"))
            .map(|name| name.to_string())
            .collect();
        consolidated = fix_negatives(&consolidated, &signed_columns)?;
        for column in &cleaning.outlier_columns {
            consolidated = remove_outliers(&consolidated, column, cleaning.outlier_threshold)?;
        }
        info!(state = "Cleaned", rows = consolidated.height(), "state complete");

        let energy_values: Vec<String> = consolidated
            .get_column_names()
            .iter()
            .filter(|name| {
                name.starts_with("UP") && (name.contains("MWh") || name.contains("MVArh"))
            })
            .map(|name| name.to_string())
            .collect();
        let energy_ids: Vec<String> = consolidated
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| !energy_values.contains(name))
            .collect();
        let energy_long = melt_to_long(
            &consolidated,
            &energy_ids,
            &energy_values,
            self.config.melt_mode,
        )?;

        let pvsyst = Self::take_table(&mut tables, PVSYST_TABLE)?;
        let pvsyst_ids: Vec<String> = pvsyst
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| {
                name == DATETIME_COLUMN
                    || name == "Plant"
                    || DERIVED_COLUMNS.contains(&name.as_str())
            })
            .collect();
        let pvsyst_values: Vec<String> = pvsyst
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| !pvsyst_ids.contains(name))
            .collect();
        let pvsyst_long = melt_to_long(&pvsyst, &pvsyst_ids, &pvsyst_values, self.config.melt_mode)?;
        info!(
            state = "Melted",
            energy_rows = energy_long.height(),
            pvsyst_rows = pvsyst_long.height(),
            "state complete"
        );

        let outputs = [
            (&self.config.destinations.energy, &energy_long),
            (&self.config.destinations.pvsyst, &pvsyst_long),
        ];
        for (destination, table) in outputs {
            match self.sink.insert(table, destination).await {
                Ok(rows) => summary.inserted_rows.push((destination.clone(), rows)),
                Err(err) => match self.config.sink_policy {
                    SinkPolicy::Propagate => return Err(err),
                    SinkPolicy::Swallow => {
                        error!(destination = %destination, %err, "insert failed; continuing per sink policy");
                        summary.failed_destinations.push(destination.clone());
                    }
                },
            }
        }
        info!(state = "Persisted", "state complete");

        Ok(summary)
    }
}
