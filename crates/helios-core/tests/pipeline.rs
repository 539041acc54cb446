use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use helios_core::config::PipelineConfig;
use helios_core::error::{EtlError, Result};
use helios_core::pipeline::EtlPipeline;
use helios_core::sink::{Sink, SinkPolicy};
use helios_core::sources::DataSource;
use polars::prelude::*;

struct MemoryLoader {
    tables: HashMap<String, DataFrame>,
}

impl DataSource for MemoryLoader {
    fn load(&self, path: &Path) -> Result<DataFrame> {
        let key = path.to_str().unwrap_or_default();
        self.tables
            .get(key)
            .cloned()
            .ok_or_else(|| EtlError::NotFound(path.to_path_buf()))
    }
}

#[derive(Clone, Default)]
struct MemorySink {
    inserts: Arc<Mutex<Vec<(String, DataFrame)>>>,
}

impl Sink for MemorySink {
    async fn insert(&self, df: &DataFrame, destination: &str) -> Result<u64> {
        let mut guard = self.inserts.lock().expect("lock");
        guard.push((destination.to_string(), df.clone()));
        Ok(df.height() as u64)
    }
}

struct FailingSink;

impl Sink for FailingSink {
    async fn insert(&self, _df: &DataFrame, destination: &str) -> Result<u64> {
        Err(EtlError::Sink {
            destination: destination.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

fn energy_header(plant: usize, metric: &str) -> String {
    format!("Universidad Panamá {plant} - Medidor Janitza UP{plant} - {metric}")
}

fn meteo_header(plant: usize, metric: &str) -> String {
    format!("Universidad Panamá {plant} - Meteo - {metric}")
}

fn fixture_tables() -> HashMap<String, DataFrame> {
    let mut columns: Vec<Column> = vec![
        Series::new("Date".into(), vec!["2025-01-01"]).into(),
        Series::new("Time".into(), vec!["00:00:00"]).into(),
    ];
    for plant in 1..=4 {
        for (metric, value) in [
            ("ACTIVE ENERGY (kWh)", 1.0),
            ("EXPORTED ACTIVE ENERGY (kWh)", 0.0),
            ("IMPORTED ACTIVE ENERGY (kWh)", 1.0),
            ("REACTIVE ENERGY (kVArh)", 3.0),
        ] {
            columns.push(Series::new(energy_header(plant, metric).into(), vec![value]).into());
        }
    }
    let energy = DataFrame::new(columns).expect("energy");

    let mut columns: Vec<Column> = vec![
        Series::new("Date".into(), vec!["2025-01-01"]).into(),
        Series::new("Time".into(), vec!["00:00:00"]).into(),
    ];
    for (plant, metrics) in [
        (1usize, vec![
            ("Ambient Temperature (ºC)", 20.0),
            ("Panel Temperature (ºC)", 21.0),
            ("Plant Insolation (kWh/m2)", 0.1),
            ("Plant Irradiance (W/m2)", 1000.0),
            ("Relative Humidity (%)", 50.0),
        ]),
        (3usize, vec![
            ("Ambient Temperature (ºC)", 20.0),
            ("Panel Temperature (ºC)", 21.0),
            ("Plant Irradiance (W/m2)", 1000.0),
            ("Relative Humidity (%)", 50.0),
        ]),
    ] {
        for (metric, value) in metrics {
            columns.push(Series::new(meteo_header(plant, metric).into(), vec![value]).into());
        }
    }
    let meteo = DataFrame::new(columns).expect("meteo");

    let cms = df!["Fecha" => ["2025-01-01"], "hora" => ["00:00:00"]].expect("cms");

    let pvsyst = df![
        "Date" => ["2025-01"],
        "GlobHor (kWh/m²)" => [171.0],
        "DiffHor (kWh/m²)" => [100.0],
        "T_Amb (°C)" => [25.0],
        "GlobInc (kWh/m²)" => [160.0],
        "GlobEff (kWh/m²)" => [150.0],
        "EArray (GWh)" => [1.2],
        "E_Grid (GWh)" => [1.1],
        "PR (proporción)" => [0.9],
    ]
    .expect("pvsyst");

    let mut tables = HashMap::new();
    tables.insert("data/cms.csv".to_string(), cms);
    tables.insert("data/energy.csv".to_string(), energy);
    tables.insert("data/meteo.csv".to_string(), meteo);
    for plant in 1..=4 {
        tables.insert(format!("data/up{plant}_pvsyst.csv"), pvsyst.clone());
    }
    tables
}

fn str_column(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    let ca = df.column(name).expect(name).str().expect("str dtype");
    (0..ca.len()).map(|idx| ca.get(idx).map(str::to_string)).collect()
}

fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let ca = df.column(name).expect(name).f64().expect("f64 dtype");
    (0..ca.len()).map(|idx| ca.get(idx)).collect()
}

#[tokio::test]
async fn full_run_converts_melts_and_persists() {
    let loader = MemoryLoader {
        tables: fixture_tables(),
    };
    let sink = MemorySink::default();
    let pipeline = EtlPipeline::new(PipelineConfig::default(), loader, sink.clone());

    let summary = pipeline.run().await.expect("pipeline run");

    assert!(summary.failed_destinations.is_empty());
    let inserted: HashMap<String, u64> = summary.inserted_rows.into_iter().collect();
    assert_eq!(inserted["energy_consolidated"], 16);
    assert_eq!(inserted["pvsyst_data"], 32);

    let guard = sink.inserts.lock().expect("lock");
    let energy_long = &guard
        .iter()
        .find(|(dest, _)| dest == "energy_consolidated")
        .expect("energy output")
        .1;

    // One kWh of active energy per plant becomes 0.001 MWh in the long table.
    let plants = str_column(energy_long, "Plant");
    let metrics = str_column(energy_long, "Metric");
    let values = f64_column(energy_long, "Value");
    let active: Vec<(&Option<String>, &Option<f64>)> = metrics
        .iter()
        .zip(plants.iter().zip(values.iter()))
        .filter(|(metric, _)| metric.as_deref() == Some("Act_MWh"))
        .map(|(_, pair)| pair)
        .collect();
    assert_eq!(active.len(), 4);
    for plant in ["UP1", "UP2", "UP3", "UP4"] {
        assert!(active.iter().any(|(p, v)| {
            p.as_deref() == Some(plant) && **v == Some(0.001)
        }));
    }

    let pvsyst_long = &guard
        .iter()
        .find(|(dest, _)| dest == "pvsyst_data")
        .expect("pvsyst output")
        .1;
    assert_eq!(pvsyst_long.height(), 32);
    let pv_plants = str_column(pvsyst_long, "Plant");
    for plant in ["UP1", "UP2", "UP3", "UP4"] {
        assert!(pv_plants.iter().any(|p| p.as_deref() == Some(plant)));
    }
    let pv_metrics = str_column(pvsyst_long, "Metric");
    assert!(pv_metrics
        .iter()
        .any(|m| m.as_deref() == Some("GlobHor_kWh_m2")));
}

#[tokio::test]
async fn missing_input_aborts_the_run() {
    let loader = MemoryLoader {
        tables: HashMap::new(),
    };
    let pipeline = EtlPipeline::new(PipelineConfig::default(), loader, MemorySink::default());

    let result = pipeline.run().await;
    assert!(matches!(result, Err(EtlError::NotFound(_))));
}

#[tokio::test]
async fn propagate_policy_fails_the_run_on_sink_errors() {
    let loader = MemoryLoader {
        tables: fixture_tables(),
    };
    let pipeline = EtlPipeline::new(PipelineConfig::default(), loader, FailingSink);

    let result = pipeline.run().await;
    assert!(matches!(result, Err(EtlError::Sink { .. })));
}

#[tokio::test]
async fn swallow_policy_reports_failed_destinations() {
    let loader = MemoryLoader {
        tables: fixture_tables(),
    };
    let mut config = PipelineConfig::default();
    config.sink_policy = SinkPolicy::Swallow;
    let pipeline = EtlPipeline::new(config, loader, FailingSink);

    let summary = pipeline.run().await.expect("run completes");

    assert!(summary.inserted_rows.is_empty());
    assert_eq!(
        summary.failed_destinations,
        vec!["energy_consolidated".to_string(), "pvsyst_data".to_string()]
    );
}
