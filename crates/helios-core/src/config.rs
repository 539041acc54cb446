// crates/helios-core/src/config.rs

use std::path::Path;

use serde::Deserialize;

use crate::clean::FillStrategy;
use crate::error::{EtlError, Result};
use crate::reshape::MeltMode;
use crate::sink::SinkPolicy;

/// One input table: where it lives and how its raw timestamp is laid out.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub path: String,
    pub date_column: String,
    #[serde(default)]
    pub time_column: Option<String>,
    /// Rename-dictionary selector: "energy", "meteo" or "pvsyst".
    #[serde(default)]
    pub rename: Option<String>,
}

/// The PVSyst member tables stacked into one table, with the plant label
/// injected per member.
#[derive(Debug, Clone, Deserialize)]
pub struct PvsystConfig {
    pub members: Vec<String>,
    pub plant_labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub strategy: FillStrategy,
    pub group_column: String,
    pub sparsity_threshold: f64,
    pub outlier_columns: Vec<String>,
    pub outlier_threshold: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            strategy: FillStrategy::Mean,
            group_column: "key_month".to_string(),
            sparsity_threshold: 0.05,
            outlier_columns: vec![
                "UP1_Act_MWh".to_string(),
                "UP2_Act_MWh".to_string(),
                "UP3_Act_MWh".to_string(),
                "UP4_Act_MWh".to_string(),
            ],
            outlier_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub energy: String,
    pub pvsyst: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            energy: "energy_consolidated".to_string(),
            pvsyst: "pvsyst_data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tables: Vec<TableConfig>,
    pub pvsyst: PvsystConfig,
    pub cleaning: CleaningConfig,
    pub destinations: DestinationConfig,
    pub melt_mode: MeltMode,
    pub sink_policy: SinkPolicy,
    /// kWh -> MWh divisor for the energy meter columns.
    pub unit_factor: f64,
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&raw)
            .map_err(|err| EtlError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pvsyst.members.len() != self.pvsyst.plant_labels.len() {
            return Err(EtlError::Config(format!(
                "pvsyst: {} members but {} plant labels",
                self.pvsyst.members.len(),
                self.pvsyst.plant_labels.len()
            )));
        }
        for member in &self.pvsyst.members {
            if !self.tables.iter().any(|t| &t.name == member) {
                return Err(EtlError::Config(format!(
                    "pvsyst member '{member}' has no [[tables]] entry"
                )));
            }
        }
        for table in &self.tables {
            if let Some(selector) = table.rename.as_deref() {
                if crate::mappings::rename_dict(selector).is_none() {
                    return Err(EtlError::Config(format!(
                        "table '{}': unknown rename dictionary '{selector}'",
                        table.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn table(name: &str, path: &str, date: &str, time: Option<&str>, rename: Option<&str>) -> TableConfig {
    TableConfig {
        name: name.to_string(),
        path: path.to_string(),
        date_column: date.to_string(),
        time_column: time.map(str::to_string),
        rename: rename.map(str::to_string),
    }
}

impl Default for PipelineConfig {
    /// Mirrors the historical plant layout: a CMS export, one energy meter
    /// table, one meteo table, and four per-plant PVSyst reports.
    fn default() -> Self {
        Self {
            tables: vec![
                table("cms", "data/cms.csv", "Fecha", Some("hora"), None),
                table("energy", "data/energy.csv", "Date", Some("Time"), Some("energy")),
                table("meteo", "data/meteo.csv", "Date", Some("Time"), Some("meteo")),
                table("up1_pvsyst", "data/up1_pvsyst.csv", "Date", None, Some("pvsyst")),
                table("up2_pvsyst", "data/up2_pvsyst.csv", "Date", None, Some("pvsyst")),
                table("up3_pvsyst", "data/up3_pvsyst.csv", "Date", None, Some("pvsyst")),
                table("up4_pvsyst", "data/up4_pvsyst.csv", "Date", None, Some("pvsyst")),
            ],
            pvsyst: PvsystConfig {
                members: vec![
                    "up1_pvsyst".to_string(),
                    "up2_pvsyst".to_string(),
                    "up3_pvsyst".to_string(),
                    "up4_pvsyst".to_string(),
                ],
                plant_labels: vec![
                    "UP1".to_string(),
                    "UP2".to_string(),
                    "UP3".to_string(),
                    "UP4".to_string(),
                ],
            },
            cleaning: CleaningConfig::default(),
            destinations: DestinationConfig::default(),
            melt_mode: MeltMode::default(),
            sink_policy: SinkPolicy::default(),
            unit_factor: 1000.0,
        }
    }
}
