//! Explorer configuration.
//!
//! JSON file named by `DATA_EXPLORER_CONFIG`, every field optional, plus
//! single-value environment overrides. Missing file or variable means
//! defaults.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "DATA_EXPLORER_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Chart construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Script URL embedded in exported HTML
    pub plotly_cdn: String,
    /// Transition of static charts, milliseconds
    pub transition_ms: u32,
    /// Transition between animation frames, milliseconds
    pub animation_ms: u32,
    /// Bar race frames move a little slower
    pub bar_race_ms: u32,
    pub histogram_bins: usize,
    /// Default number of forecast points
    pub forecast_horizon: usize,
    pub min_forecast_horizon: usize,
    pub max_forecast_horizon: usize,
    /// Forecast length used by auto analysis
    pub auto_forecast_horizon: usize,
    pub top_categories: usize,
    pub category_share: usize,
    pub scatter_matrix_columns: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            plotly_cdn: "https://cdn.plot.ly/plotly-2.35.2.min.js".to_string(),
            transition_ms: 500,
            animation_ms: 600,
            bar_race_ms: 700,
            histogram_bins: 20,
            forecast_horizon: 10,
            min_forecast_horizon: 3,
            max_forecast_horizon: 30,
            auto_forecast_horizon: 10,
            top_categories: 10,
            category_share: 5,
            scatter_matrix_columns: 4,
        }
    }
}

/// PDF summary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Statistic rows shown in the report table
    pub stats_rows: usize,
    pub decimals: u32,
    pub file_name: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Data Explorer - Summary Report".to_string(),
            stats_rows: 8,
            decimals: 3,
            file_name: "data_summary_report.pdf".to_string(),
        }
    }
}

/// Data preview settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    pub preview_rows: usize,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self { preview_rows: 5 }
    }
}

/// Complete explorer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub charts: ChartConfig,
    pub report: ReportConfig,
    pub overview: OverviewConfig,
}

impl ExplorerConfig {
    /// Load configuration from file, falling back to defaults for missing values
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Configuration named by `DATA_EXPLORER_CONFIG`, or defaults.
    pub fn load() -> ConfigResult<Self> {
        match env::var(CONFIG_PATH_VAR) {
            Ok(path) => {
                log::info!("loading configuration from {path}");
                Self::load_from_file(path)
            }
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production). Unparsable values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(cdn) = lookup("DATA_EXPLORER_PLOTLY_CDN") {
            self.charts.plotly_cdn = cdn;
        }
        if let Some(h) = lookup("DATA_EXPLORER_FORECAST_HORIZON").and_then(|v| v.parse().ok()) {
            self.charts.forecast_horizon = h;
        }
        if let Some(title) = lookup("DATA_EXPLORER_REPORT_TITLE") {
            self.report.title = title;
        }
        if let Some(n) = lookup("DATA_EXPLORER_PREVIEW_ROWS").and_then(|v| v.parse().ok()) {
            self.overview.preview_rows = n;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.charts;
        if c.plotly_cdn.trim().is_empty() {
            return Err(ConfigError::Validation("plotly_cdn must not be empty".into()));
        }
        if c.histogram_bins == 0 {
            return Err(ConfigError::Validation("histogram_bins must be positive".into()));
        }
        if c.min_forecast_horizon == 0 || c.min_forecast_horizon > c.max_forecast_horizon {
            return Err(ConfigError::Validation(format!(
                "forecast horizon bounds [{}, {}] are invalid",
                c.min_forecast_horizon, c.max_forecast_horizon
            )));
        }
        if self.report.stats_rows == 0 {
            return Err(ConfigError::Validation("stats_rows must be positive".into()));
        }
        Ok(())
    }

    /// Clamp a requested horizon into the configured slider range.
    pub fn clamp_horizon(&self, horizon: usize) -> usize {
        horizon.clamp(self.charts.min_forecast_horizon, self.charts.max_forecast_horizon)
    }
}
