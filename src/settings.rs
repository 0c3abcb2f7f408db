use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Broker policy knobs. Defaults match Schwab's export format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Actions whose rows describe a security and therefore need a symbol.
    #[serde(default = "default_security_actions")]
    pub security_actions: Vec<String>,
    #[serde(default = "default_max_symbol_length")]
    pub max_symbol_length: usize,
    /// Rounding fixes apply only when `min < diff < max`.
    #[serde(default = "default_min_rounding_diff")]
    pub min_rounding_diff: f64,
    #[serde(default = "default_max_rounding_diff")]
    pub max_rounding_diff: f64,
    /// Offsetting transfer halves must sum to within this of zero.
    #[serde(default = "default_transfer_tolerance")]
    pub transfer_tolerance: f64,
    /// Mapping file used by `postprocess` when `-m` is not given.
    #[serde(default)]
    pub mapping_file: Option<String>,
}

fn default_security_actions() -> Vec<String> {
    [
        "Buy",
        "Sell",
        "Stock Plan Activity",
        "Reinvest Shares",
        "Qual Div Reinvest",
        "Cancel Buy",
        "Journal",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_symbol_length() -> usize {
    8
}

fn default_min_rounding_diff() -> f64 {
    0.01
}

fn default_max_rounding_diff() -> f64 {
    1.00
}

fn default_transfer_tolerance() -> f64 {
    0.01
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            security_actions: default_security_actions(),
            max_symbol_length: default_max_symbol_length(),
            min_rounding_diff: default_min_rounding_diff(),
            max_rounding_diff: default_max_rounding_diff(),
            transfer_tolerance: default_transfer_tolerance(),
            mapping_file: None,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("schwab-csv-tools")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Load settings from `path`, or the default location. A missing file means defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| ToolError::Settings(format!("{}: {e}", path.display())))?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.max_symbol_length == 0 {
        return Err(ToolError::Settings(
            "max_symbol_length must be at least 1".to_string(),
        ));
    }
    if settings.min_rounding_diff >= settings.max_rounding_diff {
        return Err(ToolError::Settings(format!(
            "min_rounding_diff ({}) must be below max_rounding_diff ({})",
            settings.min_rounding_diff, settings.max_rounding_diff
        )));
    }
    Ok(())
}
