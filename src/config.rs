use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::optimizer::OptimizerConfig;

/// Market constants shared by every run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_cash: f64,
    /// Flat charge per instrument bought or sold.
    pub transaction_fee: f64,
    /// Annual rate credited to idle cash, compounded daily.
    pub risk_free_rate: f64,
    pub days_per_year: f64,
    /// Default gap policy: sell <= buy - gap_fraction * |buy|.
    pub gap_fraction: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_cash: 1000.0,
            transaction_fee: 2.0,
            risk_free_rate: 0.04,
            days_per_year: 365.0,
            gap_fraction: 0.10,
        }
    }
}

impl SimConfig {
    /// Multiplier applied to cash carried into the next day.
    pub fn daily_growth(&self) -> f64 {
        1.0 + self.risk_free_rate / self.days_per_year
    }

    pub fn validate(&self) -> std::result::Result<(), SimError> {
        let non_negative = [
            ("initial_cash", self.initial_cash),
            ("transaction_fee", self.transaction_fee),
            ("gap_fraction", self.gap_fraction),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        if !self.risk_free_rate.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        if !self.days_per_year.is_finite() || self.days_per_year <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "days_per_year must be > 0, got {}",
                self.days_per_year
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of the optional TOML config file. Missing sections and keys take
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimConfig,
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(s).context("failed to parse config")?;
        config.simulation.validate()?;
        config.optimizer.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Reads `path` when given, otherwise uses defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
