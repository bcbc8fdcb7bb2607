use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Length of the base parameter vector `[q1, q2, q3, fc, phi, B, S]`.
pub const BASE_PARAM_COUNT: usize = 7;

pub const PARAM_NAMES: [&str; BASE_PARAM_COUNT] = ["q1", "q2", "q3", "fc", "phi", "B", "S"];

/// Validated policy parameters.
///
/// Entries past the seventh are kept in `extra` and numbered from `q4` on;
/// scorers that need more than three weights read them from there.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyParams {
    pub quality_weights: [f64; 3],
    pub extra: Vec<f64>,
    /// Fraction of post-fee cash invested on a buying day, in [0, 1].
    pub invest_fraction: f64,
    /// Exponential smoothing weight on the newest price, in [0, 1].
    pub forgetting_factor: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl PolicyParams {
    /// Builds parameters from the optimizer's flat vector. `fc` and `phi` are
    /// clamped into [0, 1]; `B` and `S` are taken as given.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() < BASE_PARAM_COUNT {
            return Err(SimError::InvalidParameters(format!(
                "expected at least {BASE_PARAM_COUNT} values [q1, q2, q3, fc, phi, B, S], got {}",
                values.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(SimError::InvalidParameters(format!(
                "{} = {} is not finite",
                param_name(i),
                values[i]
            )));
        }

        Ok(Self {
            quality_weights: [values[0], values[1], values[2]],
            extra: values[BASE_PARAM_COUNT..].to_vec(),
            invest_fraction: values[3].clamp(0.0, 1.0),
            forgetting_factor: values[4].clamp(0.0, 1.0),
            buy_threshold: values[5],
            sell_threshold: values[6],
        })
    }

    /// Weight `k` counted from zero: 0..3 are q1..q3, 3.. are q4 onwards.
    pub fn weight(&self, k: usize) -> Option<f64> {
        if k < 3 {
            Some(self.quality_weights[k])
        } else {
            self.extra.get(k - 3).copied()
        }
    }

    pub fn weight_count(&self) -> usize {
        3 + self.extra.len()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(BASE_PARAM_COUNT + self.extra.len());
        v.extend_from_slice(&self.quality_weights);
        v.push(self.invest_fraction);
        v.push(self.forgetting_factor);
        v.push(self.buy_threshold);
        v.push(self.sell_threshold);
        v.extend_from_slice(&self.extra);
        v
    }
}

pub fn param_name(i: usize) -> String {
    match PARAM_NAMES.get(i) {
        Some(name) => (*name).to_string(),
        None => format!("q{}", i - BASE_PARAM_COUNT + 4),
    }
}
