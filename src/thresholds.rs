use serde::{Deserialize, Serialize};

/// Quality cutoffs for the next decision.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub buy: f64,
    pub sell: f64,
}

/// Recomputes thresholds from what will be held tomorrow.
pub trait ThresholdAdapter: Send + Sync {
    /// `held_tomorrow` lists instruments with a positive position after
    /// today's trades; `quality` is today's row.
    fn adapt(&self, current: Thresholds, quality: &[f64], held_tomorrow: &[usize]) -> Thresholds;

    fn name(&self) -> &'static str;
}

/// Buy above the best held quality, sell below the worst. Nothing held
/// leaves the thresholds as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeldQualityRange;

impl ThresholdAdapter for HeldQualityRange {
    fn adapt(&self, current: Thresholds, quality: &[f64], held_tomorrow: &[usize]) -> Thresholds {
        if held_tomorrow.is_empty() {
            return current;
        }
        let (lo, hi) = held_tomorrow
            .iter()
            .map(|&s| quality[s])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), q| {
                (lo.min(q), hi.max(q))
            });
        Thresholds { buy: hi, sell: lo }
    }

    fn name(&self) -> &'static str {
        "held-quality-range"
    }
}

/// Minimum distance kept between the buy and sell thresholds.
pub trait GapPolicy: Send + Sync {
    /// Strictly positive gap for the given buy threshold.
    fn gap(&self, buy: f64) -> f64;

    /// Pulls the sell threshold down so that `sell <= buy - gap(buy)`.
    fn enforce(&self, t: Thresholds) -> Thresholds {
        Thresholds {
            buy: t.buy,
            sell: t.sell.min(t.buy - self.gap(t.buy)),
        }
    }
}

/// `fraction * |buy|`, never below `floor`.
///
/// The floor only matters near `buy == 0`: there a plain `fraction * |buy|`
/// gap is zero and would leave `sell == buy`. With the default floor a buy
/// threshold of 0 pulls sell down to at most `-1e-10` instead of 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FractionalGap {
    pub fraction: f64,
    pub floor: f64,
}

impl FractionalGap {
    pub const DEFAULT_FRACTION: f64 = 0.10;
    pub const DEFAULT_FLOOR: f64 = 1e-10;

    pub fn new(fraction: f64) -> Self {
        Self {
            fraction,
            floor: Self::DEFAULT_FLOOR,
        }
    }
}

impl Default for FractionalGap {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRACTION)
    }
}

impl GapPolicy for FractionalGap {
    fn gap(&self, buy: f64) -> f64 {
        (self.fraction * buy.abs()).max(self.floor)
    }
}
