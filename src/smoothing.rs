use serde::Serialize;

use crate::error::{Result, SimError};
use crate::grid::Grid;
use crate::prices::PriceMatrix;

/// Substituted for a velocity denominator that is exactly zero.
pub const VELOCITY_EPSILON: f64 = 1e-10;

/// Running averages for every instrument, one row per day.
///
/// Rows 0 and 1 of `price` hold the raw prices and the derivative rows are
/// zero there; `advance(d)` fills row `d + 1` from rows `d` and `d - 1`.
#[derive(Clone, Debug, Serialize)]
pub struct SmoothedState {
    pub price: Grid,
    pub velocity: Grid,
    pub acceleration: Grid,
    pub variance: Grid,
}

/// One day's slice of a [`SmoothedState`].
#[derive(Clone, Copy, Debug)]
pub struct SmoothedRow<'a> {
    pub price: &'a [f64],
    pub velocity: &'a [f64],
    pub acceleration: &'a [f64],
    pub variance: &'a [f64],
}

impl<'a> SmoothedRow<'a> {
    pub fn instruments(&self) -> usize {
        self.velocity.len()
    }
}

impl SmoothedState {
    pub fn seed(prices: &PriceMatrix) -> Self {
        let days = prices.days();
        let n = prices.instruments();
        let mut price = Grid::zeros(days, n);
        for d in 0..days.min(2) {
            price.row_mut(d).copy_from_slice(prices.day(d));
        }
        Self {
            price,
            velocity: Grid::zeros(days, n),
            acceleration: Grid::zeros(days, n),
            variance: Grid::zeros(days, n),
        }
    }

    pub fn days(&self) -> usize {
        self.price.days()
    }

    pub fn instruments(&self) -> usize {
        self.price.instruments()
    }

    pub fn row(&self, day: usize) -> SmoothedRow<'_> {
        SmoothedRow {
            price: self.price.row(day),
            velocity: self.velocity.row(day),
            acceleration: self.acceleration.row(day),
            variance: self.variance.row(day),
        }
    }

    /// Writes row `day + 1`. Requires `1 <= day < days - 1`.
    pub fn advance(&mut self, day: usize, prices: &PriceMatrix, phi: f64) -> Result<()> {
        if prices.instruments() != self.instruments() {
            return Err(SimError::ShapeMismatch {
                expected: self.instruments(),
                actual: prices.instruments(),
            });
        }
        debug_assert!(day >= 1 && day + 1 < self.days());

        let (next, prev) = (day + 1, day - 1);
        let raw = prices.day(next);
        for s in 0..self.instruments() {
            let p_next = (1.0 - phi) * self.price.get(day, s) + phi * raw[s];
            let p_prev = self.price.get(prev, s);

            let mut denom = p_next + p_prev;
            if denom == 0.0 {
                denom = VELOCITY_EPSILON;
            }
            let v_next = (p_next - p_prev) / denom;
            let a_next = (v_next - self.velocity.get(prev, s)) / 2.0;
            let var_next = (1.0 - phi) * self.variance.get(day, s) + phi * v_next * v_next;

            self.price.row_mut(next)[s] = p_next;
            self.velocity.row_mut(next)[s] = v_next;
            self.acceleration.row_mut(next)[s] = a_next;
            self.variance.row_mut(next)[s] = var_next;
        }
        Ok(())
    }

    /// Runs the estimator over every day with no trading attached.
    pub fn run(prices: &PriceMatrix, phi: f64) -> Result<Self> {
        let mut state = Self::seed(prices);
        for day in 1..prices.days().saturating_sub(1) {
            state.advance(day, prices, phi)?;
        }
        Ok(state)
    }
}
