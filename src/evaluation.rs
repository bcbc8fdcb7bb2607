//! The fixed call contract used by optimizers: a flat parameter vector in,
//! `(cost, constraint)` out.

use crate::error::Result;
use crate::params::PolicyParams;
use crate::prices::PriceMatrix;
use crate::simulator::{PolicySimulator, SimulationHistory};

/// Constraint value reported with every cost. Always feasible.
pub const FEASIBLE: f64 = -1.0;

/// Everything besides the parameters that an evaluation needs.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    /// Non-zero asks for the full history to be returned for reporting. It
    /// never changes the numbers.
    pub diagnostics: u32,
    pub prices: &'a PriceMatrix,
}

impl<'a> EvalContext<'a> {
    pub fn quiet(prices: &'a PriceMatrix) -> Self {
        Self {
            diagnostics: 0,
            prices,
        }
    }

    pub fn with_diagnostics(prices: &'a PriceMatrix, diagnostics: u32) -> Self {
        Self {
            diagnostics,
            prices,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Negative final portfolio value.
    pub cost: f64,
    pub constraint: f64,
    pub final_value: f64,
    pub final_cash: f64,
    pub history: Option<SimulationHistory>,
}

impl Evaluation {
    pub fn portfolio_value(&self) -> f64 {
        -self.cost
    }
}

pub fn evaluate(
    sim: &PolicySimulator,
    params: &[f64],
    ctx: &EvalContext<'_>,
) -> Result<Evaluation> {
    let params = PolicyParams::from_slice(params)?;
    let run = sim.simulate(&params, ctx.prices)?;
    Ok(Evaluation {
        cost: run.fitness,
        constraint: FEASIBLE,
        final_value: run.final_value,
        final_cash: run.final_cash,
        history: (ctx.diagnostics > 0).then_some(run.history),
    })
}

/// Anything an optimizer can minimise.
pub trait CostFunction {
    /// Number of entries `cost` expects.
    fn dimension(&self) -> usize;

    /// Returns `(cost, constraint)`; a constraint above zero marks an
    /// infeasible point.
    fn cost(&self, params: &[f64]) -> Result<(f64, f64)>;
}

/// A simulator bound to one price history.
#[derive(Clone, Copy, Debug)]
pub struct PolicyObjective<'a> {
    pub simulator: &'a PolicySimulator,
    pub prices: &'a PriceMatrix,
    pub dimension: usize,
}

impl<'a> PolicyObjective<'a> {
    pub fn new(simulator: &'a PolicySimulator, prices: &'a PriceMatrix) -> Self {
        Self {
            simulator,
            prices,
            dimension: simulator.policies().scorer.required_weights() + 4,
        }
    }
}

impl CostFunction for PolicyObjective<'_> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn cost(&self, params: &[f64]) -> Result<(f64, f64)> {
        let e = evaluate(self.simulator, params, &EvalContext::quiet(self.prices))?;
        Ok((e.cost, e.constraint))
    }
}
