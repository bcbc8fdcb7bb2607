//! Parameterized trading-policy simulator.
//!
//! A policy is a flat parameter vector; [`evaluate`] replays it over a price
//! history and returns the negative final portfolio value, so any minimiser
//! can search for good policies.

pub mod allocation;
pub mod config;
pub mod decision;
pub mod error;
pub mod evaluation;
pub mod grid;
pub mod ledger;
pub mod logging;
pub mod optimizer;
pub mod params;
pub mod prices;
pub mod quality;
pub mod report;
pub mod simulator;
pub mod smoothing;
pub mod thresholds;

pub use config::{AppConfig, SimConfig};
pub use error::{Result, SimError};
pub use evaluation::{CostFunction, EvalContext, Evaluation, PolicyObjective, evaluate};
pub use optimizer::{OptimizeOutcome, OptimizerConfig, ParamBounds, optimize};
pub use params::PolicyParams;
pub use prices::PriceMatrix;
pub use simulator::{PolicySet, PolicySimulator, SimulationHistory, SimulationRun};
