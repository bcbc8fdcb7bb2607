use serde::Serialize;
use tracing::{debug, trace};

use crate::allocation::{AllocationPolicy, EqualWeight};
use crate::config::SimConfig;
use crate::decision::{DecisionRule, ThresholdCrossing};
use crate::error::{Result, SimError};
use crate::grid::Grid;
use crate::ledger::Ledger;
use crate::params::PolicyParams;
use crate::prices::PriceMatrix;
use crate::quality::{LinearQuality, QualityScorer};
use crate::smoothing::SmoothedState;
use crate::thresholds::{FractionalGap, GapPolicy, HeldQualityRange, ThresholdAdapter, Thresholds};

/// The replaceable parts of the trading policy.
pub struct PolicySet {
    pub scorer: Box<dyn QualityScorer>,
    pub decision: Box<dyn DecisionRule>,
    pub allocation: Box<dyn AllocationPolicy>,
    pub adapter: Box<dyn ThresholdAdapter>,
    pub gap: Box<dyn GapPolicy>,
}

impl PolicySet {
    pub fn standard(gap_fraction: f64) -> Self {
        Self {
            scorer: Box::new(LinearQuality),
            decision: Box::new(ThresholdCrossing::default()),
            allocation: Box::new(EqualWeight),
            adapter: Box::new(HeldQualityRange),
            gap: Box::new(FractionalGap::new(gap_fraction)),
        }
    }

    pub fn with_scorer(mut self, scorer: impl QualityScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn with_decision(mut self, decision: impl DecisionRule + 'static) -> Self {
        self.decision = Box::new(decision);
        self
    }

    pub fn with_allocation(mut self, allocation: impl AllocationPolicy + 'static) -> Self {
        self.allocation = Box::new(allocation);
        self
    }

    pub fn with_adapter(mut self, adapter: impl ThresholdAdapter + 'static) -> Self {
        self.adapter = Box::new(adapter);
        self
    }

    pub fn with_gap(mut self, gap: impl GapPolicy + 'static) -> Self {
        self.gap = Box::new(gap);
        self
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::standard(FractionalGap::DEFAULT_FRACTION)
    }
}

impl std::fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySet")
            .field("scorer", &self.scorer.name())
            .field("decision", &self.decision.name())
            .field("allocation", &self.allocation.name())
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

/// Trades made on one day.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DayTrades {
    pub day: usize,
    pub sold: Vec<usize>,
    pub bought: Vec<usize>,
    pub proceeds: f64,
    pub invested: f64,
    pub fees: f64,
}

/// Everything a run computed, day by day.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationHistory {
    pub smoothed: SmoothedState,
    pub quality: Grid,
    /// `thresholds[d]` is the pair used for day `d`'s decision.
    pub thresholds: Vec<Thresholds>,
    pub holdings: Grid,
    pub cash: Vec<f64>,
    pub investment_value: Vec<f64>,
    /// Only days on which something traded.
    pub trades: Vec<DayTrades>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationRun {
    /// `-(final_value + final_cash)`.
    pub fitness: f64,
    pub final_value: f64,
    pub final_cash: f64,
    pub history: SimulationHistory,
}

/// Replays a policy over a price history.
///
/// Holds no per-run state, so one simulator can serve any number of
/// evaluations, from any number of threads.
#[derive(Debug)]
pub struct PolicySimulator {
    config: SimConfig,
    policies: PolicySet,
}

impl PolicySimulator {
    pub fn new(config: SimConfig) -> Result<Self> {
        Self::with_policies(config, PolicySet::standard(config.gap_fraction))
    }

    pub fn with_policies(config: SimConfig, policies: PolicySet) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, policies })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn simulate(&self, params: &PolicyParams, prices: &PriceMatrix) -> Result<SimulationRun> {
        let needed = self.policies.scorer.required_weights();
        if params.weight_count() < needed {
            return Err(SimError::InvalidParameters(format!(
                "{} scorer needs {needed} quality weights, got {}",
                self.policies.scorer.name(),
                params.weight_count()
            )));
        }

        let mut run = Run::new(self, params, prices);
        for day in 1..prices.days().saturating_sub(1) {
            run.step(day)?;
        }
        let outcome = run.finish();

        debug!(
            days = prices.days(),
            instruments = prices.instruments(),
            trade_days = outcome.history.trades.len(),
            final_value = outcome.final_value,
            final_cash = outcome.final_cash,
            "simulation finished"
        );
        Ok(outcome)
    }

    pub fn fitness(&self, params: &PolicyParams, prices: &PriceMatrix) -> Result<f64> {
        Ok(self.simulate(params, prices)?.fitness)
    }
}

/// State owned by a single simulation.
struct Run<'a> {
    sim: &'a PolicySimulator,
    params: &'a PolicyParams,
    prices: &'a PriceMatrix,
    smoothed: SmoothedState,
    quality: Grid,
    thresholds: Thresholds,
    threshold_history: Vec<Thresholds>,
    ledger: Ledger,
    trades: Vec<DayTrades>,
}

impl<'a> Run<'a> {
    fn new(sim: &'a PolicySimulator, params: &'a PolicyParams, prices: &'a PriceMatrix) -> Self {
        let (days, n) = (prices.days(), prices.instruments());
        let initial = Thresholds {
            buy: params.buy_threshold,
            sell: params.sell_threshold,
        };
        Self {
            sim,
            params,
            prices,
            smoothed: SmoothedState::seed(prices),
            quality: Grid::zeros(days, n),
            thresholds: initial,
            threshold_history: vec![initial; days],
            ledger: Ledger::new(days, n, sim.config.initial_cash),
            trades: Vec::new(),
        }
    }

    /// Trades on `day` and fills `day + 1`.
    fn step(&mut self, day: usize) -> Result<()> {
        let policies = &self.sim.policies;
        let config = &self.sim.config;
        let today = self.prices.day(day);

        self.smoothed
            .advance(day, self.prices, self.params.forgetting_factor)?;
        self.ledger.mark_to_market(day, today);

        policies
            .scorer
            .score(self.smoothed.row(day), self.params, self.quality.row_mut(day));
        let quality = self.quality.row(day);

        let held = self.ledger.held(day);
        let decision = policies.decision.decide(quality, self.thresholds, &held);
        debug_assert!(
            decision.sell.iter().all(|&s| held[s]),
            "day {day}: sell set {:?} includes instruments not held",
            decision.sell
        );

        let sale = self
            .ledger
            .sell(day, &decision.sell, today, config.transaction_fee);
        let purchase = self.ledger.buy(
            day,
            &decision.buy,
            self.params.invest_fraction,
            config.transaction_fee,
            quality,
            today,
            policies.allocation.as_ref(),
        );
        self.ledger
            .carry_forward(day, &purchase.shares, config.daily_growth());

        let held_tomorrow = self.ledger.held_instruments(day + 1);
        let adapted = policies
            .adapter
            .adapt(self.thresholds, quality, &held_tomorrow);
        self.thresholds = policies.gap.enforce(adapted);
        debug_assert!(
            self.thresholds.sell < self.thresholds.buy,
            "day {day}: sell threshold {} not below buy threshold {}",
            self.thresholds.sell,
            self.thresholds.buy
        );
        self.threshold_history[day + 1] = self.thresholds;

        if !sale.instruments.is_empty() || !purchase.instruments.is_empty() {
            trace!(
                day,
                sold = ?sale.instruments,
                bought = ?purchase.instruments,
                cash = self.ledger.cash[day],
                buy_threshold = self.thresholds.buy,
                sell_threshold = self.thresholds.sell,
                "traded"
            );
            self.trades.push(DayTrades {
                day,
                sold: sale.instruments,
                bought: purchase.instruments,
                proceeds: sale.proceeds,
                invested: purchase.invested,
                fees: sale.fees + purchase.fees,
            });
        }
        Ok(())
    }

    fn finish(mut self) -> SimulationRun {
        let last = self.prices.days() - 1;
        let final_value = self.ledger.mark_to_market(last, self.prices.day(last));
        let final_cash = self.ledger.cash[last];

        SimulationRun {
            fitness: -(final_value + final_cash),
            final_value,
            final_cash,
            history: SimulationHistory {
                smoothed: self.smoothed,
                quality: self.quality,
                thresholds: self.threshold_history,
                holdings: self.ledger.holdings,
                cash: self.ledger.cash,
                investment_value: self.ledger.investment_value,
                trades: self.trades,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PolicySet, PolicySimulator};
    use crate::config::SimConfig;
    use crate::params::PolicyParams;
    use crate::prices::PriceMatrix;
    use crate::quality::InteractionQuality;

    fn params(v: &[f64]) -> PolicyParams {
        PolicyParams::from_slice(v).unwrap()
    }

    #[test]
    fn single_day_returns_initial_cash() {
        let sim = PolicySimulator::new(SimConfig::default()).unwrap();
        let prices = PriceMatrix::from_rows(vec![vec![10.0, 20.0]]).unwrap();
        let run = sim
            .simulate(&params(&[1.0, 1.0, 1.0, 0.5, 0.5, 0.6, -0.4]), &prices)
            .unwrap();
        assert_eq!(run.fitness, -1000.0);
        assert!(run.history.trades.is_empty());
    }

    #[test]
    fn scorer_weight_requirement_is_checked() {
        let sim = PolicySimulator::with_policies(
            SimConfig::default(),
            PolicySet::default().with_scorer(InteractionQuality),
        )
        .unwrap();
        let prices = PriceMatrix::from_rows(vec![vec![1.0]; 4]).unwrap();
        let err = sim
            .simulate(&params(&[1.0, 1.0, 1.0, 0.5, 0.5, 0.6, -0.4]), &prices)
            .unwrap_err();
        assert!(err.to_string().contains("needs 5"));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimConfig {
            days_per_year: 0.0,
            ..SimConfig::default()
        };
        assert!(PolicySimulator::new(config).is_err());
    }

    #[test]
    fn thresholds_seed_first_two_days() {
        let sim = PolicySimulator::new(SimConfig::default()).unwrap();
        let prices = PriceMatrix::from_rows(vec![vec![5.0]; 5]).unwrap();
        let run = sim
            .simulate(&params(&[1.0, 1.0, 1.0, 0.5, 0.5, 0.6, -0.4]), &prices)
            .unwrap();
        let t = &run.history.thresholds;
        assert_eq!(t.len(), 5);
        assert_eq!((t[0].buy, t[0].sell), (0.6, -0.4));
        assert_eq!((t[1].buy, t[1].sell), (0.6, -0.4));
        assert!(t[2..].iter().all(|t| t.sell < t.buy));
    }
}
