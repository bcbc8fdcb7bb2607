use exchange_optimizer::allocation::{BestOnly, QualityWeighted};
use exchange_optimizer::decision::{Decision, DecisionRule};
use exchange_optimizer::evaluation::{CostFunction, PolicyObjective};
use exchange_optimizer::quality::InteractionQuality;
use exchange_optimizer::thresholds::{GapPolicy, Thresholds};
use exchange_optimizer::{PolicyParams, PolicySet, PolicySimulator, PriceMatrix, SimConfig};

/// Buys instrument 0 when flat, sells it when held.
struct FlipFlop;

impl DecisionRule for FlipFlop {
    fn decide(&self, _quality: &[f64], _thresholds: Thresholds, held: &[bool]) -> Decision {
        if held[0] {
            Decision {
                sell: vec![0],
                buy: Vec::new(),
            }
        } else {
            Decision {
                sell: Vec::new(),
                buy: vec![0],
            }
        }
    }

    fn name(&self) -> &'static str {
        "flip-flop"
    }
}

struct FixedGap(f64);

impl GapPolicy for FixedGap {
    fn gap(&self, _buy: f64) -> f64 {
        self.0
    }
}

fn no_interest() -> SimConfig {
    SimConfig {
        risk_free_rate: 0.0,
        ..SimConfig::default()
    }
}

fn two_trending() -> PriceMatrix {
    PriceMatrix::from_rows(
        (0..30)
            .map(|d| vec![50.0 * 1.02_f64.powi(d), 80.0 * 0.99_f64.powi(d), 20.0])
            .collect(),
    )
    .unwrap()
}

#[test]
fn scripted_round_trip_through_simulator() {
    let sim =
        PolicySimulator::with_policies(no_interest(), PolicySet::default().with_decision(FlipFlop))
            .unwrap();
    let prices =
        PriceMatrix::from_rows(vec![vec![10.0], vec![10.0], vec![12.0], vec![12.0]]).unwrap();
    let params = PolicyParams::from_slice(&[0.0, 0.0, 0.0, 0.5, 0.5, 0.6, -0.4]).unwrap();

    let out = sim.simulate(&params, &prices).unwrap();
    assert!((out.fitness + 1095.8).abs() < 1e-9, "fitness {}", out.fitness);
    assert_eq!(out.final_value, 0.0);
    assert_eq!(out.history.trades.len(), 2);
    assert_eq!(out.history.trades[0].bought, vec![0]);
    assert_eq!(out.history.trades[1].sold, vec![0]);
}

#[test]
fn allocation_policies_change_outcome_not_invariants() {
    let prices = two_trending();
    let params = PolicyParams::from_slice(&[10.0, 1.0, 0.0, 0.8, 0.6, 0.001, -0.5]).unwrap();
    let standard = PolicySimulator::new(SimConfig::default()).unwrap();
    let weighted = PolicySimulator::with_policies(
        SimConfig::default(),
        PolicySet::default().with_allocation(QualityWeighted),
    )
    .unwrap();
    let best = PolicySimulator::with_policies(
        SimConfig::default(),
        PolicySet::default().with_allocation(BestOnly),
    )
    .unwrap();

    for sim in [&standard, &weighted, &best] {
        let out = sim.simulate(&params, &prices).unwrap();
        assert!(out.history.cash.iter().all(|&c| c >= -1e-9));
        assert!(out.fitness < 0.0);
    }
}

#[test]
fn interaction_scorer_takes_two_more_weights() {
    let sim = PolicySimulator::with_policies(
        SimConfig::default(),
        PolicySet::default().with_scorer(InteractionQuality),
    )
    .unwrap();
    let prices = two_trending();
    let objective = PolicyObjective::new(&sim, &prices);
    assert_eq!(objective.dimension(), 9);

    let base = [10.0, 1.0, 0.0, 0.8, 0.6, 0.001, -0.5];
    assert!(objective.cost(&base).is_err());

    let mut with_extras = base.to_vec();
    with_extras.extend([0.0, 0.0]);
    let plain = PolicySimulator::new(SimConfig::default())
        .unwrap()
        .fitness(&PolicyParams::from_slice(&base).unwrap(), &prices)
        .unwrap();
    let (cost, _) = objective.cost(&with_extras).unwrap();
    assert_eq!(cost.to_bits(), plain.to_bits());
}

#[test]
fn custom_gap_is_enforced() {
    let sim = PolicySimulator::with_policies(
        SimConfig::default(),
        PolicySet::default().with_gap(FixedGap(0.5)),
    )
    .unwrap();
    let prices = two_trending();
    let params = PolicyParams::from_slice(&[10.0, 1.0, 0.0, 0.8, 0.6, 0.001, -0.5]).unwrap();
    let out = sim.simulate(&params, &prices).unwrap();
    for t in &out.history.thresholds[2..] {
        assert!(t.sell <= t.buy - 0.5, "{t:?}");
    }
}
