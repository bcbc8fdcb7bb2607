//! Derivative-free search over a bounded box, driving any [`CostFunction`].
//!
//! Adaptive elite search with boundary refinement: a global phase samples the
//! whole box (initial guess first), the box is then tightened around the best
//! candidates, and a local phase mutates and recombines the elites with a
//! step size that shrinks on improvement and grows on stagnation.

use std::cmp::Ordering;
use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SimError};
use crate::evaluation::CostFunction;
use crate::params::param_name;

/// Starting point `[q1, q2, q3, fc, phi, B, S]`.
pub const DEFAULT_INITIAL_GUESS: [f64; 7] = [-8.7, 10.7, 1.0, 0.9, 0.7, 0.6, -0.4];

const ELITE_POOL: usize = 20;
const REFINE_TOP: usize = 10;
const MAX_DRAWS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_evals: usize,
    /// Minimum drop in best cost that counts as progress.
    pub tol_f: f64,
    /// Evaluations without progress before the search stops.
    pub patience: usize,
    pub seed: u64,
    pub initial_guess: Vec<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_evals: 5000,
            tol_f: 0.1,
            patience: 600,
            seed: 20260226,
            initial_guess: DEFAULT_INITIAL_GUESS.to_vec(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_evals == 0 {
            return Err(SimError::InvalidConfig("max_evals must be >= 1".to_string()));
        }
        if !self.tol_f.is_finite() || self.tol_f < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "tol_f must be finite and >= 0, got {}",
                self.tol_f
            )));
        }
        if self.initial_guess.iter().any(|v| !v.is_finite()) {
            return Err(SimError::InvalidConfig("initial_guess must be finite".to_string()));
        }
        Ok(())
    }
}

/// Per-dimension search box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    /// `init ± 1.5 |init|`, with fc and phi kept inside (0, 1) and the initial
    /// buy threshold capped at 4.
    pub fn around(init: &[f64]) -> Self {
        let mut lower: Vec<f64> = init.iter().map(|v| v - 1.5 * v.abs()).collect();
        let mut upper: Vec<f64> = init.iter().map(|v| v + 1.5 * v.abs()).collect();
        for i in [3, 4] {
            if i < init.len() {
                lower[i] = 0.01;
                upper[i] = 0.99;
            }
        }
        if init.len() > 5 {
            upper[5] = 4.0;
        }
        Self { lower, upper }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn width(&self, i: usize) -> f64 {
        (self.upper[i] - self.lower[i]).max(0.0)
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (i, v) in x.iter_mut().enumerate() {
            *v = clamp(*v, self.lower[i], self.upper[i]);
        }
    }

    fn validate(&self, dimension: usize) -> Result<()> {
        if self.lower.len() != dimension || self.upper.len() != dimension {
            return Err(SimError::InvalidConfig(format!(
                "bounds have {}/{} entries, cost function takes {dimension}",
                self.lower.len(),
                self.upper.len()
            )));
        }
        for i in 0..dimension {
            let (l, h) = (self.lower[i], self.upper[i]);
            if !(l.is_finite() && h.is_finite() && l <= h) {
                return Err(SimError::InvalidConfig(format!(
                    "bounds for {} are [{l}, {h}]",
                    param_name(i)
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub cost: f64,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizeOutcome {
    pub best: Candidate,
    pub evaluations: usize,
    pub global_trials: usize,
    pub refined_bounds: ParamBounds,
    /// True when the search stopped because progress stalled.
    pub converged: bool,
}

pub fn optimize(
    objective: &dyn CostFunction,
    bounds: &ParamBounds,
    config: &OptimizerConfig,
) -> Result<OptimizeOutcome> {
    config.validate()?;
    bounds.validate(objective.dimension())?;

    let mut search = Search {
        objective,
        rng: StdRng::seed_from_u64(config.seed),
        top: Vec::new(),
        best: None,
        visited: HashSet::new(),
        evaluations: 0,
        since_progress: 0,
        tol_f: config.tol_f,
    };

    let trials = config.max_evals;
    let global_trials = (trials / 3).max(10).min(trials);

    let mut start = config.initial_guess.clone();
    start.resize(bounds.dimension(), 0.0);
    bounds.clamp(&mut start);
    let mut seeds = vec![start];

    let mut attempts = 0;
    while search.evaluations < global_trials && attempts < global_trials * MAX_DRAWS {
        attempts += 1;
        let cand = seeds
            .pop()
            .unwrap_or_else(|| sample(bounds, &mut search.rng));
        if search.evaluate(cand)? {
            info!(
                phase = "global",
                eval = search.evaluations,
                best = search.best_cost(),
                "improved"
            );
        }
    }

    let refined = refine_bounds(bounds, &search.top);
    debug!(?refined, "refined bounds from top candidates");

    let mut sigma = 1.0_f64;
    let mut stagnation = 0_usize;
    let mut converged = false;

    while search.evaluations < trials {
        if search.since_progress >= config.patience {
            converged = true;
            break;
        }

        let Some(cand) = search.propose(bounds, &refined, sigma) else {
            // nothing new left to try around the elites
            converged = true;
            break;
        };

        if search.evaluate(cand)? {
            sigma = (sigma * 0.90).max(0.25);
            stagnation = 0;
            info!(
                phase = "local",
                eval = search.evaluations,
                best = search.best_cost(),
                sigma,
                "improved"
            );
        } else {
            stagnation += 1;
            if stagnation % 12 == 0 {
                sigma = (sigma * 1.20).min(2.5);
            }
            if stagnation % 40 == 0 {
                sigma = (sigma * 1.30).min(2.5);
            }
        }
    }

    let best = search.best.ok_or_else(|| {
        SimError::InvalidConfig("optimizer evaluated no candidates".to_string())
    })?;
    info!(
        evaluations = search.evaluations,
        best = best.cost,
        converged,
        "optimization finished"
    );

    Ok(OptimizeOutcome {
        best,
        evaluations: search.evaluations,
        global_trials,
        refined_bounds: refined,
        converged,
    })
}

struct Search<'a> {
    objective: &'a dyn CostFunction,
    rng: StdRng,
    top: Vec<Candidate>,
    best: Option<Candidate>,
    visited: HashSet<Vec<u64>>,
    evaluations: usize,
    since_progress: usize,
    tol_f: f64,
}

impl Search<'_> {
    fn best_cost(&self) -> f64 {
        self.best.as_ref().map(|b| b.cost).unwrap_or(f64::INFINITY)
    }

    /// Evaluates `params` unless already seen; true when it beats the best.
    fn evaluate(&mut self, params: Vec<f64>) -> Result<bool> {
        if !self.visited.insert(fingerprint(&params)) {
            return Ok(false);
        }

        let (cost, constraint) = self.objective.cost(&params)?;
        self.evaluations += 1;
        // infeasible points rank behind every feasible one
        let cost = if constraint > 0.0 { f64::MAX } else { cost };

        let prev = self.best_cost();
        let improved = cost < prev;
        if prev - cost > self.tol_f {
            self.since_progress = 0;
        } else {
            self.since_progress += 1;
        }

        debug!(eval = self.evaluations, cost, best = prev.min(cost), "evaluated");
        let cand = Candidate { cost, params };
        if improved {
            self.best = Some(cand.clone());
        }
        push_topk(&mut self.top, cand, ELITE_POOL);
        Ok(improved)
    }

    fn propose(
        &mut self,
        base: &ParamBounds,
        refined: &ParamBounds,
        sigma: f64,
    ) -> Option<Vec<f64>> {
        for _ in 0..MAX_DRAWS {
            let rng = &mut self.rng;
            let mut cand = if self.top.is_empty() || rng.random_bool(0.24) {
                sample(refined, rng)
            } else {
                let p1 = select_parent(&self.top, rng)?;
                if self.top.len() >= 2 && rng.random_bool(0.30) {
                    let p2 = select_parent(&self.top, rng)?;
                    let cross = crossover(&p1.params, &p2.params, rng);
                    mutate(&cross, base, refined, rng, sigma)
                } else {
                    mutate(&p1.params, base, refined, rng, sigma)
                }
            };

            if rng.random_bool(0.08) {
                cand = mutate(&cand, base, refined, rng, (sigma * 1.4).min(2.5));
            }

            if !self.visited.contains(&fingerprint(&cand)) {
                return Some(cand);
            }
        }
        None
    }
}

fn sample(bounds: &ParamBounds, rng: &mut StdRng) -> Vec<f64> {
    (0..bounds.dimension())
        .map(|i| uniform(rng, bounds.lower[i], bounds.upper[i]))
        .collect()
}

fn mutate(
    base: &[f64],
    limits: &ParamBounds,
    refined: &ParamBounds,
    rng: &mut StdRng,
    scale: f64,
) -> Vec<f64> {
    let mut p = base.to_vec();
    let mut changed = false;
    let p_mut = (0.10 + 0.20 * scale).min(0.85);

    for (i, v) in p.iter_mut().enumerate() {
        if !rng.random_bool(p_mut) {
            continue;
        }
        *v = if rng.random_bool((0.06 * scale).min(0.30)) {
            uniform(rng, refined.lower[i], refined.upper[i])
        } else {
            let span = refined.width(i).max(limits.width(i) * 0.01);
            *v + gauss(rng) * span * 0.18 * scale
        };
        changed = true;
    }

    if !changed && !p.is_empty() {
        let i = rng.random_range(0..p.len());
        p[i] = uniform(rng, refined.lower[i], refined.upper[i]);
    }

    limits.clamp(&mut p);
    p
}

fn crossover(a: &[f64], b: &[f64], rng: &mut StdRng) -> Vec<f64> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| if rng.random_bool(0.5) { x } else { y })
        .collect()
}

/// Box around the leading candidates, padded and kept inside `base`.
fn refine_bounds(base: &ParamBounds, ranked: &[Candidate]) -> ParamBounds {
    if ranked.is_empty() {
        return base.clone();
    }
    let top = &ranked[..ranked.len().min(REFINE_TOP)];
    let mut out = base.clone();

    for i in 0..base.dimension() {
        let (base_l, base_h) = (base.lower[i], base.upper[i]);
        let base_w = base.width(i);
        let step = base_w * 0.01;

        let vmin = top.iter().map(|c| c.params[i]).fold(f64::INFINITY, f64::min);
        let vmax = top
            .iter()
            .map(|c| c.params[i])
            .fold(f64::NEG_INFINITY, f64::max);

        let w = (vmax - vmin).max(step);
        let pad = (w * 0.25).max(base_w * 0.08);
        let mut nl = clamp(vmin - pad, base_l, base_h);
        let mut nh = clamp(vmax + pad, base_l, base_h);
        if nh - nl < step * 2.0 {
            let mid = (nl + nh) / 2.0;
            nl = clamp(mid - step, base_l, base_h);
            nh = clamp(mid + step, base_l, base_h);
        }
        out.lower[i] = nl;
        out.upper[i] = nh;
    }
    out
}

fn push_topk(buf: &mut Vec<Candidate>, cand: Candidate, k: usize) {
    buf.push(cand);
    buf.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(Ordering::Equal));
    buf.truncate(k);
}

/// Biased towards the front of the ranked pool.
fn select_parent<'a>(pool: &'a [Candidate], rng: &mut StdRng) -> Option<&'a Candidate> {
    if pool.is_empty() {
        return None;
    }
    let u: f64 = rng.random();
    let idx = ((u * u) * pool.len() as f64).floor() as usize;
    pool.get(idx.min(pool.len() - 1))
}

fn fingerprint(p: &[f64]) -> Vec<u64> {
    p.iter().map(|v| v.to_bits()).collect()
}

fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if hi <= lo { lo } else { rng.random_range(lo..=hi) }
}

fn gauss(rng: &mut StdRng) -> f64 {
    let u1 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::{Candidate, OptimizerConfig, ParamBounds, optimize, refine_bounds};
    use crate::error::Result;
    use crate::evaluation::CostFunction;

    struct Bowl {
        center: Vec<f64>,
    }

    impl CostFunction for Bowl {
        fn dimension(&self) -> usize {
            self.center.len()
        }

        fn cost(&self, p: &[f64]) -> Result<(f64, f64)> {
            let c = p
                .iter()
                .zip(&self.center)
                .map(|(x, c)| (x - c) * (x - c))
                .sum();
            Ok((c, -1.0))
        }
    }

    #[test]
    fn default_bounds_follow_initial_guess() {
        let b = ParamBounds::around(&super::DEFAULT_INITIAL_GUESS);
        assert!((b.lower[0] - (-8.7 - 13.05)).abs() < 1e-12);
        assert!((b.upper[1] - (10.7 + 16.05)).abs() < 1e-12);
        assert_eq!((b.lower[3], b.upper[3]), (0.01, 0.99));
        assert_eq!((b.lower[4], b.upper[4]), (0.01, 0.99));
        assert_eq!(b.upper[5], 4.0);
        assert!((b.lower[6] - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn finds_bowl_minimum() {
        let bowl = Bowl {
            center: vec![1.0, -2.0, 0.5],
        };
        let bounds = ParamBounds {
            lower: vec![-5.0; 3],
            upper: vec![5.0; 3],
        };
        let config = OptimizerConfig {
            max_evals: 1500,
            tol_f: 0.0,
            patience: 1500,
            seed: 7,
            initial_guess: vec![0.0; 3],
        };
        let out = optimize(&bowl, &bounds, &config).unwrap();
        assert!(out.best.cost < 0.1, "cost {}", out.best.cost);
        assert!(out.evaluations <= 1500);
        for (x, l) in out.best.params.iter().zip(&bounds.lower) {
            assert!(x >= l);
        }
    }

    #[test]
    fn same_seed_same_result() {
        let bowl = Bowl {
            center: vec![0.3, 0.7],
        };
        let bounds = ParamBounds {
            lower: vec![0.0; 2],
            upper: vec![1.0; 2],
        };
        let config = OptimizerConfig {
            max_evals: 200,
            initial_guess: vec![0.5, 0.5],
            ..OptimizerConfig::default()
        };
        let a = optimize(&bowl, &bounds, &config).unwrap();
        let b = optimize(&bowl, &bounds, &config).unwrap();
        assert_eq!(a.best.params, b.best.params);
        assert_eq!(a.evaluations, b.evaluations);
    }

    #[test]
    fn rejects_mismatched_bounds() {
        let bowl = Bowl {
            center: vec![0.0; 3],
        };
        let bounds = ParamBounds {
            lower: vec![0.0; 2],
            upper: vec![1.0; 2],
        };
        assert!(optimize(&bowl, &bounds, &OptimizerConfig::default()).is_err());
    }

    #[test]
    fn refined_bounds_stay_inside_base() {
        let base = ParamBounds {
            lower: vec![0.0],
            upper: vec![10.0],
        };
        let ranked = vec![
            Candidate {
                cost: 1.0,
                params: vec![9.9],
            },
            Candidate {
                cost: 2.0,
                params: vec![9.5],
            },
        ];
        let r = refine_bounds(&base, &ranked);
        assert!(r.lower[0] >= 0.0 && r.upper[0] <= 10.0);
        assert!(r.lower[0] < 9.5 && r.upper[0] >= 9.9);
    }
}
