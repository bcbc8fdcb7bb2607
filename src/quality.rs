use crate::params::PolicyParams;
use crate::smoothing::SmoothedRow;

/// Scores how desirable each instrument is on one day. Higher is a better
/// buy, lower a better sell.
pub trait QualityScorer: Send + Sync {
    /// Number of weights read from the parameters (q1, q2, ...).
    fn required_weights(&self) -> usize {
        3
    }

    fn score(&self, row: SmoothedRow<'_>, params: &PolicyParams, out: &mut [f64]);

    fn name(&self) -> &'static str;
}

/// `q1 * velocity + q2 * acceleration + q3 * volatility`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearQuality;

impl QualityScorer for LinearQuality {
    fn score(&self, row: SmoothedRow<'_>, params: &PolicyParams, out: &mut [f64]) {
        let [q1, q2, q3] = params.quality_weights;
        for (s, q) in out.iter_mut().enumerate() {
            *q = q1 * row.velocity[s] + q2 * row.acceleration[s] + q3 * row.variance[s].sqrt();
        }
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// The linear score plus volatility-scaled velocity and acceleration terms
/// weighted by q4 and q5.
#[derive(Clone, Copy, Debug, Default)]
pub struct InteractionQuality;

impl QualityScorer for InteractionQuality {
    fn required_weights(&self) -> usize {
        5
    }

    fn score(&self, row: SmoothedRow<'_>, params: &PolicyParams, out: &mut [f64]) {
        LinearQuality.score(row, params, out);
        let q4 = params.weight(3).unwrap_or(0.0);
        let q5 = params.weight(4).unwrap_or(0.0);
        for (s, q) in out.iter_mut().enumerate() {
            let vol = row.variance[s].sqrt();
            *q += q4 * vol * row.velocity[s] + q5 * vol * row.acceleration[s];
        }
    }

    fn name(&self) -> &'static str {
        "interaction"
    }
}

#[cfg(test)]
mod tests {
    use super::{InteractionQuality, LinearQuality, QualityScorer};
    use crate::params::PolicyParams;
    use crate::smoothing::SmoothedRow;

    fn row<'a>(v: &'a [f64], a: &'a [f64], var: &'a [f64]) -> SmoothedRow<'a> {
        SmoothedRow {
            price: v,
            velocity: v,
            acceleration: a,
            variance: var,
        }
    }

    #[test]
    fn linear_combines_three_signals() {
        let p = PolicyParams::from_slice(&[2.0, -1.0, 0.5, 0.5, 0.5, 0.0, 0.0]).unwrap();
        let mut out = [0.0; 2];
        LinearQuality.score(row(&[0.1, -0.2], &[0.04, 0.0], &[0.09, 0.0]), &p, &mut out);
        assert!((out[0] - (0.2 - 0.04 + 0.15)).abs() < 1e-12);
        assert!((out[1] + 0.4).abs() < 1e-12);
    }

    #[test]
    fn interaction_adds_volatility_products() {
        let p = PolicyParams::from_slice(&[0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 10.0, 4.0]).unwrap();
        let mut out = [0.0];
        InteractionQuality.score(row(&[0.1], &[0.05], &[0.04]), &p, &mut out);
        // vol = 0.2
        assert!((out[0] - (10.0 * 0.2 * 0.1 + 4.0 * 0.2 * 0.05)).abs() < 1e-12);
        assert_eq!(InteractionQuality.required_weights(), 5);
    }
}
