use serde::Serialize;

use crate::thresholds::Thresholds;

/// What the decision rule wants done today. Indices are instrument numbers in
/// ascending order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub sell: Vec<usize>,
    pub buy: Vec<usize>,
}

/// Turns a day's quality row into sell and buy sets.
pub trait DecisionRule: Send + Sync {
    fn decide(&self, quality: &[f64], thresholds: Thresholds, held: &[bool]) -> Decision;

    fn name(&self) -> &'static str;
}

/// Sell held instruments below the sell threshold, consider buying anything
/// above the buy threshold.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdCrossing {
    /// Cancel all sells on days with no buy candidate.
    pub hold_cash_only_with_target: bool,
}

impl Default for ThresholdCrossing {
    fn default() -> Self {
        Self {
            hold_cash_only_with_target: true,
        }
    }
}

impl DecisionRule for ThresholdCrossing {
    fn decide(&self, quality: &[f64], thresholds: Thresholds, held: &[bool]) -> Decision {
        let buy: Vec<usize> = quality
            .iter()
            .enumerate()
            .filter(|&(_, &q)| q > thresholds.buy)
            .map(|(s, _)| s)
            .collect();

        if buy.is_empty() && self.hold_cash_only_with_target {
            return Decision {
                sell: Vec::new(),
                buy,
            };
        }

        let sell = quality
            .iter()
            .zip(held)
            .enumerate()
            .filter(|&(_, (&q, &h))| h && q < thresholds.sell)
            .map(|(s, _)| s)
            .collect();

        Decision { sell, buy }
    }

    fn name(&self) -> &'static str {
        "threshold-crossing"
    }
}

#[cfg(test)]
mod tests {
    use super::{DecisionRule, ThresholdCrossing};
    use crate::thresholds::Thresholds;

    const T: Thresholds = Thresholds {
        buy: 0.5,
        sell: -0.5,
    };

    #[test]
    fn sells_only_held_instruments() {
        let d = ThresholdCrossing::default().decide(
            &[-1.0, -1.0, 1.0],
            T,
            &[true, false, false],
        );
        assert_eq!(d.sell, vec![0]);
        assert_eq!(d.buy, vec![2]);
    }

    #[test]
    fn no_buy_candidate_cancels_sells() {
        let d = ThresholdCrossing::default().decide(&[-1.0, -2.0, 0.0], T, &[true, true, true]);
        assert!(d.sell.is_empty());
        assert!(d.buy.is_empty());
    }

    #[test]
    fn uncoupled_rule_sells_without_target() {
        let rule = ThresholdCrossing {
            hold_cash_only_with_target: false,
        };
        let d = rule.decide(&[-1.0, 0.0], T, &[true, true]);
        assert_eq!(d.sell, vec![0]);
        assert!(d.buy.is_empty());
    }

    #[test]
    fn thresholds_are_strict() {
        let d = ThresholdCrossing::default().decide(&[0.5, -0.5, 0.6], T, &[true, true, false]);
        assert_eq!(d.buy, vec![2]);
        assert!(d.sell.is_empty());
    }
}
