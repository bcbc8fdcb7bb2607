/// Splits a day's investable cash across the buy set.
///
/// `allocate` returns one dollar amount per entry of `candidates`, each
/// non-negative and together at most `cash`. Every candidate has a positive
/// price.
pub trait AllocationPolicy: Send + Sync {
    fn allocate(
        &self,
        cash: f64,
        candidates: &[usize],
        quality: &[f64],
        prices: &[f64],
    ) -> Vec<f64>;

    fn name(&self) -> &'static str;
}

/// Same dollar amount in every candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct EqualWeight;

impl AllocationPolicy for EqualWeight {
    fn allocate(
        &self,
        cash: f64,
        candidates: &[usize],
        _quality: &[f64],
        _prices: &[f64],
    ) -> Vec<f64> {
        if candidates.is_empty() {
            return Vec::new();
        }
        vec![cash / candidates.len() as f64; candidates.len()]
    }

    fn name(&self) -> &'static str {
        "equal"
    }
}

/// Dollars proportional to quality. Falls back to equal weights when the
/// candidates' quality does not sum to a positive number.
#[derive(Clone, Copy, Debug, Default)]
pub struct QualityWeighted;

impl AllocationPolicy for QualityWeighted {
    fn allocate(
        &self,
        cash: f64,
        candidates: &[usize],
        quality: &[f64],
        prices: &[f64],
    ) -> Vec<f64> {
        let weights: Vec<f64> = candidates.iter().map(|&s| quality[s].max(0.0)).collect();
        split_by_weight(cash, &weights)
            .unwrap_or_else(|| EqualWeight.allocate(cash, candidates, quality, prices))
    }

    fn name(&self) -> &'static str {
        "quality"
    }
}

/// Dollars proportional to 1 / price, so cheaper instruments get more.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheapestBiased;

impl AllocationPolicy for CheapestBiased {
    fn allocate(
        &self,
        cash: f64,
        candidates: &[usize],
        quality: &[f64],
        prices: &[f64],
    ) -> Vec<f64> {
        let weights: Vec<f64> = candidates.iter().map(|&s| 1.0 / prices[s]).collect();
        split_by_weight(cash, &weights)
            .unwrap_or_else(|| EqualWeight.allocate(cash, candidates, quality, prices))
    }

    fn name(&self) -> &'static str {
        "cheapest"
    }
}

/// Everything into the highest-quality candidate; ties go to the lower index.
#[derive(Clone, Copy, Debug, Default)]
pub struct BestOnly;

impl AllocationPolicy for BestOnly {
    fn allocate(
        &self,
        cash: f64,
        candidates: &[usize],
        quality: &[f64],
        _prices: &[f64],
    ) -> Vec<f64> {
        let mut out = vec![0.0; candidates.len()];
        let mut best: Option<usize> = None;
        for (i, &s) in candidates.iter().enumerate() {
            if best.is_none_or(|b| quality[s] > quality[candidates[b]]) {
                best = Some(i);
            }
        }
        if let Some(b) = best {
            out[b] = cash;
        }
        out
    }

    fn name(&self) -> &'static str {
        "best"
    }
}

fn split_by_weight(cash: f64, weights: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    Some(weights.iter().map(|w| cash * w / total).collect())
}

#[cfg(test)]
mod tests {
    use super::{AllocationPolicy, BestOnly, CheapestBiased, EqualWeight, QualityWeighted};

    const QUALITY: [f64; 3] = [0.2, 0.6, 0.2];
    const PRICES: [f64; 3] = [10.0, 20.0, 40.0];

    fn total(v: &[f64]) -> f64 {
        v.iter().sum()
    }

    #[test]
    fn equal_splits_evenly() {
        let out = EqualWeight.allocate(90.0, &[0, 1, 2], &QUALITY, &PRICES);
        assert_eq!(out, vec![30.0, 30.0, 30.0]);
        assert!(EqualWeight.allocate(90.0, &[], &QUALITY, &PRICES).is_empty());
    }

    #[test]
    fn quality_weights_by_score() {
        let out = QualityWeighted.allocate(100.0, &[0, 1, 2], &QUALITY, &PRICES);
        assert!((out[1] - 60.0).abs() < 1e-9);
        assert!((total(&out) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn quality_falls_back_to_equal_when_non_positive() {
        let out = QualityWeighted.allocate(10.0, &[0, 1], &[-1.0, 0.0], &PRICES);
        assert_eq!(out, vec![5.0, 5.0]);
    }

    #[test]
    fn cheapest_gets_the_most() {
        let out = CheapestBiased.allocate(70.0, &[0, 1, 2], &QUALITY, &PRICES);
        assert!((out[0] - 40.0).abs() < 1e-9);
        assert!((out[1] - 20.0).abs() < 1e-9);
        assert!((out[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn best_only_takes_first_maximum() {
        let out = BestOnly.allocate(50.0, &[0, 2], &QUALITY, &PRICES);
        assert_eq!(out, vec![50.0, 0.0]);
        let out = BestOnly.allocate(50.0, &[0, 1, 2], &QUALITY, &PRICES);
        assert_eq!(out, vec![0.0, 50.0, 0.0]);
    }
}
