use serde::Serialize;
use tracing::trace;

use crate::allocation::AllocationPolicy;
use crate::grid::Grid;

/// Cash, positions and marked value for every day of one run.
///
/// `cash[d]` is the balance after day `d`'s trades; `holdings` row `d` is the
/// position after day `d`'s sells. Both are carried into `d + 1` by
/// [`Ledger::carry_forward`].
#[derive(Clone, Debug, Serialize)]
pub struct Ledger {
    pub cash: Vec<f64>,
    pub holdings: Grid,
    pub investment_value: Vec<f64>,
}

/// Result of a day's selling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sale {
    pub instruments: Vec<usize>,
    pub proceeds: f64,
    pub fees: f64,
}

/// Result of a day's buying.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Purchase {
    /// Instruments that were bought, ascending.
    pub instruments: Vec<usize>,
    /// Shares added per instrument, one entry for every instrument.
    pub shares: Vec<f64>,
    pub invested: f64,
    pub fees: f64,
}

impl Ledger {
    pub fn new(days: usize, instruments: usize, initial_cash: f64) -> Self {
        let mut cash = vec![0.0; days];
        for c in cash.iter_mut().take(2) {
            *c = initial_cash;
        }
        Self {
            cash,
            holdings: Grid::zeros(days, instruments),
            investment_value: vec![0.0; days],
        }
    }

    pub fn instruments(&self) -> usize {
        self.holdings.instruments()
    }

    pub fn held(&self, day: usize) -> Vec<bool> {
        self.holdings.row(day).iter().map(|&h| h > 0.0).collect()
    }

    pub fn held_instruments(&self, day: usize) -> Vec<usize> {
        self.holdings
            .row(day)
            .iter()
            .enumerate()
            .filter(|&(_, &h)| h > 0.0)
            .map(|(s, _)| s)
            .collect()
    }

    /// Records and returns the value of the positions held on `day`.
    pub fn mark_to_market(&mut self, day: usize, prices: &[f64]) -> f64 {
        let value: f64 = self
            .holdings
            .row(day)
            .iter()
            .zip(prices)
            .filter(|&(&h, _)| h > 0.0)
            .fold(0.0, |acc, (&h, &p)| acc + h * p);
        self.investment_value[day] = value;
        value
    }

    /// Liquidates every instrument in `sell` in full, one fee each.
    ///
    /// The whole set is skipped when proceeds plus cash on hand would not
    /// cover the fees.
    pub fn sell(&mut self, day: usize, sell: &[usize], prices: &[f64], fee: f64) -> Sale {
        if sell.is_empty() {
            return Sale::default();
        }
        let proceeds: f64 = sell
            .iter()
            .map(|&s| prices[s] * self.holdings.get(day, s))
            .sum();
        let fees = fee * sell.len() as f64;
        if self.cash[day] + proceeds < fees {
            trace!(
                day,
                cash = self.cash[day],
                proceeds,
                fees,
                "proceeds do not cover fees, skipping sells"
            );
            return Sale::default();
        }

        let row = self.holdings.row_mut(day);
        for &s in sell {
            row[s] = 0.0;
        }
        self.cash[day] += proceeds;
        self.cash[day] -= fees;
        trace!(day, count = sell.len(), proceeds, "sold");
        Sale {
            instruments: sell.to_vec(),
            proceeds,
            fees,
        }
    }

    /// Buys the positive-priced members of `candidates`.
    ///
    /// One fee is charged per instrument, then `invest_fraction` of the
    /// remaining cash is split by `allocation`. Nothing happens when the cash
    /// on hand does not exceed the fees, so cash and positions never go
    /// negative.
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        day: usize,
        candidates: &[usize],
        invest_fraction: f64,
        fee: f64,
        quality: &[f64],
        prices: &[f64],
        allocation: &dyn AllocationPolicy,
    ) -> Purchase {
        let mut purchase = Purchase {
            shares: vec![0.0; self.instruments()],
            ..Purchase::default()
        };

        let buyable: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&s| prices[s] > 0.0)
            .collect();
        let fees = fee * buyable.len() as f64;
        if buyable.is_empty() || self.cash[day] <= fees {
            if !buyable.is_empty() {
                trace!(
                    day,
                    cash = self.cash[day],
                    fees,
                    "cash does not cover fees, skipping buys"
                );
            }
            return purchase;
        }

        self.cash[day] -= fees;
        let to_invest = self.cash[day] * invest_fraction;
        let dollars = allocation.allocate(to_invest, &buyable, quality, prices);
        debug_assert_eq!(dollars.len(), buyable.len());

        let mut invested = 0.0;
        for (&s, &amount) in buyable.iter().zip(&dollars) {
            let amount = amount.max(0.0);
            purchase.shares[s] = amount / prices[s];
            invested += amount;
        }
        self.cash[day] -= invested;

        trace!(day, count = buyable.len(), invested, "bought");
        purchase.instruments = buyable;
        purchase.invested = invested;
        purchase.fees = fees;
        purchase
    }

    /// Moves positions plus today's purchases into `day + 1` and accrues
    /// interest on the remaining cash.
    pub fn carry_forward(&mut self, day: usize, bought: &[f64], daily_growth: f64) {
        let next = day + 1;
        self.holdings.copy_row(day, next);
        for (h, &b) in self.holdings.row_mut(next).iter_mut().zip(bought) {
            *h += b;
        }
        self.cash[next] = self.cash[day] * daily_growth;
    }
}

#[cfg(test)]
mod tests {
    use super::Ledger;
    use crate::allocation::EqualWeight;

    #[test]
    fn seeds_first_two_days() {
        let l = Ledger::new(4, 2, 1000.0);
        assert_eq!(l.cash, vec![1000.0, 1000.0, 0.0, 0.0]);
        let l = Ledger::new(1, 2, 50.0);
        assert_eq!(l.cash, vec![50.0]);
    }

    #[test]
    fn buy_charges_fee_per_instrument_then_invests_fraction() {
        let mut l = Ledger::new(3, 2, 1000.0);
        let p = l.buy(1, &[0, 1], 0.5, 2.0, &[1.0, 1.0], &[10.0, 20.0], &EqualWeight);
        // (1000 - 4) * 0.5 split in two
        assert_eq!(p.instruments, vec![0, 1]);
        assert!((p.shares[0] - 24.9).abs() < 1e-12);
        assert!((p.shares[1] - 12.45).abs() < 1e-12);
        assert!((l.cash[1] - 498.0).abs() < 1e-12);
        assert_eq!(p.fees, 4.0);
    }

    #[test]
    fn zero_priced_candidates_are_skipped() {
        let mut l = Ledger::new(3, 2, 100.0);
        let p = l.buy(1, &[0, 1], 1.0, 1.0, &[1.0, 1.0], &[0.0, 9.0], &EqualWeight);
        assert_eq!(p.instruments, vec![1]);
        assert_eq!(p.shares[0], 0.0);
        assert!((p.shares[1] - 11.0).abs() < 1e-12);
        assert!(l.cash[1].abs() < 1e-12);
    }

    #[test]
    fn buys_skipped_when_fees_exceed_cash() {
        let mut l = Ledger::new(3, 3, 5.0);
        let p = l.buy(1, &[0, 1, 2], 0.9, 2.0, &[1.0; 3], &[1.0; 3], &EqualWeight);
        assert!(p.instruments.is_empty());
        assert_eq!(l.cash[1], 5.0);
    }

    #[test]
    fn sell_zeroes_position_and_charges_one_fee_each() {
        let mut l = Ledger::new(3, 2, 0.0);
        l.holdings.row_mut(1).copy_from_slice(&[3.0, 4.0]);
        let sale = l.sell(1, &[0, 1], &[10.0, 5.0], 2.0);
        assert_eq!(sale.proceeds, 50.0);
        assert_eq!(sale.fees, 4.0);
        assert_eq!(l.cash[1], 46.0);
        assert_eq!(l.holdings.row(1), &[0.0, 0.0]);
        assert!(l.held_instruments(1).is_empty());
    }

    #[test]
    fn sell_skipped_when_fees_would_overdraw() {
        let mut l = Ledger::new(3, 1, 0.0);
        l.cash[1] = 0.5;
        l.holdings.row_mut(1)[0] = 1.0;
        let sale = l.sell(1, &[0], &[1.0], 2.0);
        assert!(sale.instruments.is_empty());
        assert_eq!(l.cash[1], 0.5);
        assert_eq!(l.holdings.get(1, 0), 1.0);
    }

    #[test]
    fn carry_forward_adds_purchases_and_accrues() {
        let mut l = Ledger::new(3, 2, 100.0);
        l.holdings.row_mut(1).copy_from_slice(&[1.0, 0.0]);
        l.carry_forward(1, &[0.5, 2.0], 1.01);
        assert_eq!(l.holdings.row(2), &[1.5, 2.0]);
        assert!((l.cash[2] - 101.0).abs() < 1e-12);
        assert_eq!(l.held(2), vec![true, true]);
        assert!((l.mark_to_market(2, &[2.0, 3.0]) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn empty_book_marks_to_positive_zero() {
        let mut l = Ledger::new(3, 2, 100.0);
        let v = l.mark_to_market(1, &[4.0, 5.0]);
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
        assert!(l.investment_value[1].is_sign_positive());
    }
}
