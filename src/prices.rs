use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SimError};
use crate::grid::Grid;

/// Immutable day×instrument price history. Every cell is finite and
/// non-negative; there is at least one day and one instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceMatrix {
    grid: Grid,
}

impl PriceMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let days = rows.len();
        if days == 0 {
            return Err(SimError::InvalidPrices(
                "price matrix has 0 days; need at least 1".to_string(),
            ));
        }
        let instruments = rows[0].len();
        if instruments == 0 {
            return Err(SimError::InvalidPrices(
                "price matrix has 0 instruments; need at least 1".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(days * instruments);
        for (d, row) in rows.into_iter().enumerate() {
            if row.len() != instruments {
                return Err(SimError::InvalidPrices(format!(
                    "day {d} has {} prices, expected {instruments} (shape {days}x{instruments})",
                    row.len()
                )));
            }
            for (s, &p) in row.iter().enumerate() {
                check_price(d, s, p)?;
            }
            data.extend(row);
        }

        Ok(Self {
            grid: Grid::from_flat(days, instruments, data),
        })
    }

    /// Headerless CSV, one line per day and one column per instrument.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (d, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let mut row = Vec::with_capacity(rec.len());
            for (s, field) in rec.iter().enumerate() {
                let p = field.parse::<f64>().map_err(|_| {
                    SimError::InvalidPrices(format!(
                        "day {d}, instrument {s}: '{field}' is not a number"
                    ))
                })?;
                row.push(p);
            }
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let prices = Self::from_csv_reader(file)?;
        debug!(
            path = %path.display(),
            days = prices.days(),
            instruments = prices.instruments(),
            "loaded price matrix"
        );
        for w in prices.degenerate_warnings() {
            warn!(path = %path.display(), "{w}");
        }
        Ok(prices)
    }

    /// Valid but unusable traits of the history: too few days to trade on,
    /// instruments priced at zero (never bought).
    pub fn degenerate_warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.days() < 3 {
            out.push(format!(
                "{} days of prices leave no trading day; the result is the initial cash",
                self.days()
            ));
        }
        for s in 0..self.instruments() {
            let zero_days = (0..self.days()).filter(|&d| self.get(d, s) == 0.0).count();
            if zero_days > 0 {
                out.push(format!(
                    "instrument {s} is priced at 0 on {zero_days} days and cannot be bought then"
                ));
            }
        }
        out
    }

    pub fn days(&self) -> usize {
        self.grid.days()
    }

    pub fn instruments(&self) -> usize {
        self.grid.instruments()
    }

    pub fn day(&self, day: usize) -> &[f64] {
        self.grid.row(day)
    }

    pub fn get(&self, day: usize, instrument: usize) -> f64 {
        self.grid.get(day, instrument)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Single-instrument matrix holding column `instrument`.
    pub fn select(&self, instrument: usize) -> Result<Self> {
        if instrument >= self.instruments() {
            return Err(SimError::ShapeMismatch {
                expected: instrument + 1,
                actual: self.instruments(),
            });
        }
        let col = self.grid.column(instrument);
        Ok(Self {
            grid: Grid::from_flat(col.len(), 1, col),
        })
    }
}

fn check_price(day: usize, instrument: usize, price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(SimError::InvalidPrices(format!(
            "day {day}, instrument {instrument}: price {price} must be finite and >= 0"
        )));
    }
    Ok(())
}
