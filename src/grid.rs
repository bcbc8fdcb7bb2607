use serde::Serialize;

/// Dense day×instrument table stored row-major, one row per day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Grid {
    days: usize,
    instruments: usize,
    data: Vec<f64>,
}

impl Grid {
    pub fn zeros(days: usize, instruments: usize) -> Self {
        Self {
            days,
            instruments,
            data: vec![0.0; days * instruments],
        }
    }

    pub(crate) fn from_flat(days: usize, instruments: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), days * instruments);
        Self {
            days,
            instruments,
            data,
        }
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn instruments(&self) -> usize {
        self.instruments
    }

    pub fn row(&self, day: usize) -> &[f64] {
        let start = day * self.instruments;
        &self.data[start..start + self.instruments]
    }

    pub fn row_mut(&mut self, day: usize) -> &mut [f64] {
        let start = day * self.instruments;
        &mut self.data[start..start + self.instruments]
    }

    pub fn get(&self, day: usize, instrument: usize) -> f64 {
        self.data[day * self.instruments + instrument]
    }

    /// One instrument's value on every day.
    pub fn column(&self, instrument: usize) -> Vec<f64> {
        (0..self.days).map(|d| self.get(d, instrument)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.instruments.max(1))
    }

    /// Copies row `from` over row `to`.
    pub fn copy_row(&mut self, from: usize, to: usize) {
        let n = self.instruments;
        self.data.copy_within(from * n..from * n + n, to * n);
    }
}
