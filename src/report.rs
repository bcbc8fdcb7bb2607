//! Flat exports of a run's history for plotting outside this crate.

use std::io::Write;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::prices::PriceMatrix;
use crate::simulator::SimulationHistory;
use crate::smoothing::SmoothedState;

#[derive(Debug, Serialize)]
struct DayRow {
    day: usize,
    cash: f64,
    investment_value: f64,
    portfolio_value: f64,
    buy_threshold: f64,
    sell_threshold: f64,
    held: usize,
    sold: usize,
    bought: usize,
}

#[derive(Debug, Serialize)]
struct InstrumentRow {
    day: usize,
    instrument: usize,
    price: f64,
    smoothed_price: f64,
    velocity: f64,
    acceleration: f64,
    volatility: f64,
    quality: f64,
    holdings: f64,
}

#[derive(Debug, Serialize)]
struct SmoothingRow {
    phi: f64,
    day: usize,
    price: f64,
    smoothed_price: f64,
    velocity: f64,
    acceleration: f64,
    volatility: f64,
}

/// One line per day: balances, thresholds and trade counts.
///
/// `investment_value` and `held` describe the positions after the day's
/// trades, valued at that day's prices, so `portfolio_value` only drops by
/// the fees on a trading day.
pub fn write_summary_csv<W: Write>(history: &SimulationHistory, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for day in 0..history.cash.len() {
        let trade = history.trades.iter().find(|t| t.day == day);
        let (proceeds, invested) = trade.map_or((0.0, 0.0), |t| (t.proceeds, t.invested));
        let investment_value = history.investment_value[day] - proceeds + invested;

        // holdings row `day` is already past the sells; add what was bought
        let held = history
            .holdings
            .row(day)
            .iter()
            .enumerate()
            .filter(|&(s, &h)| h > 0.0 || trade.is_some_and(|t| t.bought.contains(&s)))
            .count();

        wtr.serialize(DayRow {
            day,
            cash: history.cash[day],
            investment_value,
            portfolio_value: history.cash[day] + investment_value,
            buy_threshold: history.thresholds[day].buy,
            sell_threshold: history.thresholds[day].sell,
            held,
            sold: trade.map_or(0, |t| t.sold.len()),
            bought: trade.map_or(0, |t| t.bought.len()),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// One line per day and instrument.
pub fn write_instruments_csv<W: Write>(
    history: &SimulationHistory,
    prices: &PriceMatrix,
    out: W,
) -> Result<()> {
    if prices.days() != history.cash.len()
        || prices.instruments() != history.quality.instruments()
    {
        return Err(SimError::InvalidPrices(format!(
            "history covers {} days x {} instruments, prices are {} x {}",
            history.cash.len(),
            history.quality.instruments(),
            prices.days(),
            prices.instruments()
        )));
    }

    let s = &history.smoothed;
    let mut wtr = csv::Writer::from_writer(out);
    for day in 0..prices.days() {
        for instrument in 0..prices.instruments() {
            wtr.serialize(InstrumentRow {
                day,
                instrument,
                price: prices.get(day, instrument),
                smoothed_price: s.price.get(day, instrument),
                velocity: s.velocity.get(day, instrument),
                acceleration: s.acceleration.get(day, instrument),
                volatility: s.variance.get(day, instrument).sqrt(),
                quality: history.quality.get(day, instrument),
                holdings: history.holdings.get(day, instrument),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Smoothed series of a single-instrument matrix under several forgetting
/// factors, grouped by factor.
pub fn write_smoothing_csv<W: Write>(
    prices: &PriceMatrix,
    runs: &[(f64, SmoothedState)],
    out: W,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for (phi, state) in runs {
        for day in 0..state.days() {
            wtr.serialize(SmoothingRow {
                phi: *phi,
                day,
                price: prices.get(day, 0),
                smoothed_price: state.price.get(day, 0),
                velocity: state.velocity.get(day, 0),
                acceleration: state.acceleration.get(day, 0),
                volatility: state.variance.get(day, 0).sqrt(),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_history_json<W: Write>(history: &SimulationHistory, out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, history).map_err(std::io::Error::from)?;
    Ok(())
}
