use crate::data::PriceSeries;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("need at least {need} records, series has {have}")]
    NotEnoughHistory { have: usize, need: usize },
    #[error("{which} close is not a positive price")]
    DegenerateClose { which: &'static str },
    #[error("investment amount must be a positive number")]
    InvalidInvestment,
}

/// Headline numbers for the metrics row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarketSnapshot {
    pub last_close: f64,
    pub previous_close: f64,
    pub delta_percent: f64,
    pub last_volume: f64,
}

/// Takes the closing prices of the final two records and derives the
/// day-over-day move. A series shorter than two records has no defined
/// delta and is rejected rather than indexed out of range.
pub fn snapshot(series: &PriceSeries) -> Result<MarketSnapshot, MetricsError> {
    let n = series.len();
    if n < 2 {
        return Err(MetricsError::NotEnoughHistory { have: n, need: 2 });
    }
    let last = &series.candles[n - 1];
    let previous = &series.candles[n - 2];
    if !(previous.close.is_finite() && previous.close > 0.0) {
        return Err(MetricsError::DegenerateClose { which: "previous" });
    }

    Ok(MarketSnapshot {
        last_close: last.close,
        previous_close: previous.close,
        delta_percent: (last.close - previous.close) / previous.close * 100.0,
        last_volume: last.volume,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoiOutcome {
    Gain,
    Loss,
}

/// Lump-sum purchase at the first recorded close, valued at the last.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiSimulation {
    pub invested: f64,
    pub coins_owned: f64,
    pub current_value: f64,
    pub profit: f64,
    pub roi_percent: f64,
}

impl RoiSimulation {
    /// A break-even simulation still counts as a gain for display purposes.
    pub fn outcome(&self) -> RoiOutcome {
        if self.profit >= 0.0 {
            RoiOutcome::Gain
        } else {
            RoiOutcome::Loss
        }
    }
}

pub fn simulate_roi(series: &PriceSeries, invested: f64) -> Result<RoiSimulation, MetricsError> {
    if !(invested.is_finite() && invested > 0.0) {
        return Err(MetricsError::InvalidInvestment);
    }
    let first = series
        .first()
        .ok_or(MetricsError::NotEnoughHistory { have: 0, need: 1 })?;
    let last = series
        .last()
        .ok_or(MetricsError::NotEnoughHistory { have: 0, need: 1 })?;
    if !(first.close.is_finite() && first.close > 0.0) {
        return Err(MetricsError::DegenerateClose { which: "first" });
    }

    let coins_owned = invested / first.close;
    let current_value = coins_owned * last.close;
    let profit = current_value - invested;

    Ok(RoiSimulation {
        invested,
        coins_owned,
        current_value,
        profit,
        roi_percent: profit / invested * 100.0,
    })
}
