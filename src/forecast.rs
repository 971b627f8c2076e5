use crate::config::MIN_FORECAST_HISTORY;
use crate::data::PriceSeries;
use crate::models::seasonal::{FitError, SeasonalModel};
use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::info;

/// One (timestamp, value) training row: the close series in date order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub close: f64,
}

/// Reshapes a price series into the two-column training frame, keeping only
/// the date and close fields and preserving order.
pub fn training_frame(series: &PriceSeries) -> Vec<Observation> {
    series
        .candles
        .iter()
        .map(|c| Observation {
            date: c.date,
            close: c.close,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

/// Predictions over the historical range (in-sample fit, not the original
/// actuals) followed by the future horizon at calendar-day granularity.
#[derive(Clone, Debug, PartialEq)]
pub struct ForecastTable {
    pub rows: Vec<ForecastRow>,
    /// Number of leading rows that correspond to historical dates.
    pub history_len: usize,
}

impl ForecastTable {
    pub fn future_rows(&self) -> &[ForecastRow] {
        &self.rows[self.history_len..]
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("not enough history for a long-range forecast: {have} records, need {need}")]
    NotEnoughHistory { have: usize, need: usize },
    #[error("model fit failed: {0}")]
    FitFailed(String),
}

/// Half-width multiplier for the uncertainty band (roughly an 80% interval
/// under normal residuals).
const BAND_Z: f64 = 1.28;

/// Band width grows with distance past the last observed date; in-sample
/// rows keep the plain residual sigma.
fn band_sigma(residual_sigma: f64, days_ahead: i64, n_observations: usize) -> f64 {
    if days_ahead <= 0 {
        return residual_sigma;
    }
    residual_sigma * (1.0 + days_ahead as f64 / n_observations as f64).sqrt()
}

/// Fits the seasonal model on the close series and predicts every date from
/// the first historical record to `horizon_days` calendar days past the
/// last one.
pub fn forecast(series: &PriceSeries, horizon_days: i64) -> Result<ForecastTable, ForecastError> {
    let have = series.len();
    if have < MIN_FORECAST_HISTORY {
        return Err(ForecastError::NotEnoughHistory {
            have,
            need: MIN_FORECAST_HISTORY,
        });
    }

    let frame = training_frame(series);
    let dates: Vec<NaiveDate> = frame.iter().map(|o| o.date).collect();
    let values: Vec<f64> = frame.iter().map(|o| o.close).collect();

    let model = SeasonalModel::fit(&dates, &values).map_err(|e| match e {
        FitError::TooFewObservations { have, need } => {
            ForecastError::NotEnoughHistory { have, need }
        }
        other => ForecastError::FitFailed(other.to_string()),
    })?;

    let last_date = dates[dates.len() - 1];
    let horizon_days = horizon_days.max(0);
    let sigma = model.residual_sigma();
    let n_obs = model.n_observations();

    let mut rows = Vec::with_capacity(have + horizon_days as usize);
    let mut push_row = |date: NaiveDate| {
        let parts = model.components(date);
        let predicted = parts.total();
        let half_width = BAND_Z * band_sigma(sigma, (date - last_date).num_days(), n_obs);
        rows.push(ForecastRow {
            date,
            predicted,
            lower: predicted - half_width,
            upper: predicted + half_width,
            trend: parts.trend,
            weekly: parts.weekly,
            yearly: parts.yearly,
        });
    };

    // Historical range keeps the observed (trading-day) index; the horizon
    // walks calendar days, weekends included.
    for &date in &dates {
        push_row(date);
    }
    for offset in 1..=horizon_days {
        push_row(last_date + Duration::days(offset));
    }

    info!(
        "Forecast for {}: {} historical rows + {} day horizon",
        series.ticker, have, horizon_days
    );

    Ok(ForecastTable {
        rows,
        history_len: have,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ticker;
    use crate::data::Candle;

    fn trending_series(days: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let candles = (0..days)
            .map(|i| {
                let close = 1_000.0 + 3.0 * i as f64;
                Candle {
                    date: start + Duration::days(i as i64),
                    open: close - 1.0,
                    high: close + 2.0,
                    low: close - 2.0,
                    close,
                    volume: 5_000.0,
                }
            })
            .collect();
        PriceSeries {
            ticker: Ticker::BtcUsd,
            candles,
        }
    }

    #[test]
    fn test_training_frame_preserves_order_and_closes() {
        let series = trending_series(10);
        let frame = training_frame(&series);
        assert_eq!(frame.len(), 10);
        assert_eq!(frame[0].close, 1_000.0);
        assert_eq!(frame[9].close, 1_027.0);
        for pair in frame.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn test_short_series_skips_fit() {
        let series = trending_series(MIN_FORECAST_HISTORY - 1);
        assert_eq!(
            forecast(&series, 365),
            Err(ForecastError::NotEnoughHistory {
                have: MIN_FORECAST_HISTORY - 1,
                need: MIN_FORECAST_HISTORY,
            })
        );
    }

    #[test]
    fn test_horizon_extends_by_calendar_days() {
        let series = trending_series(500);
        let table = forecast(&series, 730).unwrap();

        assert_eq!(table.history_len, 500);
        assert_eq!(table.future_rows().len(), 730);

        let last_hist = series.last().unwrap().date;
        let first_future = table.future_rows().first().unwrap().date;
        let last_future = table.future_rows().last().unwrap().date;
        assert_eq!(first_future, last_hist + Duration::days(1));
        assert_eq!(last_future, last_hist + Duration::days(730));

        // The horizon is contiguous daily, weekends included.
        for pair in table.future_rows().windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
    }

    #[test]
    fn test_bounds_bracket_prediction_and_widen() {
        let series = trending_series(600);
        let table = forecast(&series, 365).unwrap();

        for row in &table.rows {
            assert!(row.lower <= row.predicted && row.predicted <= row.upper);
        }

        let first_future = table.future_rows().first().unwrap();
        let last_future = table.future_rows().last().unwrap();
        let near_width = first_future.upper - first_future.lower;
        let far_width = last_future.upper - last_future.lower;
        assert!(far_width > near_width);
    }

    #[test]
    fn test_history_rows_backfill_in_sample_fit() {
        let series = trending_series(500);
        let table = forecast(&series, 365).unwrap();

        // In-sample rows carry the model's fit; on a clean trend it tracks
        // the actuals closely but is not copied from them.
        let mid = &table.rows[250];
        let actual = series.candles[250].close;
        assert!((mid.predicted - actual).abs() < actual * 0.02);
    }

    #[test]
    fn test_decomposition_sums_to_prediction() {
        let series = trending_series(450);
        let table = forecast(&series, 365).unwrap();
        for row in table.rows.iter().step_by(37) {
            let sum = row.trend + row.weekly + row.yearly;
            assert!((sum - row.predicted).abs() < 1e-9);
        }
    }

    #[test]
    fn test_trend_continues_upward_on_trending_series() {
        let series = trending_series(730);
        let table = forecast(&series, 365).unwrap();
        let last_hist = table.rows[table.history_len - 1].predicted;
        let far_future = table.future_rows().last().unwrap().predicted;
        assert!(far_future > last_hist);
    }
}
