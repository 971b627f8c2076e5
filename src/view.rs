use crate::config::Selection;
use crate::data::{DataError, PriceSeries};
use crate::forecast::{self, ForecastError};
use crate::metrics::{self, MarketSnapshot, MetricsError, RoiSimulation};
use crate::sentiment::{Mood, SentimentError, SentimentReading};
use chrono::{Datelike, NaiveDate};

/// How many raw rows the historical tab's table shows.
const TAIL_ROWS: usize = 8;

/// Everything one render cycle produces, computed from immutable snapshots.
/// The hosting UI decides when to rebuild it.
#[derive(Debug)]
pub struct DashboardView {
    pub title: String,
    pub outcome: ViewOutcome,
}

#[derive(Debug)]
pub enum ViewOutcome {
    /// The market fetch failed; nothing else was computed this cycle.
    DataUnavailable {
        message: String,
        hints: Vec<String>,
    },
    Ready(Box<ReadyView>),
}

#[derive(Debug)]
pub struct ReadyView {
    pub metrics: Result<MarketSnapshot, MetricsError>,
    pub roi: Result<RoiSimulation, MetricsError>,
    pub sentiment: SentimentPanel,
    pub historical: HistoricalView,
    pub forecast: ForecastPanel,
}

#[derive(Debug)]
pub enum SentimentPanel {
    Reading { value: u8, label: String, mood: Mood },
    Unavailable { reason: String },
}

#[derive(Clone, Copy, Debug)]
pub struct TailRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug)]
pub struct HistoricalView {
    pub open_points: Vec<(f64, f64)>,
    pub close_points: Vec<(f64, f64)>,
    /// Date per point index, for axis labels under a windowed view.
    pub dates: Vec<NaiveDate>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub tail: Vec<TailRow>,
}

#[derive(Debug)]
pub enum ForecastPanel {
    Ready(Box<ForecastChart>),
    /// Insufficient history or a failed fit; the rest of the page stands.
    Warning(String),
}

#[derive(Debug)]
pub struct ForecastChart {
    /// Observed closes, for context under the fitted line.
    pub actual_points: Vec<(f64, f64)>,
    pub predicted_points: Vec<(f64, f64)>,
    pub lower_points: Vec<(f64, f64)>,
    pub upper_points: Vec<(f64, f64)>,
    pub trend_points: Vec<(f64, f64)>,
    /// Weekly component by day of week (0 = Monday).
    pub weekly_profile: Vec<(f64, f64)>,
    /// Yearly component by day of year.
    pub yearly_profile: Vec<(f64, f64)>,
    pub history_len: usize,
    pub horizon_days: i64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Builds the view model for one render cycle. Pure: all inputs are
/// snapshots taken by the caller, and a failed fetch short-circuits into a
/// single error state without touching metrics, charts, or the forecast.
pub fn build(
    selection: Selection,
    fetch: &Result<PriceSeries, DataError>,
    sentiment_outcome: &Result<SentimentReading, SentimentError>,
) -> DashboardView {
    let title = format!("{} Prediction Dashboard", selection.ticker);

    let series = match fetch {
        Ok(series) if !series.is_empty() => series,
        Ok(_) => {
            return DashboardView {
                title,
                outcome: ViewOutcome::DataUnavailable {
                    message: format!("No rows were returned for {}.", selection.ticker),
                    hints: vec![
                        "The provider answered but carried no rows for the requested range."
                            .to_string(),
                        "Press 'r' to reload, or pick a different asset.".to_string(),
                    ],
                },
            };
        }
        Err(err) => {
            return DashboardView {
                title,
                outcome: ViewOutcome::DataUnavailable {
                    message: err.to_string(),
                    hints: err.hints().iter().map(|h| h.to_string()).collect(),
                },
            };
        }
    };

    let sentiment = match sentiment_outcome {
        Ok(reading) => SentimentPanel::Reading {
            value: reading.value,
            label: reading.label.clone(),
            mood: reading.mood(),
        },
        Err(err) => SentimentPanel::Unavailable {
            reason: err.to_string(),
        },
    };

    let ready = ReadyView {
        metrics: metrics::snapshot(series),
        roi: metrics::simulate_roi(series, selection.investment_usd),
        sentiment,
        historical: historical_view(series),
        forecast: forecast_panel(series, selection.horizon_days()),
    };

    DashboardView {
        title,
        outcome: ViewOutcome::Ready(Box::new(ready)),
    }
}

fn historical_view(series: &PriceSeries) -> HistoricalView {
    let open_points = series
        .candles
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f64, c.open))
        .collect();
    let close_points = series
        .candles
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f64, c.close))
        .collect();

    let tail_start = series.len().saturating_sub(TAIL_ROWS);
    let tail = series.candles[tail_start..]
        .iter()
        .map(|c| TailRow {
            date: c.date,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        })
        .collect();

    HistoricalView {
        open_points,
        close_points,
        dates: series.candles.iter().map(|c| c.date).collect(),
        first_date: series.candles[0].date,
        last_date: series.candles[series.len() - 1].date,
        tail,
    }
}

fn forecast_panel(series: &PriceSeries, horizon_days: i64) -> ForecastPanel {
    let table = match forecast::forecast(series, horizon_days) {
        Ok(table) => table,
        Err(err @ ForecastError::NotEnoughHistory { .. }) => {
            return ForecastPanel::Warning(format!(
                "Not enough data for a long-range forecast yet: {}.",
                err
            ));
        }
        Err(err @ ForecastError::FitFailed(_)) => {
            return ForecastPanel::Warning(format!("Forecast unavailable: {}.", err));
        }
    };

    let actual_points = series
        .candles
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f64, c.close))
        .collect();
    let indexed = |f: fn(&forecast::ForecastRow) -> f64| -> Vec<(f64, f64)> {
        table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i as f64, f(row)))
            .collect()
    };

    let mut weekly_profile: Vec<(f64, f64)> = table
        .future_rows()
        .iter()
        .take(7)
        .map(|row| {
            (
                row.date.weekday().num_days_from_monday() as f64,
                row.weekly,
            )
        })
        .collect();
    weekly_profile.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut yearly_profile: Vec<(f64, f64)> = table
        .future_rows()
        .iter()
        .take(365)
        .map(|row| (row.date.ordinal0() as f64, row.yearly))
        .collect();
    yearly_profile.sort_by(|a, b| a.0.total_cmp(&b.0));

    let horizon_days = table.future_rows().len() as i64;
    let first_date = table.rows[0].date;
    let last_date = table.rows[table.rows.len() - 1].date;

    ForecastPanel::Ready(Box::new(ForecastChart {
        actual_points,
        predicted_points: indexed(|r| r.predicted),
        lower_points: indexed(|r| r.lower),
        upper_points: indexed(|r| r.upper),
        trend_points: indexed(|r| r.trend),
        weekly_profile,
        yearly_profile,
        history_len: table.history_len,
        horizon_days,
        first_date,
        last_date,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ticker;
    use crate::data::Candle;
    use chrono::Duration;

    fn selection() -> Selection {
        Selection::new(Ticker::BtcUsd, 1, 100.0)
    }

    fn series(days: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let candles = (0..days)
            .map(|i| {
                let close = 200.0 + i as f64;
                Candle {
                    date: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 9_000.0,
                }
            })
            .collect();
        PriceSeries {
            ticker: Ticker::BtcUsd,
            candles,
        }
    }

    fn no_sentiment() -> Result<SentimentReading, SentimentError> {
        Err(SentimentError::Network("offline".to_string()))
    }

    #[test]
    fn test_fetch_failure_yields_single_error_state() {
        let fetch = Err(DataError::Empty {
            ticker: Ticker::BtcUsd,
        });
        let view = build(selection(), &fetch, &no_sentiment());
        match view.outcome {
            ViewOutcome::DataUnavailable { message, hints } => {
                assert!(message.contains("BTC-USD"));
                assert!(!hints.is_empty());
            }
            ViewOutcome::Ready(_) => panic!("empty fetch must not build a dashboard"),
        }
    }

    #[test]
    fn test_empty_series_yields_single_error_state() {
        let fetch = Ok(PriceSeries {
            ticker: Ticker::BtcUsd,
            candles: Vec::new(),
        });
        let view = build(selection(), &fetch, &no_sentiment());
        assert!(matches!(view.outcome, ViewOutcome::DataUnavailable { .. }));
    }

    #[test]
    fn test_ready_view_builds_all_panels() {
        let fetch = Ok(series(500));
        let reading = Ok(SentimentReading {
            value: 90,
            label: "Greed".to_string(),
        });
        let view = build(selection(), &fetch, &reading);
        let ready = match view.outcome {
            ViewOutcome::Ready(ready) => ready,
            other => panic!("expected ready view, got {:?}", other),
        };

        let snapshot = ready.metrics.unwrap();
        assert_eq!(snapshot.last_close, 699.0);
        assert!(ready.roi.unwrap().profit > 0.0);
        assert!(matches!(
            ready.sentiment,
            SentimentPanel::Reading {
                mood: Mood::ExtremeGreed,
                ..
            }
        ));
        assert_eq!(ready.historical.close_points.len(), 500);
        assert_eq!(ready.historical.tail.len(), TAIL_ROWS);

        match ready.forecast {
            ForecastPanel::Ready(chart) => {
                assert_eq!(chart.history_len, 500);
                assert_eq!(chart.horizon_days, 365);
                assert_eq!(chart.predicted_points.len(), 865);
                assert_eq!(chart.weekly_profile.len(), 7);
                // Profile is keyed by day of week, Monday first.
                assert_eq!(chart.weekly_profile[0].0, 0.0);
                assert_eq!(chart.weekly_profile[6].0, 6.0);
            }
            ForecastPanel::Warning(w) => panic!("expected forecast, got warning {}", w),
        }
    }

    #[test]
    fn test_short_series_degrades_forecast_only() {
        let fetch = Ok(series(100));
        let view = build(selection(), &fetch, &no_sentiment());
        let ready = match view.outcome {
            ViewOutcome::Ready(ready) => ready,
            other => panic!("expected ready view, got {:?}", other),
        };

        // Metrics and charts still work; only the forecast degrades.
        assert!(ready.metrics.is_ok());
        assert!(ready.roi.is_ok());
        assert!(matches!(ready.forecast, ForecastPanel::Warning(_)));
        assert!(matches!(
            ready.sentiment,
            SentimentPanel::Unavailable { .. }
        ));
    }
}
