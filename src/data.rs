use crate::config::{self, Ticker};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// A single daily OHLCV record. The date is an explicit field, not an
/// implicit row label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily price history for one asset, strictly increasing by date.
#[derive(Clone, Debug)]
pub struct PriceSeries {
    pub ticker: Ticker,
    pub candles: Vec<Candle>,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("request to the market data provider failed for {ticker}: {reason}")]
    Network { ticker: Ticker, reason: String },
    #[error("market data provider returned HTTP {status} for {ticker}")]
    Status { ticker: Ticker, status: u16 },
    #[error("could not decode the provider response for {ticker}: {reason}")]
    Malformed { ticker: Ticker, reason: String },
    #[error("provider returned no usable rows for {ticker}")]
    Empty { ticker: Ticker },
    #[error("price cache i/o failed: {0}")]
    Cache(#[from] std::io::Error),
}

impl DataError {
    /// Explanatory lines shown alongside the error when a render cycle halts.
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            DataError::Network { .. } | DataError::Status { .. } => &[
                "The provider may be rate-limiting requests or the connection timed out.",
                "Press 'r' to reload once the network settles. No automatic retry is attempted.",
            ],
            DataError::Malformed { .. } => &[
                "The provider response did not match the expected chart shape.",
                "Press 'r' to reload; a transient provider hiccup usually clears itself.",
            ],
            DataError::Empty { .. } => &[
                "The provider answered but carried no rows for the requested range.",
                "Press 'r' to reload, or pick a different asset.",
            ],
            DataError::Cache(_) => &[
                "The on-disk response cache could not be read or written.",
                "Check permissions on the cache directory (SENTINEL_CACHE_DIR).",
            ],
        }
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

fn chart_url(ticker: Ticker) -> String {
    let start = config::history_start_date()
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc()
        .timestamp();
    let end = Utc::now().timestamp();
    format!(
        "{}/{}?period1={}&period2={}&interval=1d",
        config::chart_api_url(),
        ticker.as_str(),
        start,
        end
    )
}

/// Fetches the full daily history for `ticker` from the fixed start date to
/// now, serving a cached response when one is fresh enough.
///
/// A failed refetch falls back to a stale cached copy when one exists;
/// otherwise the failure is surfaced as-is. No retry is attempted.
pub async fn fetch_series(ticker: Ticker, bypass_cache: bool) -> Result<PriceSeries, DataError> {
    let cache_dir = config::cache_dir();
    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir)?;
    }
    let cache_file = cache_dir.join(format!("{}.json", ticker.as_str()));

    let cached_fresh = !bypass_cache
        && cache_file.exists()
        && std::fs::metadata(&cache_file)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| std::time::SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age.as_secs() < config::CACHE_MAX_AGE_SECS);

    let body = if cached_fresh {
        info!("Loading {} from cache...", ticker);
        std::fs::read_to_string(&cache_file)?
    } else {
        info!("Cache miss or expired for {}, fetching...", ticker);
        match fetch_chart_body(ticker).await {
            Ok(body) => {
                std::fs::write(&cache_file, &body)?;
                body
            }
            Err(err) if cache_file.exists() => {
                warn!("Refetch failed for {} ({}), using stale cache", ticker, err);
                std::fs::read_to_string(&cache_file)?
            }
            Err(err) => return Err(err),
        }
    };

    parse_series(ticker, &body)
}

async fn fetch_chart_body(ticker: Ticker) -> Result<String, DataError> {
    let url = chart_url(ticker);
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .header("User-Agent", "Mozilla/5.0")
        .timeout(std::time::Duration::from_secs(config::FETCH_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| DataError::Network {
            ticker,
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DataError::Status {
            ticker,
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| DataError::Network {
        ticker,
        reason: e.to_string(),
    })
}

/// Decodes a chart response body into a normalized series: the first quote
/// group is taken (the provider nests quotes in a grouped block), null rows
/// are skipped, and the result is sorted and deduped to strict date order.
pub fn parse_series(ticker: Ticker, body: &str) -> Result<PriceSeries, DataError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| DataError::Malformed {
            ticker,
            reason: e.to_string(),
        })?;

    if let Some(err) = response.chart.error {
        return Err(DataError::Malformed {
            ticker,
            reason: err
                .description
                .or(err.code)
                .unwrap_or_else(|| "provider-side error".to_string()),
        });
    }

    let result = response
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .ok_or(DataError::Empty { ticker })?;

    // Flatten the grouped quote block by taking the first group.
    let quote = result
        .indicators
        .quote
        .first()
        .ok_or(DataError::Empty { ticker })?;

    let mut candles = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let row = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        );
        if let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = row {
            let date = DateTime::<Utc>::from_timestamp(ts, 0)
                .ok_or(DataError::Malformed {
                    ticker,
                    reason: format!("timestamp {} out of range", ts),
                })?
                .date_naive();
            candles.push(Candle {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }
    }

    let series = PriceSeries::from_unordered(ticker, candles);
    if series.is_empty() {
        return Err(DataError::Empty { ticker });
    }
    info!(
        "Loaded {} rows for {} ({} .. {})",
        series.len(),
        ticker,
        series.candles.first().map(|c| c.date.to_string()).unwrap_or_default(),
        series.candles.last().map(|c| c.date.to_string()).unwrap_or_default(),
    );
    Ok(series)
}

impl PriceSeries {
    /// Builds a series from candles in provider order, restoring the strict
    /// ascending-date invariant. Same-day duplicates keep the last record.
    pub fn from_unordered(ticker: Ticker, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.date);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.date == candle.date => *last = candle,
                _ => deduped.push(candle),
            }
        }
        Self {
            ticker,
            candles: deduped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Synthetic random-walk series for tests and offline development.
    #[allow(dead_code)]
    pub fn new_mock(ticker: Ticker, days: usize) -> Self {
        use rand::prelude::*;

        let mut rng = rand::thread_rng();
        let mut candles = Vec::with_capacity(days);
        let mut price: f64 = 100.0;
        let mut date = Utc::now().date_naive() - chrono::Duration::days(days as i64);

        for _ in 0..days {
            let change_pct: f64 = rng.gen_range(-0.02..0.02);
            let open = price;
            let close = open * (1.0 + change_pct);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(1_000.0..10_000.0);

            candles.push(Candle {
                date,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            date += chrono::Duration::days(1);
        }

        Self { ticker, candles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1514764800, 1514851200, 1514937600, 1515024000],
                "indicators": {
                    "quote": [{
                        "open":   [13850.5, 14100.0, null, 15000.0],
                        "high":   [14200.0, 15300.0, 15500.0, 15400.0],
                        "low":    [13600.0, 13900.0, 14800.0, 14700.0],
                        "close":  [14100.0, 15200.0, 15100.0, 15150.0],
                        "volume": [10000000.0, 12000000.0, 9000000.0, 8000000.0]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_skips_null_rows() {
        let series = parse_series(Ticker::BtcUsd, FIXTURE).unwrap();
        // Row 3 has a null open and must be dropped.
        assert_eq!(series.len(), 3);
        assert_eq!(series.candles[0].close, 14100.0);
        assert_eq!(series.candles[0].date, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_dates_strictly_increasing() {
        let series = parse_series(Ticker::BtcUsd, FIXTURE).unwrap();
        for pair in series.candles.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn test_parse_provider_error_is_malformed() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        match parse_series(Ticker::SolUsd, body) {
            Err(DataError::Malformed { reason, .. }) => assert!(reason.contains("No data")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_result_is_empty_error() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(
            parse_series(Ticker::EthUsd, body),
            Err(DataError::Empty { .. })
        ));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_series(Ticker::EthUsd, "not json"),
            Err(DataError::Malformed { .. })
        ));
    }

    #[test]
    fn test_from_unordered_sorts_and_dedups() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let candle = |d: u32, close: f64| Candle {
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        };
        let series = PriceSeries::from_unordered(
            Ticker::BtcUsd,
            vec![candle(3, 30.0), candle(1, 10.0), candle(3, 31.0), candle(2, 20.0)],
        );
        let dates: Vec<u32> = series.candles.iter().map(|c| c.date.day0() + 1).collect();
        assert_eq!(dates, vec![1, 2, 3]);
        // Later duplicate wins.
        assert_eq!(series.candles[2].close, 31.0);
    }

    #[test]
    fn test_mock_series_has_requested_length() {
        let series = PriceSeries::new_mock(Ticker::BtcUsd, 400);
        assert_eq!(series.len(), 400);
        for pair in series.candles.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }
}
