use chrono::NaiveDate;
use std::path::PathBuf;

/// Assets offered by the control panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ticker {
    BtcUsd,
    EthUsd,
    SolUsd,
    XrpUsd,
    DogeUsd,
    BnbUsd,
    AdaUsd,
}

pub const TICKERS: &[Ticker] = &[
    Ticker::BtcUsd,
    Ticker::EthUsd,
    Ticker::SolUsd,
    Ticker::XrpUsd,
    Ticker::DogeUsd,
    Ticker::BnbUsd,
    Ticker::AdaUsd,
];

impl Ticker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BtcUsd => "BTC-USD",
            Self::EthUsd => "ETH-USD",
            Self::SolUsd => "SOL-USD",
            Self::XrpUsd => "XRP-USD",
            Self::DogeUsd => "DOGE-USD",
            Self::BnbUsd => "BNB-USD",
            Self::AdaUsd => "ADA-USD",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let wanted = input.trim().to_ascii_uppercase();
        TICKERS.iter().copied().find(|t| t.as_str() == wanted)
    }

    pub fn next(self) -> Self {
        let idx = TICKERS.iter().position(|&t| t == self).unwrap_or(0);
        TICKERS[(idx + 1) % TICKERS.len()]
    }

    pub fn prev(self) -> Self {
        let idx = TICKERS.iter().position(|&t| t == self).unwrap_or(0);
        TICKERS[(idx + TICKERS.len() - 1) % TICKERS.len()]
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First day of history requested from the provider.
pub const HISTORY_START: (i32, u32, u32) = (2018, 1, 1);

pub fn history_start_date() -> NaiveDate {
    let (y, m, d) = HISTORY_START;
    NaiveDate::from_ymd_opt(y, m, d).expect("valid history start date")
}

pub const MIN_HORIZON_YEARS: u32 = 1;
pub const MAX_HORIZON_YEARS: u32 = 4;
/// The forecast horizon spans calendar days, weekends and holidays included.
pub const DAYS_PER_HORIZON_YEAR: i64 = 365;

pub const MIN_INVESTMENT_USD: f64 = 10.0;
pub const DEFAULT_INVESTMENT_USD: f64 = 100.0;
pub const INVESTMENT_STEP_USD: f64 = 10.0;

/// Minimum number of daily records before a long-range fit is attempted.
pub const MIN_FORECAST_HISTORY: usize = 365;

/// Fourier orders for the seasonal regression.
pub const WEEKLY_FOURIER_ORDER: usize = 3;
pub const YEARLY_FOURIER_ORDER: usize = 4;

/// Cached provider responses are considered fresh for one day.
pub const CACHE_MAX_AGE_SECS: u64 = 86_400;

pub const FETCH_TIMEOUT_SECS: u64 = 15;
pub const SENTIMENT_TIMEOUT_SECS: u64 = 10;

pub fn cache_dir() -> PathBuf {
    std::env::var("SENTINEL_CACHE_DIR")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".cache"))
}

pub fn chart_api_url() -> String {
    std::env::var("SENTINEL_CHART_URL")
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "https://query1.finance.yahoo.com/v8/finance/chart".to_string())
}

pub fn fng_api_url() -> String {
    std::env::var("SENTINEL_FNG_URL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "https://api.alternative.me/fng/".to_string())
}

/// A user selection for one render cycle. Passed by value into every
/// computation step; nothing reads selection state ambiently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub ticker: Ticker,
    pub horizon_years: u32,
    pub investment_usd: f64,
}

impl Selection {
    pub fn new(ticker: Ticker, horizon_years: u32, investment_usd: f64) -> Self {
        Self {
            ticker,
            horizon_years: horizon_years.clamp(MIN_HORIZON_YEARS, MAX_HORIZON_YEARS),
            investment_usd: if investment_usd.is_finite() {
                investment_usd.max(MIN_INVESTMENT_USD)
            } else {
                DEFAULT_INVESTMENT_USD
            },
        }
    }

    pub fn horizon_days(&self) -> i64 {
        self.horizon_years as i64 * DAYS_PER_HORIZON_YEAR
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(Ticker::BtcUsd, MIN_HORIZON_YEARS, DEFAULT_INVESTMENT_USD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_roundtrip_and_cycle() {
        for &ticker in TICKERS {
            assert_eq!(Ticker::parse(ticker.as_str()), Some(ticker));
        }
        assert_eq!(Ticker::parse("btc-usd"), Some(Ticker::BtcUsd));
        assert_eq!(Ticker::parse("AAPL"), None);

        let mut t = Ticker::BtcUsd;
        for _ in 0..TICKERS.len() {
            t = t.next();
        }
        assert_eq!(t, Ticker::BtcUsd);
        assert_eq!(Ticker::BtcUsd.prev(), Ticker::AdaUsd);
    }

    #[test]
    fn test_selection_clamps() {
        let s = Selection::new(Ticker::EthUsd, 9, 3.0);
        assert_eq!(s.horizon_years, MAX_HORIZON_YEARS);
        assert_eq!(s.investment_usd, MIN_INVESTMENT_USD);

        let s = Selection::new(Ticker::EthUsd, 0, f64::NAN);
        assert_eq!(s.horizon_years, MIN_HORIZON_YEARS);
        assert_eq!(s.investment_usd, DEFAULT_INVESTMENT_USD);
    }

    #[test]
    fn test_horizon_days() {
        let s = Selection::new(Ticker::BtcUsd, 2, 100.0);
        assert_eq!(s.horizon_days(), 730);
    }
}
