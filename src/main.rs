mod app;
mod config;
mod data;
mod forecast;
mod metrics;
mod models;
mod sentiment;
mod tui;
mod ui;
mod view;

use anyhow::Result;
use app::App;
use clap::Parser;
use config::{Selection, Ticker};
use std::io;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;
use view::{ForecastPanel, SentimentPanel, ViewOutcome};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sentinel-TUI: crypto price dashboard with seasonal trend forecasting",
    after_help = "EXAMPLES:
    # Interactive dashboard, BTC-USD by default
    cargo run --release

    # Start on another asset with a 3 year horizon
    cargo run --release -- --ticker ETH-USD --years 3

    # One-shot text report for scripts and cron
    cargo run --release -- --report --ticker SOL-USD --investment 250"
)]
struct Args {
    /// Print a one-shot text report instead of launching the dashboard
    #[arg(long)]
    report: bool,

    /// Asset to load first (BTC-USD, ETH-USD, SOL-USD, XRP-USD, DOGE-USD, BNB-USD, ADA-USD)
    #[arg(long, default_value = "BTC-USD")]
    ticker: String,

    /// Forecast horizon in years (1-4)
    #[arg(long, default_value_t = 1)]
    years: u32,

    /// Simulated lump-sum investment in USD (minimum 10)
    #[arg(long, default_value_t = config::DEFAULT_INVESTMENT_USD)]
    investment: f64,

    /// Ignore cached provider responses for the first load
    #[arg(long)]
    refresh: bool,
}

fn init_tracing(report_mode: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sentinel_tui=info"));

    if report_mode {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    } else {
        // The terminal belongs to the dashboard; log to a file instead.
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("sentinel-tui.log")?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Arc::new(log_file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.report)?;

    let Some(ticker) = Ticker::parse(&args.ticker) else {
        error!(
            "Unknown ticker {:?}. Supported: {}",
            args.ticker,
            config::TICKERS
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        std::process::exit(2);
    };
    let selection = Selection::new(ticker, args.years, args.investment);

    if args.report {
        return run_report(selection, args.refresh).await;
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(selection);
    let res = app.run(&mut terminal, args.refresh).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
    }

    Ok(())
}

/// One fetch-compute-print cycle, no interactivity.
async fn run_report(selection: Selection, bypass_cache: bool) -> Result<()> {
    let fetch = data::fetch_series(selection.ticker, bypass_cache).await;
    let sentiment_outcome = sentiment::fetch_latest().await;
    let dashboard = view::build(selection, &fetch, &sentiment_outcome);

    println!("=== {} ===", dashboard.title);

    let ready = match dashboard.outcome {
        ViewOutcome::DataUnavailable { message, hints } => {
            println!("ERROR: {}", message);
            for hint in hints {
                println!("  {}", hint);
            }
            std::process::exit(1);
        }
        ViewOutcome::Ready(ready) => ready,
    };

    match &ready.metrics {
        Ok(snapshot) => {
            println!(
                "Last close:     ${:.2} ({:+.2}% vs previous close ${:.2})",
                snapshot.last_close, snapshot.delta_percent, snapshot.previous_close
            );
            println!("Last volume:    {:.0}", snapshot.last_volume);
        }
        Err(err) => println!("Metrics:        unavailable ({})", err),
    }

    match &ready.roi {
        Ok(roi) => println!(
            "Buy & hold ROI: ${:.0} -> ${:.2} ({:+.2}%, profit {:+.2} USD)",
            roi.invested, roi.current_value, roi.roi_percent, roi.profit
        ),
        Err(err) => println!("Buy & hold ROI: unavailable ({})", err),
    }

    match &ready.sentiment {
        SentimentPanel::Reading { value, label, mood } => {
            println!("Fear & Greed:   {}/100 ({}, provider: {})", value, mood.as_str(), label)
        }
        SentimentPanel::Unavailable { reason } => {
            println!("Fear & Greed:   unavailable ({})", reason)
        }
    }

    match &ready.forecast {
        ForecastPanel::Ready(chart) => {
            let last = chart
                .predicted_points
                .last()
                .map(|(_, y)| *y)
                .unwrap_or_default();
            let lower = chart.lower_points.last().map(|(_, y)| *y).unwrap_or_default();
            let upper = chart.upper_points.last().map(|(_, y)| *y).unwrap_or_default();
            println!(
                "Forecast:       {} day horizon ending {} at ${:.2} (band ${:.2} .. ${:.2})",
                chart.horizon_days, chart.last_date, last, lower, upper
            );
        }
        ForecastPanel::Warning(message) => println!("Forecast:       {}", message),
    }

    Ok(())
}
