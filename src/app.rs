use crate::config::{self, Selection};
use crate::view::{self, DashboardView};
use crate::{data, sentiment};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;

pub enum AppState {
    Loading,
    Dashboard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Historical,
    Forecast,
}

/// Visible slice of the historical chart, as fractions of the full range.
/// This is the range-slider analog: `[`/`]` pan, `{`/`}` zoom, `f` resets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartWindow {
    pub start: f64,
    pub end: f64,
}

const MIN_WINDOW_SPAN: f64 = 0.05;
const WINDOW_STEP: f64 = 0.05;

impl ChartWindow {
    pub fn full() -> Self {
        Self {
            start: 0.0,
            end: 1.0,
        }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    pub fn pan(&mut self, direction: f64) {
        let step = WINDOW_STEP * direction * self.span();
        let span = self.span();
        let start = (self.start + step).clamp(0.0, 1.0 - span);
        self.start = start;
        self.end = start + span;
    }

    pub fn zoom_in(&mut self) {
        let span = (self.span() - 2.0 * WINDOW_STEP).max(MIN_WINDOW_SPAN);
        let center = (self.start + self.end) / 2.0;
        self.start = (center - span / 2.0).max(0.0);
        self.end = (self.start + span).min(1.0);
    }

    pub fn zoom_out(&mut self) {
        let span = (self.span() + 2.0 * WINDOW_STEP).min(1.0);
        let center = (self.start + self.end) / 2.0;
        self.start = (center - span / 2.0).max(0.0);
        self.end = (self.start + span).min(1.0);
        if self.span() < span {
            // Hit an edge; take the slack on the other side.
            if self.start == 0.0 {
                self.end = span.min(1.0);
            } else {
                self.start = (self.end - span).max(0.0);
            }
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub selection: Selection,
    pub tab: Tab,
    pub window: ChartWindow,
    pub view: Option<DashboardView>,
    pub status: String,
}

impl App {
    pub fn new(selection: Selection) -> Self {
        Self {
            should_quit: false,
            state: AppState::Loading,
            selection,
            tab: Tab::Historical,
            window: ChartWindow::full(),
            view: None,
            status: "Loading market data...".to_string(),
        }
    }

    /// Runs one full pipeline cycle for the current selection and rebuilds
    /// the view model. Fetches block the cycle; there is no background work.
    pub async fn refresh(&mut self, bypass_cache: bool) {
        self.state = AppState::Loading;
        self.status = format!("Loading {} from the market...", self.selection.ticker);

        let fetch = data::fetch_series(self.selection.ticker, bypass_cache).await;
        let sentiment_outcome = sentiment::fetch_latest().await;

        self.view = Some(view::build(self.selection, &fetch, &sentiment_outcome));
        self.state = AppState::Dashboard;
        self.status = "Data load complete.".to_string();
    }

    pub async fn run(
        &mut self,
        terminal: &mut crate::tui::Tui,
        bypass_cache_first: bool,
    ) -> io::Result<()> {
        // First cycle before any input, like any selection change later.
        terminal.draw(|f| crate::ui::render(f, self))?;
        self.refresh(bypass_cache_first).await;

        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Some(change) = self.handle_key(key.code) {
                            self.state = AppState::Loading;
                            self.status =
                                format!("Loading {} from the market...", self.selection.ticker);
                            // Show the loading frame before the blocking fetch.
                            terminal.draw(|f| crate::ui::render(f, self))?;
                            self.refresh(change.bypass_cache).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies one key press. Returns `Some` when the selection changed and
    /// the pipeline must re-run.
    pub fn handle_key(&mut self, code: KeyCode) -> Option<RefreshRequest> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Tab => {
                self.tab = match self.tab {
                    Tab::Historical => Tab::Forecast,
                    Tab::Forecast => Tab::Historical,
                };
                None
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Historical;
                None
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Forecast;
                None
            }
            KeyCode::Right => {
                self.selection = Selection::new(
                    self.selection.ticker.next(),
                    self.selection.horizon_years,
                    self.selection.investment_usd,
                );
                self.window = ChartWindow::full();
                Some(RefreshRequest { bypass_cache: false })
            }
            KeyCode::Left => {
                self.selection = Selection::new(
                    self.selection.ticker.prev(),
                    self.selection.horizon_years,
                    self.selection.investment_usd,
                );
                self.window = ChartWindow::full();
                Some(RefreshRequest { bypass_cache: false })
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let years =
                    (self.selection.horizon_years + 1).min(config::MAX_HORIZON_YEARS);
                self.set_horizon(years)
            }
            KeyCode::Char('-') => {
                let years = self
                    .selection
                    .horizon_years
                    .saturating_sub(1)
                    .max(config::MIN_HORIZON_YEARS);
                self.set_horizon(years)
            }
            KeyCode::Up => self.set_investment(
                self.selection.investment_usd + config::INVESTMENT_STEP_USD,
            ),
            KeyCode::Down => self.set_investment(
                (self.selection.investment_usd - config::INVESTMENT_STEP_USD)
                    .max(config::MIN_INVESTMENT_USD),
            ),
            KeyCode::Char('r') => Some(RefreshRequest { bypass_cache: true }),
            KeyCode::Char('[') => {
                self.window.pan(-1.0);
                None
            }
            KeyCode::Char(']') => {
                self.window.pan(1.0);
                None
            }
            KeyCode::Char('{') => {
                self.window.zoom_out();
                None
            }
            KeyCode::Char('}') => {
                self.window.zoom_in();
                None
            }
            KeyCode::Char('f') => {
                self.window = ChartWindow::full();
                None
            }
            _ => None,
        }
    }

    fn set_horizon(&mut self, years: u32) -> Option<RefreshRequest> {
        if years == self.selection.horizon_years {
            return None;
        }
        self.selection = Selection::new(
            self.selection.ticker,
            years,
            self.selection.investment_usd,
        );
        Some(RefreshRequest { bypass_cache: false })
    }

    fn set_investment(&mut self, amount: f64) -> Option<RefreshRequest> {
        if (amount - self.selection.investment_usd).abs() < f64::EPSILON {
            return None;
        }
        self.selection =
            Selection::new(self.selection.ticker, self.selection.horizon_years, amount);
        Some(RefreshRequest { bypass_cache: false })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
    pub bypass_cache: bool,
}
