use crate::app::{App, AppState, ChartWindow, Tab};
use crate::metrics::RoiOutcome;
use crate::sentiment::Mood;
use crate::view::{
    DashboardView, ForecastChart, ForecastPanel, HistoricalView, ReadyView, SentimentPanel,
    ViewOutcome,
};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Tabs},
};

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.state {
        AppState::Loading => render_loading(f, &app.status, layout[1]),
        AppState::Dashboard => match &app.view {
            Some(view) => render_dashboard(f, app, view, layout[1]),
            None => render_loading(f, "No data loaded yet.", layout[1]),
        },
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Sentinel TUI ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            app.selection.ticker.as_str(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("horizon {}y", app.selection.horizon_years),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("invest ${:.0}", app.selection.investment_usd),
            Style::default().fg(Color::Yellow),
        ),
    ];

    if let Some(view) = &app.view {
        if let ViewOutcome::Ready(ready) = &view.outcome {
            if let Ok(snapshot) = &ready.metrics {
                let color = if snapshot.delta_percent >= 0.0 {
                    Color::Green
                } else {
                    Color::Red
                };
                spans.push(Span::raw(" | "));
                spans.push(Span::styled(
                    format!("${:.2}", snapshot.last_close),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format!("({:+.2}%)", snapshot.delta_percent),
                    Style::default().fg(color),
                ));
            }
        }
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match (&app.state, app.tab) {
        (AppState::Loading, _) => "Loading...",
        (AppState::Dashboard, Tab::Historical) => {
            "Tab/1/2: tabs | \u{2190}/\u{2192}: asset | +/-: horizon | \u{2191}/\u{2193}: investment | [ ] { } f: range | r: reload | q: quit"
        }
        (AppState::Dashboard, Tab::Forecast) => {
            "Tab/1/2: tabs | \u{2190}/\u{2192}: asset | +/-: horizon | \u{2191}/\u{2193}: investment | r: reload | q: quit"
        }
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_loading(f: &mut Frame, msg: &str, area: Rect) {
    let text = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(text, area);
}

fn render_dashboard(f: &mut Frame, app: &App, view: &DashboardView, area: Rect) {
    match &view.outcome {
        ViewOutcome::DataUnavailable { message, hints } => {
            render_data_unavailable(f, message, hints, area);
        }
        ViewOutcome::Ready(ready) => render_ready(f, app, &view.title, ready, area),
    }
}

fn render_data_unavailable(f: &mut Frame, message: &str, hints: &[String], area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for hint in hints {
        lines.push(Line::from(Span::styled(
            hint.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let error = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Market Data Unavailable "))
        .alignment(Alignment::Left);
    f.render_widget(error, area);
}

fn render_ready(f: &mut Frame, app: &App, title: &str, ready: &ReadyView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    render_metric_row(f, ready, chunks[0]);

    let tabs = Tabs::new(vec![" Historical Analysis ", " Price Forecast "])
        .select(match app.tab {
            Tab::Historical => 0,
            Tab::Forecast => 1,
        })
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
    f.render_widget(tabs, chunks[1]);

    match app.tab {
        Tab::Historical => render_historical_tab(f, &ready.historical, app.window, chunks[2]),
        Tab::Forecast => render_forecast_tab(f, &ready.forecast, chunks[2]),
    }
}

fn render_metric_row(f: &mut Frame, ready: &ReadyView, area: Rect) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    // Last price with day-over-day delta.
    let price_lines = match &ready.metrics {
        Ok(snapshot) => {
            let color = if snapshot.delta_percent >= 0.0 {
                Color::Green
            } else {
                Color::Red
            };
            vec![
                Line::from(Span::styled(
                    format!("${:.2}", snapshot.last_close),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("{:+.2}% vs prev close", snapshot.delta_percent),
                    Style::default().fg(color),
                )),
            ]
        }
        Err(err) => vec![Line::from(Span::styled(
            err.to_string(),
            Style::default().fg(Color::Yellow),
        ))],
    };
    f.render_widget(
        Paragraph::new(price_lines)
            .block(Block::default().borders(Borders::ALL).title(" Last Price (USD) ")),
        cells[0],
    );

    let volume_lines = match &ready.metrics {
        Ok(snapshot) => vec![
            Line::from(Span::styled(
                thousands(snapshot.last_volume),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "last session",
                Style::default().fg(Color::Gray),
            )),
        ],
        Err(_) => vec![Line::from(Span::styled(
            "unavailable",
            Style::default().fg(Color::Yellow),
        ))],
    };
    f.render_widget(
        Paragraph::new(volume_lines)
            .block(Block::default().borders(Borders::ALL).title(" Volume ")),
        cells[1],
    );

    let roi_lines = match &ready.roi {
        Ok(roi) => {
            let (color, sign) = match roi.outcome() {
                RoiOutcome::Gain => (Color::Green, "+"),
                RoiOutcome::Loss => (Color::Red, ""),
            };
            vec![
                Line::from(Span::styled(
                    format!("{}{:.2}% ({}{:.2} USD)", sign, roi.roi_percent, sign, roi.profit),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!(
                        "${:.0} at first close -> ${:.2} now",
                        roi.invested, roi.current_value
                    ),
                    Style::default().fg(Color::Gray),
                )),
            ]
        }
        Err(err) => vec![Line::from(Span::styled(
            err.to_string(),
            Style::default().fg(Color::Yellow),
        ))],
    };
    f.render_widget(
        Paragraph::new(roi_lines)
            .block(Block::default().borders(Borders::ALL).title(" Buy & Hold ROI ")),
        cells[2],
    );

    let sentiment_lines = match &ready.sentiment {
        SentimentPanel::Reading { value, label, mood } => {
            let color = match mood {
                Mood::ExtremeFear => Color::Red,
                Mood::Neutral => Color::Yellow,
                Mood::ExtremeGreed => Color::Green,
            };
            vec![
                Line::from(Span::styled(
                    format!("{} / 100 - {}", value, mood.as_str()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("provider label: {}", label),
                    Style::default().fg(Color::Gray),
                )),
            ]
        }
        SentimentPanel::Unavailable { reason } => vec![
            Line::from(Span::styled(
                "unavailable",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                reason.clone(),
                Style::default().fg(Color::Gray),
            )),
        ],
    };
    f.render_widget(
        Paragraph::new(sentiment_lines)
            .block(Block::default().borders(Borders::ALL).title(" Fear & Greed ")),
        cells[3],
    );
}

/// Index range of the visible window over `len` points.
fn window_bounds(len: usize, window: ChartWindow) -> (usize, usize) {
    if len == 0 {
        return (0, 0);
    }
    let start = ((len as f64 * window.start) as usize).min(len - 1);
    let end = ((len as f64 * window.end).ceil() as usize).clamp(start + 1, len);
    (start, end)
}

fn render_historical_tab(f: &mut Frame, view: &HistoricalView, window: ChartWindow, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(area);

    let (start, end) = window_bounds(view.close_points.len(), window);
    let open_slice = &view.open_points[start..end];
    let close_slice = &view.close_points[start..end];

    let datasets = vec![
        Dataset::default()
            .name("Open")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(open_slice),
        Dataset::default()
            .name("Close")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(close_slice),
    ];

    let (min_price, max_price) = price_bounds(&[open_slice, close_slice]);
    let from = view.dates.get(start).copied().unwrap_or(view.first_date);
    let to = view
        .dates
        .get(end.saturating_sub(1))
        .copied()
        .unwrap_or(view.last_date);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    format!(" Daily Open/Close ({} .. {}) ", from, to),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([start as f64, (end.saturating_sub(1)).max(start + 1) as f64])
                .labels(vec![
                    Span::styled(from.to_string(), Style::default().fg(Color::Gray)),
                    Span::styled(to.to_string(), Style::default().fg(Color::Gray)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("USD")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_price * 0.98, max_price * 1.02])
                .labels(vec![
                    Span::styled(format!("{:.1}", min_price), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:.1}", max_price), Style::default().fg(Color::Gray)),
                ]),
        );
    f.render_widget(chart, chunks[0]);

    render_tail_table(f, view, chunks[1]);
}

fn render_tail_table(f: &mut Frame, view: &HistoricalView, area: Rect) {
    let header = Row::new(vec!["Date", "Open", "High", "Low", "Close", "Volume"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = view
        .tail
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.date.to_string()),
                Cell::from(format!("{:.2}", r.open)),
                Cell::from(format!("{:.2}", r.high)),
                Cell::from(format!("{:.2}", r.low)),
                Cell::from(format!("{:.2}", r.close)),
                Cell::from(thousands(r.volume)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Min(9),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Raw Data (tail) "));

    f.render_widget(table, area);
}

fn render_forecast_tab(f: &mut Frame, panel: &ForecastPanel, area: Rect) {
    let chart = match panel {
        ForecastPanel::Warning(message) => {
            let warning = Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(" Forecast "));
            f.render_widget(warning, area);
            return;
        }
        ForecastPanel::Ready(chart) => chart,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(area);

    render_forecast_chart(f, chart, chunks[0]);
    render_component_charts(f, chart, chunks[1]);
}

fn render_forecast_chart(f: &mut Frame, chart: &ForecastChart, area: Rect) {
    let min_y = chart
        .lower_points
        .iter()
        .map(|(_, y)| *y)
        .fold(f64::INFINITY, f64::min);
    let max_y = chart
        .upper_points
        .iter()
        .map(|(_, y)| *y)
        .fold(f64::NEG_INFINITY, f64::max);

    // Vertical marker where history ends and the horizon begins.
    let split_x = chart.history_len.saturating_sub(1) as f64;
    let split_line = [(split_x, min_y), (split_x, max_y)];

    let datasets = vec![
        Dataset::default()
            .name("Actual")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::DarkGray))
            .data(&chart.actual_points),
        Dataset::default()
            .name("Forecast")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&chart.predicted_points),
        Dataset::default()
            .name("Upper")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Gray))
            .data(&chart.upper_points),
        Dataset::default()
            .name("Lower")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Gray))
            .data(&chart.lower_points),
        Dataset::default()
            .name("Today")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::White))
            .data(&split_line),
    ];

    let x_max = chart.predicted_points.len().max(2) as f64 - 1.0;

    let widget = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    format!(
                        " Forecast with band, {} day horizon ({} .. {}) ",
                        chart.horizon_days, chart.first_date, chart.last_date
                    ),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::styled(chart.first_date.to_string(), Style::default().fg(Color::Gray)),
                    Span::styled(chart.last_date.to_string(), Style::default().fg(Color::Gray)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("USD")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::styled(format!("{:.1}", min_y), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:.1}", max_y), Style::default().fg(Color::Gray)),
                ]),
        );
    f.render_widget(widget, area);
}

fn render_component_charts(f: &mut Frame, chart: &ForecastChart, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(area);

    render_component(f, " Trend ", &chart.trend_points, Color::Magenta, chunks[0]);
    render_component(f, " Weekly (Mon..Sun) ", &chart.weekly_profile, Color::Cyan, chunks[1]);
    render_component(f, " Yearly (day of year) ", &chart.yearly_profile, Color::Green, chunks[2]);
}

fn render_component(f: &mut Frame, title: &str, points: &[(f64, f64)], color: Color, area: Rect) {
    if points.is_empty() {
        return;
    }
    let min_y = points.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
    let max_y = points
        .iter()
        .map(|(_, y)| *y)
        .fold(f64::NEG_INFINITY, f64::max);
    // Flat components still need a non-degenerate axis.
    let (min_y, max_y) = if (max_y - min_y).abs() < 1e-9 {
        (min_y - 1.0, max_y + 1.0)
    } else {
        (min_y, max_y)
    };
    let min_x = points.first().map(|(x, _)| *x).unwrap_or(0.0);
    let max_x = points.last().map(|(x, _)| *x).unwrap_or(1.0);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(points);

    let widget = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_x, max_x.max(min_x + 1.0)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::styled(format!("{:.1}", min_y), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:.1}", max_y), Style::default().fg(Color::Gray)),
                ]),
        );
    f.render_widget(widget, area);
}

fn price_bounds(slices: &[&[(f64, f64)]]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for slice in slices {
        for (_, y) in slice.iter() {
            min = min.min(*y);
            max = max.max(*y);
        }
    }
    if !min.is_finite() || !max.is_finite() {
        (0.0, 1.0)
    } else {
        (min, max)
    }
}

/// Formats a count with thousands separators, e.g. 12345678 -> "12,345,678".
fn thousands(v: f64) -> String {
    let raw = format!("{:.0}", v.abs());
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if v < 0.0 { format!("-{}", out) } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands_grouping() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1_000.0), "1,000");
        assert_eq!(thousands(12_345_678.0), "12,345,678");
        assert_eq!(thousands(-1_234.0), "-1,234");
    }

    #[test]
    fn test_window_bounds() {
        let full = ChartWindow::full();
        assert_eq!(window_bounds(100, full), (0, 100));

        let half = ChartWindow {
            start: 0.5,
            end: 1.0,
        };
        assert_eq!(window_bounds(100, half), (50, 100));

        assert_eq!(window_bounds(0, full), (0, 0));
        // A tiny series is never windowed out of existence.
        let sliver = ChartWindow {
            start: 0.9,
            end: 0.95,
        };
        let (s, e) = window_bounds(3, sliver);
        assert!(e > s);
    }
}
