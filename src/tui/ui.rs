use super::app::App;
use crate::analytics::{AxisScale, ProviderAxis, ProviderSelection, TimeRange, build_series};
use crate::storage::Snapshot;
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
};

/// Colors cycle through this palette in series order; the total series is
/// always alone and always gets the first one.
const SERIES_COLORS: [Color; 8] = [
    Color::Green,
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::Red,
    Color::LightGreen,
    Color::LightMagenta,
];

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header (single line, no border)
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Footer (single line, no border)
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let status = if app.is_live() {
        Span::styled(" LIVE ", Style::default().bg(Color::Green).fg(Color::Black))
    } else {
        Span::styled(" VIEW ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let mut info = format!(" {} │ {} snapshots", app.file_name(), app.snapshot_count());
    if let Some(taken_at) = app.last_taken_at() {
        info.push_str(&format!(" │ last {}", format_age(taken_at)));
    }
    if let Some(total) = app.catalog_total() {
        info.push_str(&format!(" │ {total} models"));
    }

    let mut spans = vec![
        Span::styled(
            "modelwatch",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        status,
        Span::raw(info),
    ];
    // The chart itself never shows an error state; a failed fetch lands here
    if let Some(failure) = app.last_failure() {
        spans.push(Span::styled(
            format!(" │ fetch failed: {failure}"),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans));
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &mut App, area: Rect) {
    if !app.has_history() {
        render_no_history(frame, app, area);
        return;
    }

    // Split: provider list (fixed width) | trend chart
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(30)])
        .split(area);

    // Stored so cursor movement knows how many rows fit
    app.set_provider_area(chunks[0]);

    let bucketed = app.bucketed();
    let rows = app.provider_rows(&bucketed);
    render_providers(frame, app, &rows, chunks[0]);
    render_trend(frame, app, &bucketed, chunks[1]);
}

fn render_no_history(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Trend ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut lines = vec![Line::raw(" No historical data available yet")];
    if app.is_live() {
        lines.push(Line::raw(" The first snapshot lands after the next collect cycle"));
    }

    let msg = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(msg, area);
}

fn render_providers(frame: &mut Frame, app: &App, rows: &[(String, u64)], area: Rect) {
    let block = Block::default()
        .title(format!(" Providers ({}) ", app.axis().label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let header_cells = ["", "Provider", "Count"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).height(1);

    let cursor = app.cursor().min(rows.len().saturating_sub(1));
    let visible_height = area.height.saturating_sub(3) as usize;
    let max_scroll = rows.len().saturating_sub(visible_height.max(1));
    let scroll_offset = app.scroll().min(max_scroll);

    let table_rows: Vec<Row> = rows
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height.max(1))
        .map(|(i, (name, count))| {
            let selected = app.selection().contains(app.axis(), name);
            let mark = if selected { "[x]" } else { "[ ]" };

            let name_style = match series_index(app.selection(), app.axis(), name) {
                Some(index) => Style::default().fg(series_color(index)),
                None => Style::default(),
            };

            let style = if i == cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(mark),
                Cell::from(name.as_str()).style(name_style),
                Cell::from(format!("{count:>5}")),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(5),
    ];

    let table = Table::new(table_rows, widths).header(header).block(block);

    frame.render_widget(table, area);
}

fn render_trend(frame: &mut Frame, app: &App, bucketed: &[Snapshot], area: Rect) {
    let block = Block::default()
        .title(format!(" Trend [{}] ", app.range().label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    if bucketed.is_empty() {
        let msg = Paragraph::new(format!(
            " No snapshots in the last {}.",
            app.range().label()
        ))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    }

    let series = build_series(bucketed, app.selection());

    // Chart data outlives the datasets borrowing it
    let data: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .map(|p| (p.taken_at.timestamp() as f64, p.value as f64))
                .collect()
        })
        .collect();

    let datasets: Vec<Dataset> = series
        .iter()
        .zip(&data)
        .enumerate()
        .map(|(index, (s, points))| {
            Dataset::default()
                .name(s.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(index)))
                .data(points)
        })
        .collect();

    let now = Utc::now();
    let (x_start, x_end) = match app.range().cutoff(now) {
        Some(cutoff) => (cutoff.timestamp() as f64, now.timestamp() as f64),
        // Unbounded range: frame the data itself with half a day of margin
        None => {
            let first = bucketed[0].taken_at.timestamp() as f64;
            let last = bucketed[bucketed.len() - 1].taken_at.timestamp() as f64;
            (first - 43_200.0, last + 43_200.0)
        }
    };

    let scale = AxisScale::compute(series.iter().flat_map(|s| s.points.iter().map(|p| p.value)));
    let y_labels: Vec<Span> = scale
        .ticks()
        .into_iter()
        .map(|tick| Span::raw(tick.to_string()))
        .collect();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([x_start, x_end])
                .labels(vec![
                    Span::raw(x_label(x_start, app.range())),
                    Span::raw(x_label((x_start + x_end) / 2.0, app.range())),
                    Span::raw(x_label(x_end, app.range())),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("models")
                .style(Style::default().fg(Color::DarkGray))
                .bounds(scale.bounds())
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" q ", Style::default().bg(Color::DarkGray)),
        Span::raw(" quit "),
        Span::styled(" 1-4 ", Style::default().bg(Color::DarkGray)),
        Span::raw(" range "),
        Span::styled(" Tab ", Style::default().bg(Color::DarkGray)),
        Span::raw(" axis "),
        Span::styled(" j/k ", Style::default().bg(Color::DarkGray)),
        Span::raw(" nav "),
        Span::styled(" ␣ ", Style::default().bg(Color::DarkGray)),
        Span::raw(" select "),
        Span::styled(" c ", Style::default().bg(Color::DarkGray)),
        Span::raw(" clear "),
    ];

    if app.is_live() {
        spans.push(Span::styled(" r ", Style::default().bg(Color::DarkGray)));
        spans.push(Span::raw(" reload "));
    }

    let paragraph = Paragraph::new(Line::from(spans));
    frame.render_widget(paragraph, area);
}

fn series_color(index: usize) -> Color {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

/// Position a selected provider's series occupies, matching the order the
/// chart builds datasets in. None when the provider is not selected.
fn series_index(selection: &ProviderSelection, axis: ProviderAxis, name: &str) -> Option<usize> {
    let mut index = 0;
    for current in ProviderAxis::ALL {
        for selected in selection.names(current) {
            if current == axis && selected == name {
                return Some(index);
            }
            index += 1;
        }
    }
    None
}

fn x_label(x: f64, range: TimeRange) -> String {
    let time = DateTime::from_timestamp(x as i64, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let format = match range {
        TimeRange::Day => "%H:%M",
        _ => "%m-%d",
    };
    time.format(format).to_string()
}

fn format_age(taken_at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - taken_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
