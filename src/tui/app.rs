use std::collections::BTreeSet;
use std::io::{self, stdout};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};

use super::ui;
use crate::analytics::{ProviderAxis, ProviderSelection, TimeRange, daily_series};
use crate::collector::{CollectorEvent, CollectorHandle};
use crate::error::Result;
use crate::storage::{Snapshot, Store};

pub struct App {
    store: Store,
    /// Background collector; present in live mode only
    collector: Option<CollectorHandle>,
    file_name: String,
    max_duration: Option<Duration>,
    start_time: Instant,
    last_draw: Instant,

    /// Full stored history, ascending
    snapshots: Vec<Snapshot>,
    range: TimeRange,
    axis: ProviderAxis,
    selection: ProviderSelection,
    cursor: usize,
    scroll: usize,
    provider_area: Rect,

    /// Model count seen by the latest collect cycle (live mode)
    catalog_total: Option<u64>,
    /// Message of the most recent failed cycle, kept until one succeeds
    last_failure: Option<String>,
    running: bool,
}

impl App {
    /// App for live mode: a collector is already running against the same
    /// database file
    pub fn live(
        store: Store,
        collector: CollectorHandle,
        file_name: String,
        max_duration: Option<Duration>,
    ) -> Result<Self> {
        App::build(store, Some(collector), file_name, max_duration)
    }

    /// App over a previously recorded database
    pub fn from_file(path: &Path) -> Result<Self> {
        let store = Store::open_existing(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        App::build(store, None, file_name, None)
    }

    fn build(
        store: Store,
        collector: Option<CollectorHandle>,
        file_name: String,
        max_duration: Option<Duration>,
    ) -> Result<Self> {
        // History is loaded up front; later reloads are event-driven
        let snapshots = store.list_snapshots()?;

        Ok(App {
            store,
            collector,
            file_name,
            max_duration,
            start_time: Instant::now(),
            last_draw: Instant::now(),
            snapshots,
            range: TimeRange::All,
            axis: ProviderAxis::Inference,
            selection: ProviderSelection::default(),
            cursor: 0,
            scroll: 0,
            provider_area: Rect::default(),
            catalog_total: None,
            last_failure: None,
            running: true,
        })
    }

    pub fn is_live(&self) -> bool {
        self.collector.is_some()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn axis(&self) -> ProviderAxis {
        self.axis
    }

    pub fn selection(&self) -> &ProviderSelection {
        &self.selection
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn has_history(&self) -> bool {
        !self.snapshots.is_empty()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn last_taken_at(&self) -> Option<DateTime<Utc>> {
        self.snapshots.last().map(|s| s.taken_at)
    }

    pub fn catalog_total(&self) -> Option<u64> {
        self.catalog_total
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn set_provider_area(&mut self, area: Rect) {
        self.provider_area = area;
    }

    /// History collapsed to one point per day within the active range
    pub fn bucketed(&self) -> Vec<Snapshot> {
        daily_series(&self.snapshots, self.range, Utc::now())
    }

    /// Provider names on the current axis across the bucketed window, each
    /// with its count in the newest bucket (0 when absent there)
    pub fn provider_rows(&self, bucketed: &[Snapshot]) -> Vec<(String, u64)> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for snapshot in bucketed {
            names.extend(snapshot.counts(self.axis).keys().map(String::as_str));
        }

        let latest = bucketed.last();
        names
            .into_iter()
            .map(|name| {
                let count = latest
                    .and_then(|s| s.counts(self.axis).get(name).copied())
                    .unwrap_or(0);
                (name.to_string(), count)
            })
            .collect()
    }

    pub fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(out);
        let mut terminal = Terminal::new(backend)?;

        // Main loop
        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        // Stop and join the collector after the terminal is back to normal
        if let Some(collector) = self.collector.take() {
            collector.stop();
        }

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        terminal.draw(|frame| ui::render(frame, self))?;
        self.last_draw = Instant::now();

        while self.running {
            // Check duration limit (live mode only)
            if let Some(max) = self.max_duration
                && self.start_time.elapsed() >= max
            {
                break;
            }

            let mut needs_redraw = false;

            // Drain collector events before waiting on input
            let mut events = Vec::new();
            if let Some(collector) = &self.collector {
                while let Some(event) = collector.try_recv() {
                    events.push(event);
                }
            }
            let mut recorded = false;
            for event in events {
                recorded |= self.apply_event(event);
                needs_redraw = true;
            }
            if recorded {
                self.reload();
            }

            if event::poll(Duration::from_millis(120))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code, key.modifiers);
                needs_redraw = true;
            }

            // Periodic redraw keeps the snapshot-age display honest
            if needs_redraw || self.last_draw.elapsed() >= Duration::from_secs(1) {
                terminal.draw(|frame| ui::render(frame, self))?;
                self.last_draw = Instant::now();
            }
        }

        Ok(())
    }

    /// Fold one collector report into the app state. Returns whether a
    /// snapshot was recorded, meaning the stored history needs a re-read.
    fn apply_event(&mut self, event: CollectorEvent) -> bool {
        match event {
            CollectorEvent::Recorded { total, .. } => {
                self.catalog_total = Some(total);
                self.last_failure = None;
                true
            }
            CollectorEvent::Deferred { total } => {
                self.catalog_total = Some(total);
                self.last_failure = None;
                false
            }
            // The chart keeps showing last-known history; the failure sits
            // in the header until a cycle succeeds again
            CollectorEvent::Failed(message) => {
                self.last_failure = Some(message);
                false
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        match key {
            // Global controls
            KeyCode::Char('c') if ctrl => self.running = false,
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,

            // Time ranges
            KeyCode::Char('1') => self.set_range(TimeRange::Day),
            KeyCode::Char('2') => self.set_range(TimeRange::Week),
            KeyCode::Char('3') => self.set_range(TimeRange::Month),
            KeyCode::Char('4') => self.set_range(TimeRange::All),

            // Switch provider axis
            KeyCode::Tab => {
                self.axis = self.axis.other();
                self.cursor = 0;
                self.scroll = 0;
            }

            // Provider list navigation (vim-style)
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),

            // Toggle the provider under the cursor
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_under_cursor(),

            // Clear all selections, back to the total series
            KeyCode::Char('c') => self.selection = self.selection.cleared(),

            // Manual reload
            KeyCode::Char('r') => self.reload(),

            _ => {}
        }
    }

    /// Re-read the history from the store. Failures keep the previous data
    /// on screen rather than tearing the viewer down.
    fn reload(&mut self) {
        if let Ok(snapshots) = self.store.list_snapshots() {
            self.snapshots = snapshots;
        }
    }

    fn set_range(&mut self, range: TimeRange) {
        self.range = range;
        // the provider list can shrink with the window
        self.cursor = 0;
        self.scroll = 0;
    }

    fn move_cursor(&mut self, delta: i32) {
        let len = self.provider_rows(&self.bucketed()).len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as i32 + delta).clamp(0, len as i32 - 1) as usize;
        self.ensure_cursor_visible(len);
    }

    fn ensure_cursor_visible(&mut self, len: usize) {
        // block borders and header row
        let visible = self.provider_area.height.saturating_sub(3) as usize;
        if visible == 0 {
            return;
        }
        if self.cursor < self.scroll {
            self.scroll = self.cursor;
        } else if self.cursor >= self.scroll + visible {
            self.scroll = self.cursor + 1 - visible;
        }
        self.scroll = self.scroll.min(len.saturating_sub(visible));
    }

    fn toggle_under_cursor(&mut self) {
        let rows = self.provider_rows(&self.bucketed());
        if let Some((name, _)) = rows.get(self.cursor) {
            self.selection = self.selection.toggled(self.axis, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let store = Store::open_in_memory().unwrap();
        App::build(store, None, "trends.db".to_string(), None).unwrap()
    }

    #[test]
    fn ctrl_c_quits_without_touching_the_selection() {
        let mut app = test_app();
        app.selection = app.selection.toggled(ProviderAxis::Inference, "Groq");

        // raw mode delivers Ctrl-C as a key event, not a signal
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);

        assert!(!app.running);
        assert!(app.selection.contains(ProviderAxis::Inference, "Groq"));
    }

    #[test]
    fn plain_c_clears_the_selection_and_keeps_running() {
        let mut app = test_app();
        app.selection = app.selection.toggled(ProviderAxis::Inference, "Groq");

        app.handle_key(KeyCode::Char('c'), KeyModifiers::NONE);

        assert!(app.running);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn only_recorded_events_ask_for_a_history_reload() {
        let mut app = test_app();

        assert!(app.apply_event(CollectorEvent::Recorded {
            taken_at: Utc::now(),
            total: 41,
        }));
        assert!(!app.apply_event(CollectorEvent::Deferred { total: 41 }));
        assert!(!app.apply_event(CollectorEvent::Failed("timed out".to_string())));
        assert_eq!(app.catalog_total(), Some(41));
    }

    #[test]
    fn fetch_failures_show_until_a_cycle_succeeds() {
        let mut app = test_app();
        assert_eq!(app.last_failure(), None);

        app.apply_event(CollectorEvent::Failed(
            "catalog returned HTTP 500".to_string(),
        ));
        assert_eq!(app.last_failure(), Some("catalog returned HTTP 500"));

        app.apply_event(CollectorEvent::Deferred { total: 40 });
        assert_eq!(app.last_failure(), None);
        assert_eq!(app.catalog_total(), Some(40));
    }
}
