//! Terminal UI state and navigation logic.

use std::time::{Duration, Instant};

use crate::sink::ChartSink;
use crate::ui::Theme;

/// How long a status message stays in the status bar.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// How the host charts are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Every host in a grid, the selected one highlighted.
    Grid,
    /// Only the selected host, using the whole screen.
    Focus,
}

impl View {
    pub fn label(&self) -> &'static str {
        match self {
            View::Grid => "Grid",
            View::Focus => "Focus",
        }
    }
}

/// State owned by the terminal frontend between frames.
///
/// Series data lives in the sinks; this only tracks what the user is
/// looking at.
#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub view: View,
    pub show_help: bool,
    pub selected: usize,
    host_count: usize,
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
    started_at: Instant,
    /// Stalled reason per host as of the previous frame.
    last_stalled: Vec<Option<String>>,
}

impl App {
    pub fn new(host_count: usize, theme: Theme) -> Self {
        Self {
            running: true,
            view: View::Grid,
            show_help: false,
            selected: 0,
            host_count,
            theme,
            status_message: None,
            started_at: Instant::now(),
            last_stalled: vec![None; host_count],
        }
    }

    /// Time since the UI came up.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Set a temporary status message.
    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// The status message, unless it has expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    /// Announce hosts that stalled or recovered since the previous frame.
    pub fn track_stalls(&mut self, sinks: &[ChartSink]) {
        self.last_stalled.resize(sinks.len(), None);
        let mut message = None;
        for (sink, last) in sinks.iter().zip(self.last_stalled.iter_mut()) {
            let now = sink.stalled();
            if now == last.as_deref() {
                continue;
            }
            message = Some(match now {
                Some(reason) => format!("{} stalled: {}", sink.title(), reason),
                None => format!("{} is back", sink.title()),
            });
            *last = now.map(str::to_string);
        }
        if let Some(message) = message {
            self.set_status_message(message);
        }
    }

    /// Select the next host, wrapping around.
    pub fn select_next(&mut self) {
        if self.host_count > 0 {
            self.selected = (self.selected + 1) % self.host_count;
        }
    }

    /// Select the previous host, wrapping around.
    pub fn select_prev(&mut self) {
        if self.host_count > 0 {
            self.selected = (self.selected + self.host_count - 1) % self.host_count;
        }
    }

    /// Switch between the grid and the selected host alone.
    pub fn toggle_focus(&mut self) {
        self.view = match self.view {
            View::Grid => View::Focus,
            View::Focus => View::Grid,
        };
    }

    pub fn show_grid(&mut self) {
        self.view = View::Grid;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the frontend to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}
