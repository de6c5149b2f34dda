//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;
use serde::Deserialize;

/// Which theme to use, as named in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    #[default]
    Auto,
    Dark,
    Light,
}

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and the selected chart.
    pub highlight: Color,
    /// Line colors, cycled by host index.
    pub series: Vec<Color>,
    /// Color for the stalled indicator.
    pub stalled: Color,
    /// Color for autoscaled axis labels.
    pub warning: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for chart titles and the help header.
    pub header: Style,
    /// Style for axis titles and labels.
    pub axis: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            series: vec![
                Color::Cyan,
                Color::Green,
                Color::Magenta,
                Color::Yellow,
                Color::LightBlue,
                Color::LightRed,
            ],
            stalled: Color::Red,
            warning: Color::Yellow,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            axis: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            series: vec![
                Color::Blue,
                Color::Green,
                Color::Magenta,
                Color::Red,
                Color::Cyan,
                Color::DarkGray,
            ],
            stalled: Color::Red,
            warning: Color::Yellow,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            axis: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn from_choice(choice: ThemeChoice) -> Self {
        match choice {
            ThemeChoice::Auto => Self::auto_detect(),
            ThemeChoice::Dark => Self::dark(),
            ThemeChoice::Light => Self::light(),
        }
    }

    /// Line color for the host at `index`.
    pub fn series_color(&self, index: usize) -> Color {
        if self.series.is_empty() {
            return self.highlight;
        }
        self.series[index % self.series.len()]
    }

    pub fn stalled_style(&self) -> Style {
        Style::default().fg(self.stalled).add_modifier(Modifier::BOLD)
    }
}
