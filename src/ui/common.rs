//! Common UI components shared across views.
//!
//! This module contains the header bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, View};
use crate::sink::ChartSink;

/// Render the header bar: live/stalled counts and the latest value per host.
pub fn render_header(frame: &mut Frame, app: &App, sinks: &[ChartSink], area: Rect) {
    let stalled = sinks.iter().filter(|s| s.stalled().is_some()).count();
    let live = sinks.len() - stalled;

    let status_style = if stalled > 0 {
        app.theme.stalled_style()
    } else {
        Style::default().fg(app.theme.highlight)
    };

    let mut spans = vec![
        Span::styled(" ● ", status_style),
        Span::styled("PINGSCOPE ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(format!("{}", live), Style::default().fg(app.theme.highlight)),
        Span::raw(" live "),
        if stalled > 0 {
            Span::styled(format!("{}", stalled), app.theme.stalled_style())
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" stalled │"),
    ];

    for (index, sink) in sinks.iter().enumerate() {
        let value = match sink.latest() {
            Some(latest) => format!("{:.1}", latest),
            None => "-".to_string(),
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{}:{}", sink.title(), value),
            Style::default().fg(app.theme.series_color(index)),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Shows a temporary status message when one is set, otherwise the view,
/// uptime and available controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, sinks: &[ChartSink], area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let selected = sinks
        .get(app.selected)
        .map(ChartSink::title)
        .unwrap_or_default();
    let controls = match app.view {
        View::Grid => "Tab:next Enter:focus ?:help q:quit",
        View::Focus => "Tab:next Esc:grid ?:help q:quit",
    };

    let status = format!(
        " {} > {} | Up {}s | {}",
        app.view.label(),
        selected,
        app.uptime().as_secs(),
        controls,
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  Tab → l     Next host"),
        Line::from("  S-Tab ← h   Previous host"),
        Line::from("  Enter z     Toggle focus"),
        Line::from("  g           Show all hosts"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ?           Toggle help"),
        Line::from("  Esc         Leave focus / quit"),
        Line::from("  q Ctrl-C    Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 36u16.min(area.width.saturating_sub(4));
    let help_height = 16u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
