//! Terminal rendering with ratatui.

pub mod chart;
pub mod common;
pub mod theme;

pub use theme::{Theme, ThemeChoice};

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, View};
use crate::sink::ChartSink;

// Minimum terminal size for usable display
const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 10;

/// Draw a full frame: header, charts, status bar and overlays.
pub fn render(frame: &mut Frame, app: &App, sinks: &[ChartSink]) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
            .intersection(area);
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(4),    // Charts
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, sinks, chunks[0]);

    match app.view {
        View::Focus if app.selected < sinks.len() => {
            chart::render(frame, app, &sinks[app.selected], app.selected, chunks[1]);
        }
        _ => {
            for (index, cell) in grid_cells(chunks[1], sinks.len()).into_iter().enumerate() {
                chart::render(frame, app, &sinks[index], index, cell);
            }
        }
    }

    common::render_status_bar(frame, app, sinks, chunks[2]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

/// Split `area` into `count` cells, filling rows left to right.
///
/// Uses the smallest square-ish grid that fits; the last row may hold fewer
/// cells, which then share its width.
pub fn grid_cells(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }

    let columns = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(columns);
    let row_areas = Layout::vertical(vec![Constraint::Ratio(1, rows as u32); rows]).split(area);

    let mut cells = Vec::with_capacity(count);
    for (row, row_area) in row_areas.iter().enumerate() {
        let in_row = columns.min(count - row * columns);
        let column_areas =
            Layout::horizontal(vec![Constraint::Ratio(1, in_row as u32); in_row]).split(*row_area);
        cells.extend(column_areas.iter().copied());
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shapes() {
        let area = Rect::new(0, 0, 120, 40);
        assert!(grid_cells(area, 0).is_empty());
        assert_eq!(grid_cells(area, 1), vec![area]);

        let cells = grid_cells(area, 3);
        assert_eq!(cells.len(), 3);
        // Two on top, one full-width below
        assert_eq!(cells[0].y, cells[1].y);
        assert_eq!(cells[2].width, 120);

        let cells = grid_cells(area, 4);
        assert_eq!(cells.len(), 4);
        assert!(cells.iter().all(|c| c.width == 60 && c.height == 20));
    }
}
