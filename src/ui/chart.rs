//! One host's latency chart.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::sink::ChartSink;

/// Below this the axes take all the room; show a one-line summary instead.
const MIN_CHART_HEIGHT: u16 = 6;
const MIN_CHART_WIDTH: u16 = 24;

/// Render `sink` into `area` as a braille line chart.
pub fn render(frame: &mut Frame, app: &App, sink: &ChartSink, index: usize, area: Rect) {
    let selected = index == app.selected;
    let color = app.theme.series_color(index);

    let mut title = vec![Span::styled(format!(" {} ", sink.title()), app.theme.header)];
    if let Some(latest) = sink.latest() {
        title.push(Span::styled(
            format!("{:.1} ms ", latest),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }

    let border_style = if selected {
        Style::default().fg(app.theme.highlight)
    } else {
        Style::default().fg(app.theme.border)
    };
    let mut block = Block::default()
        .title(Line::from(title))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(border_style);
    if let Some(reason) = sink.stalled() {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" stalled: {} ", reason),
            app.theme.stalled_style(),
        )));
    }

    if area.height < MIN_CHART_HEIGHT || area.width < MIN_CHART_WIDTH {
        let text = match sink.latest() {
            Some(latest) => format!("{} samples, last {:.1} ms", sink.points().len(), latest),
            None => "waiting for replies".to_string(),
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    if sink.points().is_empty() {
        let text = if sink.stalled().is_some() {
            "no data"
        } else {
            "waiting for replies..."
        };
        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let (x_lo, x_hi) = sink.x_bounds();
    let (y_lo, y_hi) = sink.y_bounds();
    let y_label_style = if sink.is_autoscaled() {
        Style::default().fg(app.theme.warning)
    } else {
        app.theme.axis
    };

    let dataset = Dataset::default()
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(sink.points());

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .title(Span::styled(sink.x_label(), app.theme.axis))
                .style(app.theme.axis)
                .bounds([x_lo, x_hi])
                .labels(axis_labels(x_lo, x_hi, 0)),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled(sink.y_label(), app.theme.axis))
                .style(y_label_style)
                .bounds([y_lo, y_hi])
                .labels(axis_labels(y_lo, y_hi, 0)),
        );

    frame.render_widget(chart, area);
}

/// Low, middle and high tick labels.
fn axis_labels(lo: f64, hi: f64, precision: usize) -> Vec<String> {
    let mid = lo + (hi - lo) / 2.0;
    [lo, mid, hi]
        .iter()
        .map(|v| format!("{:.*}", precision, v))
        .collect()
}
