use opsdeck_core::LineKind;
use opsdeck_core::OutputLine;
use opsdeck_core::Session;
use opsdeck_core::StreamState;
use ratatui::Frame;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub(crate) fn draw(frame: &mut Frame, app: &App) {
    let [header_area, output_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    let header = Line::from(header_spans(app.state(), &app.session(), app.status_note()));
    frame.render_widget(Paragraph::new(header), header_area);

    // Always show the tail of the output, like a terminal.
    let visible = output_area.height as usize;
    let output: Vec<Line> = app
        .lines()
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(render_line)
        .collect();
    frame.render_widget(Paragraph::new(output), output_area);

    let input_style = if app.input_enabled() {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    let input = Paragraph::new(format!("$ {}", app.input()))
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title("command"));
    frame.render_widget(input, input_area);
}

pub fn render_line(line: &OutputLine) -> Line<'static> {
    Line::from(Span::styled(line.text.clone(), line_style(line.kind)))
}

pub fn line_style(kind: LineKind) -> Style {
    match kind {
        LineKind::Error => Style::default().fg(Color::Red),
        LineKind::Success => Style::default().fg(Color::Green),
        LineKind::Warning => Style::default().fg(Color::Yellow),
        LineKind::Info | LineKind::Notice => Style::default().fg(Color::Cyan),
        LineKind::Stdout => Style::default(),
        LineKind::Plain => Style::default().add_modifier(Modifier::DIM),
    }
}

pub fn state_color(state: StreamState) -> Color {
    match state {
        StreamState::Ready => Color::Green,
        StreamState::Connecting | StreamState::Running => Color::Yellow,
        StreamState::Error => Color::Red,
    }
}

pub fn header_spans(
    state: StreamState,
    session: &Session,
    status_note: Option<&str>,
) -> Vec<Span<'static>> {
    let mut spans = vec![
        Span::styled("●", Style::default().fg(state_color(state))),
        " opsdeck".bold(),
        "  ".into(),
        state.as_str().to_string().cyan(),
        "  ".into(),
    ];
    if session.authenticated {
        let label = match &session.session_id {
            Some(id) => format!("session {id}"),
            None => "session active".to_string(),
        };
        spans.push(label.green());
    } else {
        spans.push("not authenticated".red());
    }
    if let Some(note) = status_note {
        spans.push("  ".into());
        spans.push(note.to_string().yellow());
    }
    spans
}
