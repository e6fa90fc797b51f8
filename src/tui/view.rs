use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use conductr::player::PlayerState;

use super::grid::draw_track_strips;
use super::mode::DisplayState;

const HELP: &str = "space play/stop  l loop  1-4 track  m mute  [ ] vol  - = bpm  w export  p preview  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // transport
            Constraint::Min(5),    // track strips
            Constraint::Length(3), // status + help
        ])
        .split(area);

    draw_transport(frame, sections[0], state);
    draw_track_strips(frame, sections[1], state);
    draw_status(frame, sections[2], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (icon, color) = match state.state {
        PlayerState::Playing => ("▶ playing", Color::Green),
        PlayerState::Loaded => ("■ stopped", Color::White),
        PlayerState::Idle => ("· no arrangement", Color::DarkGray),
    };
    let bars = state.total_bars.map_or_else(|| "-".to_string(), |b| b.to_string());
    let top = Line::from(vec![
        Span::styled(icon, Style::default().fg(color)),
        Span::raw(format!("   {}   {:.0} bpm   {} bars", state.position, state.bpm, bars)),
        Span::styled(
            if state.looping { "   loop" } else { "" },
            Style::default().fg(Color::Cyan),
        ),
    ]);
    let chords = if state.chords.is_empty() {
        Line::from("")
    } else {
        Line::from(state.chords.join(" → "))
    };
    let block = Block::default().title(" conductr ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(vec![top, chords]).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let status = if state.rendering { "rendering…" } else { state.status.as_str() };
    let lines = vec![
        Line::from(status.to_string()),
        Line::styled(HELP, Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
