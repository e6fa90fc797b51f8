use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};

use conductr::shared::{NUM_TRACKS, TrackId};

use super::mode::DisplayState;

// one mixer strip per track, lit while the track is triggering
pub fn draw_track_strips(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); NUM_TRACKS])
        .split(area);

    for (track, cell) in TrackId::ALL.iter().zip(cols.iter()) {
        let i = track.index();
        let strip = state.tracks[i];

        let style = if state.lit[i] {
            Style::default().fg(Color::LightMagenta).bg(Color::Magenta)
        } else if strip.muted {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let border = if *track == state.selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            style
        };

        let lines = vec![
            Line::from(format!("{:+.0} dB", strip.volume_db)),
            Line::from(if strip.muted { "MUTE" } else { "" }),
        ];
        let block = Block::default()
            .title(format!(" {} {} ", i + 1, track.label()))
            .borders(Borders::ALL)
            .border_style(border);
        let widget = Paragraph::new(lines).alignment(Alignment::Center).style(style).block(block);
        frame.render_widget(widget, *cell);
    }
}
