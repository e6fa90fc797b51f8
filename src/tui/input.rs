use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use conductr::shared::TrackId;

// semantic events the main loop turns into player calls
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Quit,
    TogglePlay,
    ToggleLoop,
    SelectTrack(TrackId),
    ToggleMute,
    VolumeStep(f32),
    BpmStep(f64),
    Export,
    Preview,
}

// poll for one key press and resolve it; releases and repeats are ignored
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::TogglePlay],
        KeyCode::Char('l') => vec![InputEvent::ToggleLoop],

        // track select
        KeyCode::Char(c @ '1'..='4') => {
            let idx = c as usize - '1' as usize;
            vec![InputEvent::SelectTrack(TrackId::ALL[idx])]
        }
        KeyCode::Char('m') => vec![InputEvent::ToggleMute],

        // knobs: brackets for volume, minus/equals for tempo
        KeyCode::Char('[') => vec![InputEvent::VolumeStep(-1.0)],
        KeyCode::Char(']') => vec![InputEvent::VolumeStep(1.0)],
        KeyCode::Char('-') => vec![InputEvent::BpmStep(-1.0)],
        KeyCode::Char('=') => vec![InputEvent::BpmStep(1.0)],

        KeyCode::Char('w') => vec![InputEvent::Export],
        KeyCode::Char('p') => vec![InputEvent::Preview],

        _ => vec![],
    }
}
