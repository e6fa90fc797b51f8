use std::time::{Duration, Instant};

use conductr::player::{Player, PlayerState};
use conductr::shared::{NUM_TRACKS, Notification, TrackId, TrackState};
use conductr::timing::Position;

// how long a track strip stays lit after a trigger
const FLASH: Duration = Duration::from_millis(120);

// state local to the tui: selection, trigger flashes and the last
// position/status reported by the player
#[derive(Clone, Debug)]
pub struct TuiState {
    pub selected: TrackId,
    pub position: Position,
    pub status: String,
    pub rendering: bool,
    flash_until: [Option<Instant>; NUM_TRACKS],
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            selected: TrackId::Bass,
            position: Position::ORIGIN,
            status: String::new(),
            rendering: false,
            flash_until: [None; NUM_TRACKS],
        }
    }
}

impl TuiState {
    pub fn apply(&mut self, n: &Notification, now: Instant) {
        match n {
            Notification::TrackTriggered(track) => self.flash_until[track.index()] = Some(now + FLASH),
            Notification::Position(p) => self.position = *p,
            Notification::PlayStateChanged(false) | Notification::ArrangementLoaded => {
                self.position = Position::ORIGIN
            }
            Notification::MuteChanged(track, muted) => {
                self.status = format!("{} {}", track.label(), if *muted { "muted" } else { "unmuted" });
            }
            Notification::LoopChanged(on) => {
                self.status = format!("loop {}", if *on { "on" } else { "off" });
            }
            Notification::PlayStateChanged(true) => {}
        }
    }

    pub fn lit(&self, now: Instant) -> [bool; NUM_TRACKS] {
        self.flash_until.map(|until| until.is_some_and(|t| now < t))
    }
}

// everything the view needs for one frame
#[derive(Clone, Debug)]
pub struct DisplayState {
    pub state: PlayerState,
    pub looping: bool,
    pub bpm: f64,
    pub position: Position,
    pub total_bars: Option<u32>,
    pub tracks: [TrackState; NUM_TRACKS],
    pub lit: [bool; NUM_TRACKS],
    pub selected: TrackId,
    pub chords: Vec<String>,
    pub status: String,
    pub rendering: bool,
}

impl DisplayState {
    pub fn capture(player: &Player, ts: &TuiState, chords: &[String], now: Instant) -> Self {
        Self {
            state: player.state(),
            looping: player.is_looping(),
            bpm: player.bpm(),
            position: ts.position,
            total_bars: player.total_bars(),
            tracks: TrackId::ALL.map(|t| player.track_state(t)),
            lit: ts.lit(now),
            selected: ts.selected,
            chords: chords.to_vec(),
            status: ts.status.clone(),
            rendering: ts.rendering,
        }
    }
}
