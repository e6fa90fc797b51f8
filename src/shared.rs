// Types shared between the controller, the real-time engine and the TUI.

use std::fmt;

use crate::timing::Position;

pub const NUM_TRACKS: usize = 4;

pub const MIN_VOLUME_DB: f32 = -30.0;
pub const MAX_VOLUME_DB: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackId {
    Bass,
    Drums,
    Harmony,
    Melody,
}

impl TrackId {
    pub const ALL: [TrackId; NUM_TRACKS] =
        [TrackId::Bass, TrackId::Drums, TrackId::Harmony, TrackId::Melody];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The arrangement JSON key for this track.
    pub fn key(self) -> &'static str {
        match self {
            TrackId::Bass => "bass",
            TrackId::Drums => "drums",
            TrackId::Harmony => "harmony",
            TrackId::Melody => "melody",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackId::Bass => "Bass",
            TrackId::Drums => "Drums",
            TrackId::Harmony => "Harmony",
            TrackId::Melody => "Melody",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The six percussion voices of the drum track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Drum {
    Kick,
    Snare,
    HiHat,
    OpenHat,
    Clap,
    Tom,
}

impl Drum {
    pub const ALL: [Drum; 6] =
        [Drum::Kick, Drum::Snare, Drum::HiHat, Drum::OpenHat, Drum::Clap, Drum::Tom];

    pub fn name(self) -> &'static str {
        match self {
            Drum::Kick => "kick",
            Drum::Snare => "snare",
            Drum::HiHat => "hihat",
            Drum::OpenHat => "openhat",
            Drum::Clap => "clap",
            Drum::Tom => "tom",
        }
    }

    /// Exact lowercase name; anything else is not a drum we can play.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Per-track mixer state as seen by callers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackState {
    pub volume_db: f32,
    pub muted: bool,
}

impl Default for TrackState {
    fn default() -> Self {
        Self { volume_db: 0.0, muted: false }
    }
}

/// Everything the playback core reports back to its UI.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    PlayStateChanged(bool),
    LoopChanged(bool),
    ArrangementLoaded,
    MuteChanged(TrackId, bool),
    /// A track fired a trigger; used for visual flash feedback.
    TrackTriggered(TrackId),
    /// Periodic transport position while playing.
    Position(Position),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_keys_round_trip() {
        for track in TrackId::ALL {
            assert_eq!(TrackId::from_key(track.key()), Some(track));
        }
        assert_eq!(TrackId::from_key("vocals"), None);
        assert_eq!(TrackId::Harmony.index(), 2);
    }

    #[test]
    fn test_drum_names() {
        assert_eq!(Drum::from_name("kick"), Some(Drum::Kick));
        assert_eq!(Drum::from_name("openhat"), Some(Drum::OpenHat));
        assert_eq!(Drum::from_name("cowbell"), None);
        // near misses are dropped like any unknown drum
        assert_eq!(Drum::from_name("OpenHat"), None);
        assert_eq!(Drum::from_name("Kick"), None);
        assert_eq!(Drum::from_name(" kick"), None);
    }
}
