// Musical time: bar:beat:sixteenth positions and note-length symbols.
//
// Everything resolves to integer ticks at a fixed resolution so that live playback
// and the offline render agree exactly, and loops never drift. Ticks only become
// seconds at the moment a trigger fires, using whatever bpm is current then.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Ticks per quarter note.
pub const PPQ: u64 = 192;
/// Fixed 4/4 meter.
pub const BEATS_PER_BAR: u64 = 4;
pub const TICKS_PER_BAR: u64 = PPQ * BEATS_PER_BAR;
pub const TICKS_PER_SIXTEENTH: u64 = PPQ / 4;

pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 200.0;
pub const DEFAULT_BPM: f64 = 120.0;

pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Length of `ticks` at `bpm`, in seconds.
pub fn ticks_to_seconds(ticks: f64, bpm: f64) -> f64 {
    ticks * 60.0 / (bpm * PPQ as f64)
}

/// Length of `bars` bars of 4/4 at `bpm`, in seconds.
pub fn bars_to_seconds(bars: u32, bpm: f64) -> f64 {
    bars as f64 * BEATS_PER_BAR as f64 * 60.0 / bpm
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("bad position {0:?}")]
    Position(String),
    #[error("bad note value {0:?}")]
    NoteValue(String),
}

/// A 0-indexed `bar:beat:sixteenth` position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub bar: u32,
    pub beat: u32,
    pub sixteenth: u32,
}

impl Position {
    pub const ORIGIN: Position = Position { bar: 0, beat: 0, sixteenth: 0 };

    pub fn new(bar: u32, beat: u32, sixteenth: u32) -> Self {
        Self { bar, beat, sixteenth }
    }

    /// Start of bar `bar`; `Position::bars(n)` is also the loop end of an n-bar loop.
    pub fn bars(bar: u32) -> Self {
        Self::new(bar, 0, 0)
    }

    pub fn ticks(self) -> u64 {
        self.bar as u64 * TICKS_PER_BAR
            + self.beat as u64 * PPQ
            + self.sixteenth as u64 * TICKS_PER_SIXTEENTH
    }

    /// Seconds from the origin at `bpm`.
    pub fn to_seconds(self, bpm: f64) -> f64 {
        ticks_to_seconds(self.ticks() as f64, bpm)
    }

    /// Normalized position containing `ticks` (fractions of a sixteenth are floored).
    pub fn from_ticks(ticks: f64) -> Self {
        let ticks = if ticks.is_finite() && ticks > 0.0 { ticks as u64 } else { 0 };
        let bar = ticks / TICKS_PER_BAR;
        let rem = ticks % TICKS_PER_BAR;
        Self {
            bar: bar as u32,
            beat: (rem / PPQ) as u32,
            sixteenth: ((rem % PPQ) / TICKS_PER_SIXTEENTH) as u32,
        }
    }
}

impl FromStr for Position {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimingError::Position(s.to_string());
        let mut parts = s.trim().split(':');
        let mut next = || -> Result<u32, TimingError> {
            parts.next().ok_or_else(err)?.trim().parse::<u32>().map_err(|_| err())
        };
        let pos = Position::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(pos)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bar, self.beat, self.sixteenth)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    /// `4n`: a 1/n note.
    Note,
    /// `8t`: a 1/n triplet (2/3 of the plain note).
    Triplet,
    /// `2m`: n whole measures.
    Measure,
}

/// A note-length symbol such as `8n`, `4n.`, `8t` or `1m`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteValue {
    count: u32,
    unit: Unit,
    dotted: bool,
}

impl NoteValue {
    pub const WHOLE: NoteValue = NoteValue::note(1);
    pub const HALF: NoteValue = NoteValue::note(2);
    pub const QUARTER: NoteValue = NoteValue::note(4);
    pub const EIGHTH: NoteValue = NoteValue::note(8);
    pub const SIXTEENTH: NoteValue = NoteValue::note(16);
    pub const THIRTY_SECOND: NoteValue = NoteValue::note(32);

    const fn note(division: u32) -> Self {
        Self { count: division, unit: Unit::Note, dotted: false }
    }

    pub fn dotted(self) -> Self {
        Self { dotted: true, ..self }
    }

    pub fn is_dotted(self) -> bool {
        self.dotted
    }

    pub fn ticks(self) -> u64 {
        let base = match self.unit {
            Unit::Note => TICKS_PER_BAR / self.count as u64,
            Unit::Triplet => TICKS_PER_BAR * 2 / (self.count as u64 * 3),
            Unit::Measure => TICKS_PER_BAR * self.count as u64,
        };
        if self.dotted { base + base / 2 } else { base }
    }

    pub fn to_seconds(self, bpm: f64) -> f64 {
        ticks_to_seconds(self.ticks() as f64, bpm)
    }
}

impl FromStr for NoteValue {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimingError::NoteValue(s.to_string());
        let trimmed = s.trim();
        let (body, dotted) = match trimmed.strip_suffix('.') {
            Some(body) => (body, true),
            None => (trimmed, false),
        };
        let unit = match body.chars().last() {
            Some('n') => Unit::Note,
            Some('t') => Unit::Triplet,
            Some('m') => Unit::Measure,
            _ => return Err(err()),
        };
        let count: u32 = body[..body.len() - 1].parse().map_err(|_| err())?;
        let valid = match unit {
            Unit::Note | Unit::Triplet => matches!(count, 1 | 2 | 4 | 8 | 16 | 32),
            Unit::Measure => (1..=64).contains(&count),
        };
        if !valid {
            return Err(err());
        }
        Ok(Self { count, unit, dotted })
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            Unit::Note => 'n',
            Unit::Triplet => 't',
            Unit::Measure => 'm',
        };
        write!(f, "{}{}{}", self.count, unit, if self.dotted { "." } else { "" })
    }
}
