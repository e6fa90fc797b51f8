// The four-track arrangement produced by the arrangement generator, and the
// prepared, tick-resolved form both playback paths schedule from.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::pitch::note_to_freq;
use crate::shared::{Drum, NUM_TRACKS, TrackId};
use crate::timing::{NoteValue, Position};

pub const DEFAULT_BARS: u32 = 4;

/// One event as it arrives in the arrangement JSON.
///
/// Every field is optional at this level; missing pieces get per-track defaults
/// when the sequence is prepared, and events that cannot be placed are dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Event {
    pub fn note(time: &str, note: &str, duration: &str) -> Self {
        Self {
            time: Some(time.to_string()),
            note: Some(note.to_string()),
            notes: None,
            duration: Some(duration.to_string()),
        }
    }

    pub fn chord(time: &str, notes: &[&str], duration: &str) -> Self {
        Self {
            time: Some(time.to_string()),
            note: None,
            notes: Some(notes.iter().map(|n| n.to_string()).collect()),
            duration: Some(duration.to_string()),
        }
    }
}

/// Exactly four named tracks of events. Read-only once loaded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    pub bass: Vec<Event>,
    pub drums: Vec<Event>,
    pub harmony: Vec<Event>,
    pub melody: Vec<Event>,
}

impl Arrangement {
    /// Parse generator output. Accepts bare JSON or JSON inside a markdown fence.
    pub fn from_json(text: &str) -> Result<Self> {
        let cleaned = strip_code_fence(text);
        let value: Value = serde_json::from_str(cleaned)
            .map_err(|e| Error::InvalidArrangement(format!("not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validates structural shape only: all four tracks must be arrays.
    /// Entries that are not event objects are dropped, not rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::InvalidArrangement("expected a JSON object".into()));
        };

        let mut tracks: [Vec<Event>; NUM_TRACKS] = Default::default();
        for track in TrackId::ALL {
            let Some(Value::Array(items)) = map.remove(track.key()) else {
                return Err(Error::InvalidArrangement(format!(
                    "missing or invalid track: {}",
                    track.key()
                )));
            };
            tracks[track.index()] = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, item)| match serde_json::from_value::<Event>(item) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!("{track}[{i}]: dropping malformed event: {e}");
                        None
                    }
                })
                .collect();
        }

        let [bass, drums, harmony, melody] = tracks;
        Ok(Self { bass, drums, harmony, melody })
    }

    pub fn track(&self, track: TrackId) -> &[Event] {
        match track {
            TrackId::Bass => &self.bass,
            TrackId::Drums => &self.drums,
            TrackId::Harmony => &self.harmony,
            TrackId::Melody => &self.melody,
        }
    }

    pub fn event_count(&self) -> usize {
        TrackId::ALL.iter().map(|t| self.track(*t).len()).sum()
    }

    /// Resolve every event to ticks and pitches. Events that cannot be placed
    /// (bad time, bad pitch, no pitch at all) are dropped with a warning.
    pub fn prepare(&self, total_bars: u32) -> Sequence {
        let total_bars = if total_bars == 0 {
            warn!("arrangement loaded with 0 bars, using {DEFAULT_BARS}");
            DEFAULT_BARS
        } else {
            total_bars
        };

        let tracks = TrackId::ALL.map(|track| {
            let cues: Vec<TimedCue> = self
                .track(track)
                .iter()
                .enumerate()
                .filter_map(|(i, event)| match prepare_event(track, event) {
                    Ok(cue) => Some(cue),
                    Err(reason) => {
                        warn!("{track}[{i}]: dropping event: {reason}");
                        None
                    }
                })
                .collect();
            debug!("{track}: {} of {} events scheduled", cues.len(), self.track(track).len());
            cues
        });

        Sequence { tracks, total_bars }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // skip an info string such as `json`
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => trimmed,
    }
}

/// What a track should play at a given tick, with pitches already resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Cue {
    /// Bass and melody: one pitch.
    Note { freq: f32, duration: Option<NoteValue> },
    /// Harmony: a voicing triggered together.
    Chord { freqs: Vec<f32>, duration: Option<NoteValue> },
    /// Drums: the voice is looked up at trigger time; `None` means an unknown name.
    Drum { drum: Option<Drum>, duration: Option<NoteValue> },
}

pub type TimedCue = (u64, Cue);

fn prepare_event(track: TrackId, event: &Event) -> std::result::Result<TimedCue, String> {
    let time = event.time.as_deref().ok_or("no time")?;
    let tick = time.parse::<Position>().map_err(|e| e.to_string())?.ticks();

    // an unparseable duration falls back to the track default rather than losing the note
    let duration = match event.duration.as_deref() {
        Some(d) => match d.parse::<NoteValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{track}: {e}, using the default length");
                None
            }
        },
        None => None,
    };

    let freq_of = |name: &str| note_to_freq(name).ok_or_else(|| format!("bad pitch {name:?}"));

    let cue = match track {
        TrackId::Bass | TrackId::Melody => {
            let note = event.note.as_deref().ok_or("no note")?;
            Cue::Note { freq: freq_of(note)?, duration }
        }
        TrackId::Harmony => {
            let names: Vec<&str> = match (&event.notes, &event.note) {
                (Some(notes), _) => notes.iter().map(String::as_str).collect(),
                (None, Some(note)) => vec![note.as_str()],
                (None, None) => return Err("no notes".into()),
            };
            let freqs = names.into_iter().map(freq_of).collect::<std::result::Result<Vec<_>, _>>()?;
            if freqs.is_empty() {
                return Err("empty chord".into());
            }
            Cue::Chord { freqs, duration }
        }
        TrackId::Drums => {
            let name = event.note.as_deref().unwrap_or_default();
            Cue::Drum { drum: Drum::from_name(name), duration }
        }
    };
    Ok((tick, cue))
}

/// A prepared arrangement: per-track `(tick, cue)` lists plus the loop length.
/// Immutable and shared between the live player and offline renders.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub tracks: [Vec<TimedCue>; NUM_TRACKS],
    pub total_bars: u32,
}

impl Sequence {
    pub fn track(&self, track: TrackId) -> &[TimedCue] {
        &self.tracks[track.index()]
    }

    /// Loop end, `{total_bars}:0:0`, in ticks.
    pub fn loop_end(&self) -> u64 {
        Position::bars(self.total_bars).ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TICKS_PER_BAR;

    const SAMPLE: &str = r#"{
        "bass": [{"time": "0:0:0", "note": "C2", "duration": "4n"}],
        "drums": [{"time": "0:0:0", "note": "kick", "duration": "8n"},
                  {"time": "0:1:0", "note": "cowbell"}],
        "harmony": [{"time": "0:0:0", "notes": ["C4", "E4", "G4"], "duration": "2n"}],
        "melody": [{"time": "0:2:0", "note": "E5"}]
    }"#;

    #[test]
    fn test_parse_valid_arrangement() {
        let arr = Arrangement::from_json(SAMPLE).unwrap();
        assert_eq!(arr.bass.len(), 1);
        assert_eq!(arr.drums.len(), 2);
        assert_eq!(arr.harmony[0].notes.as_ref().unwrap().len(), 3);
        assert_eq!(arr.melody[0].duration, None);
        assert_eq!(arr.event_count(), 5);
    }

    #[test]
    fn test_missing_track_is_invalid() {
        let json = r#"{"bass": [], "drums": [], "harmony": []}"#;
        let err = Arrangement::from_json(json).unwrap_err();
        match err {
            Error::InvalidArrangement(msg) => assert!(msg.contains("melody"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_non_array_track_is_invalid() {
        let json = r#"{"bass": [], "drums": {}, "harmony": [], "melody": []}"#;
        assert!(matches!(Arrangement::from_json(json), Err(Error::InvalidArrangement(_))));
        assert!(matches!(Arrangement::from_json("[]"), Err(Error::InvalidArrangement(_))));
        assert!(matches!(Arrangement::from_json("not json"), Err(Error::InvalidArrangement(_))));
    }

    #[test]
    fn test_empty_tracks_are_valid() {
        let json = r#"{"bass": [], "drums": [], "harmony": [], "melody": []}"#;
        let arr = Arrangement::from_json(json).unwrap();
        assert_eq!(arr.event_count(), 0);
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let fenced = format!("Here you go:\n```json\n{SAMPLE}\n```\nEnjoy!");
        let arr = Arrangement::from_json(&fenced).unwrap();
        assert_eq!(arr.bass.len(), 1);
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let json = r#"{"bass": [42, {"time": "0:0:0", "note": "C2"}], "drums": [], "harmony": [], "melody": []}"#;
        let arr = Arrangement::from_json(json).unwrap();
        assert_eq!(arr.bass.len(), 1);
    }

    #[test]
    fn test_prepare_resolves_ticks_and_defaults() {
        let seq = Arrangement::from_json(SAMPLE).unwrap().prepare(2);
        assert_eq!(seq.total_bars, 2);
        assert_eq!(seq.loop_end(), 2 * TICKS_PER_BAR);

        let (tick, cue) = &seq.track(TrackId::Melody)[0];
        assert_eq!(*tick, 2 * crate::timing::PPQ);
        match cue {
            Cue::Note { duration, .. } => assert_eq!(*duration, None),
            other => panic!("unexpected cue {other:?}"),
        }

        // unknown drum names survive preparation and are dropped at trigger time
        let drums = seq.track(TrackId::Drums);
        assert_eq!(drums.len(), 2);
        assert!(matches!(drums[1].1, Cue::Drum { drum: None, .. }));
    }

    #[test]
    fn test_harmony_single_note_is_wrapped() {
        let mut arr = Arrangement::default();
        arr.harmony.push(Event::note("0:0:0", "A3", "1n"));
        let seq = arr.prepare(1);
        match &seq.track(TrackId::Harmony)[0].1 {
            Cue::Chord { freqs, .. } => assert_eq!(freqs.len(), 1),
            other => panic!("unexpected cue {other:?}"),
        }
    }

    #[test]
    fn test_unplaceable_events_are_dropped() {
        let mut arr = Arrangement::default();
        arr.bass.push(Event::note("nonsense", "C2", "8n"));
        arr.bass.push(Event::note("0:0:0", "Q9", "8n"));
        arr.bass.push(Event { time: Some("0:0:0".into()), ..Event::default() });
        arr.bass.push(Event::note("0:1:0", "C2", "banana"));
        let seq = arr.prepare(1);
        let bass = seq.track(TrackId::Bass);
        assert_eq!(bass.len(), 1);
        assert!(matches!(bass[0].1, Cue::Note { duration: None, .. }));
    }

    #[test]
    fn test_zero_bars_falls_back() {
        let seq = Arrangement::default().prepare(0);
        assert_eq!(seq.total_bars, DEFAULT_BARS);
    }
}
