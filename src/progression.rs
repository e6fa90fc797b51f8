// Chord progression input: held notes in, chord names out.

use log::debug;

use crate::pitch::{note_to_midi, pitch_class};

/// Names the chord formed by a set of pitch classes ("C", "E", "G"), or
/// `None` when the notes do not make a chord it knows.
pub trait ChordDetector {
    fn detect(&self, pitch_classes: &[String]) -> Option<String>;
}

// (suffix, intervals above the root), most specific first
const TEMPLATES: &[(&str, &[i32])] = &[
    ("maj7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
    ("7", &[0, 4, 7, 10]),
    ("m7b5", &[0, 3, 6, 10]),
    ("dim7", &[0, 3, 6, 9]),
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("sus4", &[0, 5, 7]),
    ("sus2", &[0, 2, 7]),
    ("5", &[0, 7]),
];

/// Interval-template matcher for common triads and sevenths. Roots are tried
/// in the order the notes were played, so root position wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateDetector;

fn semitone(class: &str) -> Option<i32> {
    note_to_midi(&format!("{class}4")).map(|m| m.rem_euclid(12))
}

impl ChordDetector for TemplateDetector {
    fn detect(&self, pitch_classes: &[String]) -> Option<String> {
        let semis: Vec<(String, i32)> = pitch_classes
            .iter()
            .filter_map(|pc| semitone(pc).map(|s| (pc.clone(), s)))
            .collect();

        for (root_name, root) in &semis {
            let mut intervals: Vec<i32> = semis.iter().map(|(_, s)| (s - root).rem_euclid(12)).collect();
            intervals.sort_unstable();
            intervals.dedup();
            if let Some((suffix, _)) = TEMPLATES.iter().find(|(_, t)| *t == intervals.as_slice()) {
                return Some(format!("{root_name}{suffix}"));
            }
        }
        None
    }
}

/// Held notes plus the accumulated progression.
#[derive(Clone, Debug, Default)]
pub struct Progression {
    held: Vec<String>,
    last_detected: Option<String>,
    chords: Vec<String>,
}

impl Progression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a list of chord names, e.g. from the command line.
    pub fn from_chords<I, S>(chords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { chords: chords.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn note_on(&mut self, note: &str) {
        if !self.held.iter().any(|n| n == note) {
            self.held.push(note.to_string());
        }
    }

    pub fn note_off(&mut self, note: &str) {
        self.held.retain(|n| n != note);
    }

    pub fn held(&self) -> &[String] {
        &self.held
    }

    /// Run the detector over the held notes. Fewer than two notes is never a chord.
    pub fn detect(&mut self, detector: &dyn ChordDetector) -> Option<&str> {
        self.last_detected = if self.held.len() < 2 {
            None
        } else {
            let mut classes: Vec<String> = Vec::with_capacity(self.held.len());
            for note in &self.held {
                let class = pitch_class(note).to_string();
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
            detector.detect(&classes)
        };
        debug!("held {:?} -> {:?}", self.held, self.last_detected);
        self.last_detected.as_deref()
    }

    pub fn last_detected(&self) -> Option<&str> {
        self.last_detected.as_deref()
    }

    /// Append the last detected chord, if any, and return it.
    pub fn add_current(&mut self) -> Option<&str> {
        let chord = self.last_detected.clone()?;
        self.chords.push(chord);
        self.chords.last().map(String::as_str)
    }

    pub fn push(&mut self, chord: impl Into<String>) {
        self.chords.push(chord.into());
    }

    /// Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.chords.len()).then(|| self.chords.remove(index))
    }

    pub fn clear(&mut self) {
        self.chords.clear();
    }

    pub fn chords(&self) -> &[String] {
        &self.chords
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// One bar per chord.
    pub fn total_bars(&self) -> u32 {
        self.chords.len() as u32
    }
}
