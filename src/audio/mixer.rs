use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::pipeline::sequencer::Routing;
use crate::shared::{MAX_VOLUME_DB, MIN_VOLUME_DB, NUM_TRACKS, TrackId, TrackState};

struct Strip {
    // f32 bits
    volume_db: AtomicU32,
    muted: AtomicBool,
}

impl Strip {
    fn new() -> Self {
        Self { volume_db: AtomicU32::new(0.0f32.to_bits()), muted: AtomicBool::new(false) }
    }

    fn volume_db(&self) -> f32 {
        f32::from_bits(self.volume_db.load(Ordering::Relaxed))
    }
}

/// Live per-track volume and mute.
///
/// Written by the controller, read by the audio thread at every trigger and
/// every block, so changes land without rebuilding any schedule.
pub struct Mixer {
    strips: [Strip; NUM_TRACKS],
}

impl Mixer {
    pub fn new() -> Self {
        Self { strips: std::array::from_fn(|_| Strip::new()) }
    }

    /// Clamps to the mixer range and returns the stored value.
    pub fn set_volume(&self, track: TrackId, db: f32) -> f32 {
        let db = if db.is_nan() { 0.0 } else { db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB) };
        self.strips[track.index()].volume_db.store(db.to_bits(), Ordering::Relaxed);
        db
    }

    /// Returns the new mute state.
    pub fn toggle_mute(&self, track: TrackId) -> bool {
        !self.strips[track.index()].muted.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn track_state(&self, track: TrackId) -> TrackState {
        let strip = &self.strips[track.index()];
        TrackState { volume_db: strip.volume_db(), muted: strip.muted.load(Ordering::Relaxed) }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Routing for Mixer {
    fn is_muted(&self, track: TrackId) -> bool {
        self.strips[track.index()].muted.load(Ordering::Relaxed)
    }

    fn gain(&self, track: TrackId) -> f32 {
        if self.is_muted(track) {
            0.0
        } else {
            db_to_gain(self.strips[track.index()].volume_db())
        }
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
