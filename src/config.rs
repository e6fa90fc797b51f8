use serde::{Deserialize, Serialize};

use crate::arrangement::DEFAULT_BARS;
use crate::timing::{DEFAULT_BPM, clamp_bpm};

/// Lowest offline render rate accepted; anything below falls back to the default.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// User settings persisted between sessions. Every field has a default so
/// older or partial files still load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bpm: f64,
    pub total_bars: u32,
    /// Offline render rate; live playback follows the output device.
    pub sample_rate: u32,
    pub position_interval_ms: u64,
    pub looping: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            total_bars: DEFAULT_BARS,
            sample_rate: 44100,
            position_interval_ms: 100,
            looping: false,
        }
    }
}

impl Config {
    /// Pull out-of-range values back to something playable.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.bpm = clamp_bpm(self.bpm);
        if self.total_bars == 0 {
            self.total_bars = defaults.total_bars;
        }
        if self.sample_rate < MIN_SAMPLE_RATE {
            self.sample_rate = defaults.sample_rate;
        }
        if self.position_interval_ms == 0 {
            self.position_interval_ms = defaults.position_interval_ms;
        }
        self
    }
}
