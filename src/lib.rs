//! Arrangement playback and rendering.
//!
//! A four-track [`Arrangement`] (bass, drums, harmony, melody) is prepared
//! into tick-resolved [`arrangement::Sequence`]s, played live through a
//! [`Player`] with per-track volume and mute, or rendered offline to a
//! 16-bit PCM WAV file. Both paths share one timing model and one dispatch
//! table but never share voices.

pub mod arrangement;
pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pitch;
pub mod player;
pub mod progression;
pub mod shared;
pub mod timing;

pub use arrangement::{Arrangement, Event};
pub use audio::{BuiltinSynth, SynthesisBackend};
pub use config::Config;
pub use error::{Error, Result};
pub use player::{Player, PlayerState, export_file_name};
pub use shared::{Notification, TrackId, TrackState};
