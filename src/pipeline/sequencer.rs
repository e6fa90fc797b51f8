// Block renderer shared by live playback and offline export: a transport,
// four track schedulers and an instrument bank, driven one block at a time.

use crate::arrangement::{Cue, Sequence};
use crate::audio::{InstrumentBank, StereoFrame, TriggerSignature};
use crate::pitch::midi_to_freq;
use crate::shared::{Drum, NUM_TRACKS, TrackId};
use crate::timing::{NoteValue, Position};

use super::scheduler::TrackScheduler;
use super::transport::Transport;

/// Per-track gain and mute, read fresh at every trigger and every block.
pub trait Routing {
    fn is_muted(&self, track: TrackId) -> bool;
    fn gain(&self, track: TrackId) -> f32;
}

/// Unity gain, nothing muted. Offline renders use this so mixer settings
/// never leak into an export.
pub struct Direct;

impl Routing for Direct {
    fn is_muted(&self, _track: TrackId) -> bool {
        false
    }

    fn gain(&self, _track: TrackId) -> f32 {
        1.0
    }
}

/// The four schedulers for one prepared arrangement, plus its loop end.
/// Built off the audio thread and handed over whole.
#[derive(Clone, Debug)]
pub struct Schedules {
    tracks: [TrackScheduler<Cue>; NUM_TRACKS],
    loop_end: u64,
}

impl Schedules {
    pub fn from_sequence(sequence: &Sequence) -> Self {
        Self {
            tracks: TrackId::ALL.map(|t| TrackScheduler::new(sequence.track(t).to_vec())),
            loop_end: sequence.loop_end(),
        }
    }

    pub fn loop_end(&self) -> u64 {
        self.loop_end
    }

    pub fn track(&self, track: TrackId) -> &TrackScheduler<Cue> {
        &self.tracks[track.index()]
    }
}

// fixed drum pitches: kick C1, tom G2
const KICK_MIDI: i32 = 24;
const TOM_MIDI: i32 = 43;

pub fn default_duration(track: TrackId, drum: Option<Drum>) -> NoteValue {
    match (track, drum) {
        (TrackId::Harmony, _) => NoteValue::HALF,
        (TrackId::Drums, Some(Drum::Snare | Drum::Clap)) => NoteValue::SIXTEENTH,
        (TrackId::Drums, Some(Drum::HiHat | Drum::OpenHat)) => NoteValue::THIRTY_SECOND,
        _ => NoteValue::EIGHTH,
    }
}

/// Trigger one cue on its voice. Returns false when the cue was dropped
/// (unknown drum).
pub fn dispatch(bank: &mut InstrumentBank, track: TrackId, cue: &Cue, bpm: f64) -> bool {
    match cue {
        Cue::Note { freq, duration } => {
            let seconds = duration.unwrap_or(default_duration(track, None)).to_seconds(bpm);
            let voice = match track {
                TrackId::Bass => &mut bank.bass,
                _ => &mut bank.melody,
            };
            voice.trigger(&[*freq], seconds);
            true
        }
        Cue::Chord { freqs, duration } => {
            let seconds = duration.unwrap_or(default_duration(track, None)).to_seconds(bpm);
            bank.harmony.trigger(freqs, seconds);
            true
        }
        Cue::Drum { drum: None, .. } => false,
        Cue::Drum { drum: Some(drum), duration } => {
            let seconds = duration.unwrap_or(default_duration(track, Some(*drum))).to_seconds(bpm);
            let slot = bank.drums.get_mut(*drum);
            match slot.signature {
                TriggerSignature::PitchAndDuration => {
                    let midi = if *drum == Drum::Tom { TOM_MIDI } else { KICK_MIDI };
                    slot.voice.trigger(&[midi_to_freq(midi)], seconds);
                }
                TriggerSignature::FixedFrequency(freq) => slot.voice.trigger(&[freq], seconds),
                TriggerSignature::DurationOnly | TriggerSignature::Chord => {
                    slot.voice.trigger(&[], seconds)
                }
            }
            true
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    frame: usize,
    order: usize,
    track: TrackId,
    index: usize,
}

const SCRATCH_FRAMES: usize = 1024;

/// Drives the bank from the schedules, sample-accurately within each block.
pub struct Sequencer {
    bank: InstrumentBank,
    transport: Transport,
    schedules: Option<Schedules>,
    pending: Vec<Pending>,
    scratch: Vec<f32>,
}

impl Sequencer {
    pub fn new(bank: InstrumentBank, sample_rate: u32, bpm: f64) -> Self {
        Self {
            bank,
            transport: Transport::new(sample_rate, bpm),
            schedules: None,
            pending: Vec::with_capacity(256),
            scratch: vec![0.0; SCRATCH_FRAMES],
        }
    }

    /// Swap in a new arrangement. Stops first: nothing from the old
    /// schedules can fire after this returns.
    pub fn install(&mut self, schedules: Schedules) {
        self.stop();
        self.transport.set_loop_end(schedules.loop_end);
        self.schedules = Some(schedules);
        self.apply_loop();
    }

    pub fn has_schedules(&self) -> bool {
        self.schedules.is_some()
    }

    pub fn play(&mut self) {
        if self.schedules.is_none() {
            return;
        }
        self.transport.start();
        if let Some(s) = &mut self.schedules {
            for t in &mut s.tracks {
                t.start();
            }
        }
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        if let Some(s) = &mut self.schedules {
            for t in &mut s.tracks {
                t.stop();
            }
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.set_looping(looping);
        self.apply_loop();
    }

    fn apply_loop(&mut self) {
        let end = self.transport.is_looping().then_some(self.transport.loop_end());
        if let Some(s) = &mut self.schedules {
            for t in &mut s.tracks {
                t.set_loop(end);
            }
        }
    }

    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.transport.set_bpm(bpm)
    }

    pub fn bpm(&self) -> f64 {
        self.transport.bpm()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.transport.is_looping()
    }

    pub fn position(&self) -> Position {
        self.transport.position()
    }

    pub fn bank(&self) -> &InstrumentBank {
        &self.bank
    }

    /// Sound one melody note immediately, outside the schedule.
    pub fn preview(&mut self, freq: f32) {
        let seconds = NoteValue::EIGHTH.to_seconds(self.transport.bpm());
        self.bank.melody.trigger(&[freq], seconds);
    }

    /// Render one block, additively, into `out`.
    ///
    /// Triggers due inside the block are applied at their frame; mute is
    /// checked at that moment and `on_trigger` is told about every note that
    /// actually fired.
    pub fn render(&mut self, out: &mut [StereoFrame], routing: &dyn Routing, on_trigger: &mut dyn FnMut(TrackId)) {
        self.collect_pending(out.len());

        let bpm = self.transport.bpm();
        let mut cursor = 0;
        for i in 0..self.pending.len() {
            let p = self.pending[i];
            if p.frame > cursor {
                self.mix_range(out, cursor, p.frame, routing);
                cursor = p.frame;
            }
            if routing.is_muted(p.track) {
                continue;
            }
            let Some(schedules) = &self.schedules else { break };
            let Some((_, cue)) = schedules.tracks[p.track.index()].event(p.index) else { continue };
            if dispatch(&mut self.bank, p.track, cue, bpm) {
                on_trigger(p.track);
            }
        }
        self.mix_range(out, cursor, out.len(), routing);
    }

    fn collect_pending(&mut self, frames: usize) {
        self.pending.clear();
        let Some(schedules) = &mut self.schedules else { return };
        let pending = &mut self.pending;
        self.transport.advance(frames, |seg| {
            for track in TrackId::ALL {
                schedules.tracks[track.index()].fire(seg.scan_from, seg.scan_to, |tick, index| {
                    let order = pending.len();
                    pending.push(Pending { frame: seg.frame_of(tick), order, track, index });
                });
            }
        });
        // tracks were scanned one after another; put everything back in time order
        self.pending.sort_unstable_by_key(|p| (p.frame, p.order));
    }

    fn mix_range(&mut self, out: &mut [StereoFrame], start: usize, end: usize, routing: &dyn Routing) {
        let mut pos = start;
        while pos < end {
            let len = (end - pos).min(self.scratch.len());
            for track in TrackId::ALL {
                let scratch = &mut self.scratch[..len];
                scratch.fill(0.0);
                self.bank.render_track(track, scratch);
                let gain = routing.gain(track);
                for (frame, s) in out[pos..pos + len].iter_mut().zip(scratch.iter()) {
                    frame.left += s * gain;
                    frame.right += s * gain;
                }
            }
            pos += len;
        }
    }
}
