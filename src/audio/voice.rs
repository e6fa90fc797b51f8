use std::f32::consts::TAU;

use super::envelope::{Envelope, EnvelopeSpec};
use super::filter::{FilterMode, Svf};
use super::osc::{Noise, NoiseColor, Oscillator, Waveform};

/// A configured synthesis unit. Renders mono, additively, into `out`.
///
/// Everything here runs on the audio thread: no allocation after
/// construction, no locks, no logging.
pub trait Voice: Send {
    /// Start a note now. `pitches` may be empty for unpitched voices;
    /// `duration` is the gate length in seconds.
    fn trigger(&mut self, pitches: &[f32], duration: f64);

    fn render(&mut self, out: &mut [f32]);

    fn is_sounding(&self) -> bool;

    /// Notes refused because every sub-voice was busy.
    fn dropped_notes(&self) -> u64 {
        0
    }
}

// ── Mono bass ─────────────────────────────────────────────────────

/// Single oscillator through a low-pass whose cutoff follows its own envelope,
/// `base * 2^(octaves * level)`. A new note retriggers from the current level.
pub struct MonoSynth {
    osc: Oscillator,
    filter: Svf,
    env: Envelope,
    filter_env: Envelope,
    base_cutoff: f32,
    octaves: f32,
    gain: f32,
    freq: f32,
    sample_rate: f32,
}

impl MonoSynth {
    pub fn new(
        waveform: Waveform,
        envelope: EnvelopeSpec,
        filter_envelope: EnvelopeSpec,
        base_cutoff: f32,
        octaves: f32,
        gain: f32,
        sample_rate: u32,
    ) -> Self {
        Self {
            osc: Oscillator::new(waveform),
            filter: Svf::new(FilterMode::LowPass, 1.0, sample_rate),
            env: Envelope::new(envelope, sample_rate),
            filter_env: Envelope::new(filter_envelope, sample_rate),
            base_cutoff,
            octaves,
            gain,
            freq: 0.0,
            sample_rate: sample_rate as f32,
        }
    }
}

impl Voice for MonoSynth {
    fn trigger(&mut self, pitches: &[f32], duration: f64) {
        let Some(&freq) = pitches.first() else { return };
        self.freq = freq;
        self.env.trigger(duration);
        self.filter_env.trigger(duration);
    }

    fn render(&mut self, out: &mut [f32]) {
        if self.env.is_idle() {
            return;
        }
        for s in out.iter_mut() {
            let amp = self.env.next();
            let cutoff = self.base_cutoff * 2f32.powf(self.octaves * self.filter_env.next());
            let x = self.osc.next(self.freq, self.sample_rate, 0.0);
            *s += self.filter.process(x, cutoff) * amp * self.gain;
        }
        if self.env.is_idle() {
            self.filter.reset();
        }
    }

    fn is_sounding(&self) -> bool {
        !self.env.is_idle()
    }
}

// ── Membrane (kick, tom) ──────────────────────────────────────────

/// Sine whose pitch sweeps exponentially from `freq * octaves` down to `freq`
/// over `pitch_decay` seconds.
pub struct Membrane {
    osc: Oscillator,
    env: Envelope,
    pitch_decay: f32,
    octaves: f32,
    gain: f32,
    freq: f32,
    elapsed: f32,
    sample_rate: f32,
}

impl Membrane {
    pub fn new(pitch_decay: f32, octaves: f32, envelope: EnvelopeSpec, gain: f32, sample_rate: u32) -> Self {
        Self {
            osc: Oscillator::new(Waveform::Sine),
            env: Envelope::new(envelope, sample_rate),
            pitch_decay,
            octaves,
            gain,
            freq: 0.0,
            elapsed: 0.0,
            sample_rate: sample_rate as f32,
        }
    }

    fn current_freq(&self) -> f32 {
        if self.elapsed >= self.pitch_decay || self.pitch_decay <= 0.0 {
            return self.freq;
        }
        let start = self.freq * self.octaves;
        start * (self.freq / start).powf(self.elapsed / self.pitch_decay)
    }
}

impl Voice for Membrane {
    fn trigger(&mut self, pitches: &[f32], duration: f64) {
        let Some(&freq) = pitches.first() else { return };
        self.freq = freq;
        self.elapsed = 0.0;
        self.osc.reset();
        self.env.trigger(duration);
    }

    fn render(&mut self, out: &mut [f32]) {
        if self.env.is_idle() {
            return;
        }
        let dt = 1.0 / self.sample_rate;
        for s in out.iter_mut() {
            let freq = self.current_freq();
            *s += self.osc.next(freq, self.sample_rate, 0.0) * self.env.next() * self.gain;
            self.elapsed += dt;
        }
    }

    fn is_sounding(&self) -> bool {
        !self.env.is_idle()
    }
}

// ── Noise (snare, clap) ───────────────────────────────────────────

pub struct NoiseVoice {
    noise: Noise,
    env: Envelope,
    gain: f32,
}

impl NoiseVoice {
    pub fn new(color: NoiseColor, seed: u64, envelope: EnvelopeSpec, gain: f32, sample_rate: u32) -> Self {
        Self { noise: Noise::new(color, seed), env: Envelope::new(envelope, sample_rate), gain }
    }
}

impl Voice for NoiseVoice {
    // pitch is ignored
    fn trigger(&mut self, _pitches: &[f32], duration: f64) {
        self.env.trigger(duration);
    }

    fn render(&mut self, out: &mut [f32]) {
        if self.env.is_idle() {
            return;
        }
        for s in out.iter_mut() {
            *s += self.noise.next() * self.env.next() * self.gain;
        }
    }

    fn is_sounding(&self) -> bool {
        !self.env.is_idle()
    }
}

// ── Metal (hihat, openhat) ────────────────────────────────────────

pub const METAL_RATIOS: [f32; 6] = [1.0, 1.483, 1.932, 2.546, 2.630, 3.897];

/// Six inharmonic square-wave FM partials through a high-pass at `resonance`.
pub struct Metal {
    carriers: [Oscillator; 6],
    modulators: [Oscillator; 6],
    filter: Svf,
    env: Envelope,
    harmonicity: f32,
    modulation_index: f32,
    resonance: f32,
    gain: f32,
    freq: f32,
    sample_rate: f32,
}

impl Metal {
    pub fn new(
        harmonicity: f32,
        modulation_index: f32,
        resonance: f32,
        envelope: EnvelopeSpec,
        gain: f32,
        sample_rate: u32,
    ) -> Self {
        Self {
            carriers: std::array::from_fn(|_| Oscillator::new(Waveform::Square)),
            modulators: std::array::from_fn(|_| Oscillator::new(Waveform::Square)),
            filter: Svf::new(FilterMode::HighPass, 0.707, sample_rate),
            env: Envelope::new(envelope, sample_rate),
            harmonicity,
            modulation_index,
            resonance,
            gain,
            freq: 0.0,
            sample_rate: sample_rate as f32,
        }
    }
}

impl Voice for Metal {
    fn trigger(&mut self, pitches: &[f32], duration: f64) {
        let Some(&freq) = pitches.first() else { return };
        self.freq = freq;
        self.env.trigger(duration);
    }

    fn render(&mut self, out: &mut [f32]) {
        if self.env.is_idle() {
            return;
        }
        let depth = self.modulation_index / TAU;
        for s in out.iter_mut() {
            let mut sum = 0.0;
            for (i, ratio) in METAL_RATIOS.iter().enumerate() {
                let f = self.freq * ratio;
                let m = self.modulators[i].next(f * self.harmonicity, self.sample_rate, 0.0);
                sum += self.carriers[i].next(f, self.sample_rate, m * depth);
            }
            let y = self.filter.process(sum / METAL_RATIOS.len() as f32, self.resonance);
            *s += y * self.env.next() * self.gain;
        }
    }

    fn is_sounding(&self) -> bool {
        !self.env.is_idle()
    }
}

// ── Polyphony ─────────────────────────────────────────────────────

/// One note slot inside a [`PolySynth`].
pub trait SubVoice: Send {
    fn note_on(&mut self, freq: f32, duration: f64);
    fn next(&mut self) -> f32;
    fn is_idle(&self) -> bool;
}

/// Fixed pool of sub-voices, allocated up front. When every slot is busy the
/// new note is dropped and counted; sounding notes are never stolen.
pub struct PolySynth<S: SubVoice> {
    slots: Vec<S>,
    gain: f32,
    dropped: u64,
}

impl<S: SubVoice> PolySynth<S> {
    pub fn new(max_polyphony: usize, gain: f32, mut make: impl FnMut() -> S) -> Self {
        Self { slots: (0..max_polyphony).map(|_| make()).collect(), gain, dropped: 0 }
    }

    pub fn active_notes(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_idle()).count()
    }
}

impl<S: SubVoice> Voice for PolySynth<S> {
    fn trigger(&mut self, pitches: &[f32], duration: f64) {
        for &freq in pitches {
            match self.slots.iter_mut().find(|s| s.is_idle()) {
                Some(slot) => slot.note_on(freq, duration),
                None => self.dropped += 1,
            }
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        for slot in self.slots.iter_mut().filter(|s| !s.is_idle()) {
            for s in out.iter_mut() {
                *s += slot.next() * self.gain;
            }
        }
    }

    fn is_sounding(&self) -> bool {
        self.slots.iter().any(|s| !s.is_idle())
    }

    fn dropped_notes(&self) -> u64 {
        self.dropped
    }
}

/// Two-operator FM: sine carrier phase-modulated by a triangle, with its own
/// modulation envelope.
pub struct FmSub {
    carrier: Oscillator,
    modulator: Oscillator,
    env: Envelope,
    mod_env: Envelope,
    harmonicity: f32,
    modulation_index: f32,
    freq: f32,
    sample_rate: f32,
}

impl FmSub {
    pub fn new(
        harmonicity: f32,
        modulation_index: f32,
        envelope: EnvelopeSpec,
        modulation_envelope: EnvelopeSpec,
        sample_rate: u32,
    ) -> Self {
        Self {
            carrier: Oscillator::new(Waveform::Sine),
            modulator: Oscillator::new(Waveform::Triangle),
            env: Envelope::new(envelope, sample_rate),
            mod_env: Envelope::new(modulation_envelope, sample_rate),
            harmonicity,
            modulation_index,
            freq: 0.0,
            sample_rate: sample_rate as f32,
        }
    }
}

impl SubVoice for FmSub {
    fn note_on(&mut self, freq: f32, duration: f64) {
        self.freq = freq;
        self.carrier.reset();
        self.modulator.reset();
        self.env.trigger(duration);
        self.mod_env.trigger(duration);
    }

    fn next(&mut self) -> f32 {
        let m = self.modulator.next(self.freq * self.harmonicity, self.sample_rate, 0.0);
        let pm = m * self.modulation_index * self.mod_env.next() / TAU;
        self.carrier.next(self.freq, self.sample_rate, pm) * self.env.next()
    }

    fn is_idle(&self) -> bool {
        self.env.is_idle()
    }
}

/// Plain oscillator with an amplitude envelope.
pub struct BasicSub {
    osc: Oscillator,
    env: Envelope,
    freq: f32,
    sample_rate: f32,
}

impl BasicSub {
    pub fn new(waveform: Waveform, envelope: EnvelopeSpec, sample_rate: u32) -> Self {
        Self {
            osc: Oscillator::new(waveform),
            env: Envelope::new(envelope, sample_rate),
            freq: 0.0,
            sample_rate: sample_rate as f32,
        }
    }
}

impl SubVoice for BasicSub {
    fn note_on(&mut self, freq: f32, duration: f64) {
        self.freq = freq;
        self.osc.reset();
        self.env.trigger(duration);
    }

    fn next(&mut self) -> f32 {
        self.osc.next(self.freq, self.sample_rate, 0.0) * self.env.next()
    }

    fn is_idle(&self) -> bool {
        self.env.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8000;
    const ENV: EnvelopeSpec = EnvelopeSpec::new(0.001, 0.05, 0.5, 0.05);

    fn peak(voice: &mut dyn Voice, samples: usize) -> f32 {
        let mut buf = vec![0.0; samples];
        voice.render(&mut buf);
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    fn run_until_silent(voice: &mut dyn Voice, max_samples: usize) -> bool {
        let mut buf = [0.0f32; 256];
        let mut rendered = 0;
        while voice.is_sounding() && rendered < max_samples {
            voice.render(&mut buf);
            rendered += buf.len();
        }
        !voice.is_sounding()
    }

    #[test]
    fn test_silent_until_triggered() {
        let mut voice = MonoSynth::new(Waveform::Sawtooth, ENV, ENV, 100.0, 2.0, 0.5, SR);
        assert!(!voice.is_sounding());
        assert_eq!(peak(&mut voice, 512), 0.0);
    }

    #[test]
    fn test_mono_synth_sounds_then_decays() {
        let mut voice = MonoSynth::new(Waveform::Sawtooth, ENV, ENV, 100.0, 2.0, 0.5, SR);
        voice.trigger(&[110.0], 0.1);
        assert!(voice.is_sounding());
        assert!(peak(&mut voice, 400) > 0.01);
        assert!(run_until_silent(&mut voice, SR as usize * 2));
    }

    #[test]
    fn test_unpitched_trigger_on_pitched_voice_is_ignored() {
        let mut voice = Membrane::new(0.05, 6.0, ENV, 0.7, SR);
        voice.trigger(&[], 0.1);
        assert!(!voice.is_sounding());
    }

    #[test]
    fn test_membrane_pitch_sweeps_down() {
        let mut voice = Membrane::new(0.05, 6.0, ENV, 0.7, SR);
        voice.trigger(&[40.0], 0.2);
        assert!((voice.current_freq() - 240.0).abs() < 1e-3);
        let mut buf = vec![0.0; (SR / 10) as usize];
        voice.render(&mut buf);
        assert!((voice.current_freq() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_noise_voice_ignores_pitch() {
        let mut a = NoiseVoice::new(NoiseColor::White, 1, ENV, 0.3, SR);
        let mut b = NoiseVoice::new(NoiseColor::White, 1, ENV, 0.3, SR);
        a.trigger(&[], 0.05);
        b.trigger(&[880.0], 0.05);
        let mut buf_a = vec![0.0; 256];
        let mut buf_b = vec![0.0; 256];
        a.render(&mut buf_a);
        b.render(&mut buf_b);
        assert_eq!(buf_a, buf_b);
        assert!(buf_a.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_metal_is_audible() {
        let mut voice = Metal::new(5.1, 32.0, 4000.0, ENV, 0.12, 44100);
        voice.trigger(&[400.0], 0.05);
        let mut buf = vec![0.0; 1024];
        voice.render(&mut buf);
        assert!(buf.iter().any(|s| s.abs() > 1e-3));
        assert!(buf.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_poly_drops_notes_beyond_cap() {
        let mut poly = PolySynth::new(4, 0.2, || BasicSub::new(Waveform::Triangle, ENV, SR));
        poly.trigger(&[220.0, 330.0, 440.0], 0.5);
        assert_eq!(poly.active_notes(), 3);
        poly.trigger(&[550.0, 660.0, 770.0], 0.5);
        assert_eq!(poly.active_notes(), 4);
        assert_eq!(poly.dropped_notes(), 2);
    }

    #[test]
    fn test_poly_frees_slots_after_release() {
        let mut poly = PolySynth::new(1, 0.2, || {
            FmSub::new(1.0, 2.0, ENV, ENV, SR)
        });
        poly.trigger(&[220.0], 0.05);
        poly.trigger(&[330.0], 0.05);
        assert_eq!(poly.dropped_notes(), 1);
        assert!(run_until_silent(&mut poly, SR as usize * 2));
        poly.trigger(&[440.0], 0.05);
        assert_eq!(poly.active_notes(), 1);
        assert_eq!(poly.dropped_notes(), 1);
    }

    #[test]
    fn test_identical_voices_render_identically() {
        let make = || PolySynth::new(8, 0.12, || FmSub::new(1.0, 2.0, ENV, ENV, SR));
        let mut a = make();
        let mut b = make();
        a.trigger(&[261.6, 329.6, 392.0], 0.2);
        b.trigger(&[261.6, 329.6, 392.0], 0.2);
        let mut buf_a = vec![0.0; 2048];
        let mut buf_b = vec![0.0; 2048];
        a.render(&mut buf_a);
        b.render(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }
}
