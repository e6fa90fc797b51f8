// The synthesis capability the bank builds its voices through.

use crate::error::{Error, Result};

use super::envelope::EnvelopeSpec;
use super::osc::{NoiseColor, Waveform};
use super::voice::{BasicSub, FmSub, Membrane, Metal, MonoSynth, NoiseVoice, PolySynth, Voice};

/// How a voice expects to be triggered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerSignature {
    /// One pitch plus a duration (bass, kick, tom, melody).
    PitchAndDuration,
    /// Duration only; the pitch is fixed by the noise character (snare, clap).
    DurationOnly,
    /// A declared center frequency plus a duration (hihat, openhat).
    FixedFrequency(f32),
    /// A set of pitches triggered together (harmony).
    Chord,
}

/// Fixed timbre parameters for one voice.
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceSpec {
    Mono {
        waveform: Waveform,
        envelope: EnvelopeSpec,
        filter_envelope: EnvelopeSpec,
        base_cutoff: f32,
        octaves: f32,
        gain: f32,
    },
    Membrane {
        pitch_decay: f32,
        octaves: f32,
        envelope: EnvelopeSpec,
        gain: f32,
    },
    Noise {
        color: NoiseColor,
        seed: u64,
        envelope: EnvelopeSpec,
        gain: f32,
    },
    Metal {
        frequency: f32,
        harmonicity: f32,
        modulation_index: f32,
        resonance: f32,
        envelope: EnvelopeSpec,
        gain: f32,
    },
    PolyFm {
        harmonicity: f32,
        modulation_index: f32,
        envelope: EnvelopeSpec,
        modulation_envelope: EnvelopeSpec,
        max_polyphony: usize,
        gain: f32,
    },
    Poly {
        waveform: Waveform,
        envelope: EnvelopeSpec,
        max_polyphony: usize,
        gain: f32,
    },
}

impl VoiceSpec {
    pub fn signature(&self) -> TriggerSignature {
        match self {
            VoiceSpec::Mono { .. } | VoiceSpec::Membrane { .. } | VoiceSpec::Poly { .. } => {
                TriggerSignature::PitchAndDuration
            }
            VoiceSpec::Noise { .. } => TriggerSignature::DurationOnly,
            VoiceSpec::Metal { frequency, .. } => TriggerSignature::FixedFrequency(*frequency),
            VoiceSpec::PolyFm { .. } => TriggerSignature::Chord,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let check_env = |name: &str, env: &EnvelopeSpec| {
            if env.is_valid() {
                Ok(())
            } else {
                Err(Error::InvalidVoice(format!("{name} envelope out of range: {env:?}")))
            }
        };
        let check_num = |name: &str, v: f32| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidVoice(format!("{name} must be finite and non-negative, got {v}")))
            }
        };
        let check_poly = |n: usize| {
            if n == 0 {
                Err(Error::InvalidVoice("polyphony must be at least 1".into()))
            } else {
                Ok(())
            }
        };

        match self {
            VoiceSpec::Mono { envelope, filter_envelope, base_cutoff, octaves, gain, .. } => {
                check_env("amplitude", envelope)?;
                check_env("filter", filter_envelope)?;
                check_num("base cutoff", *base_cutoff)?;
                check_num("octaves", *octaves)?;
                check_num("gain", *gain)
            }
            VoiceSpec::Membrane { pitch_decay, octaves, envelope, gain } => {
                check_env("amplitude", envelope)?;
                check_num("pitch decay", *pitch_decay)?;
                if !(octaves.is_finite() && *octaves > 0.0) {
                    return Err(Error::InvalidVoice(format!("octaves must be positive, got {octaves}")));
                }
                check_num("gain", *gain)
            }
            VoiceSpec::Noise { envelope, gain, .. } => {
                check_env("amplitude", envelope)?;
                check_num("gain", *gain)
            }
            VoiceSpec::Metal { frequency, harmonicity, modulation_index, resonance, envelope, gain } => {
                check_env("amplitude", envelope)?;
                check_num("frequency", *frequency)?;
                check_num("harmonicity", *harmonicity)?;
                check_num("modulation index", *modulation_index)?;
                check_num("resonance", *resonance)?;
                check_num("gain", *gain)
            }
            VoiceSpec::PolyFm {
                harmonicity,
                modulation_index,
                envelope,
                modulation_envelope,
                max_polyphony,
                gain,
            } => {
                check_env("amplitude", envelope)?;
                check_env("modulation", modulation_envelope)?;
                check_num("harmonicity", *harmonicity)?;
                check_num("modulation index", *modulation_index)?;
                check_poly(*max_polyphony)?;
                check_num("gain", *gain)
            }
            VoiceSpec::Poly { envelope, max_polyphony, gain, .. } => {
                check_env("amplitude", envelope)?;
                check_poly(*max_polyphony)?;
                check_num("gain", *gain)
            }
        }
    }
}

/// Builds voices from specs. Injected into the player and the offline
/// renderer; each call returns an independent voice with no shared state.
pub trait SynthesisBackend: Send + Sync {
    fn create_voice(&self, spec: &VoiceSpec, sample_rate: u32) -> Result<Box<dyn Voice>>;
}

/// The built-in DSP voices. Deterministic: identical specs render identically.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinSynth;

impl SynthesisBackend for BuiltinSynth {
    fn create_voice(&self, spec: &VoiceSpec, sample_rate: u32) -> Result<Box<dyn Voice>> {
        if sample_rate == 0 {
            return Err(Error::InvalidVoice("sample rate must be non-zero".into()));
        }
        spec.validate()?;

        let sr = sample_rate;
        let voice: Box<dyn Voice> = match spec.clone() {
            VoiceSpec::Mono { waveform, envelope, filter_envelope, base_cutoff, octaves, gain } => {
                Box::new(MonoSynth::new(waveform, envelope, filter_envelope, base_cutoff, octaves, gain, sr))
            }
            VoiceSpec::Membrane { pitch_decay, octaves, envelope, gain } => {
                Box::new(Membrane::new(pitch_decay, octaves, envelope, gain, sr))
            }
            VoiceSpec::Noise { color, seed, envelope, gain } => {
                Box::new(NoiseVoice::new(color, seed, envelope, gain, sr))
            }
            VoiceSpec::Metal { harmonicity, modulation_index, resonance, envelope, gain, .. } => {
                Box::new(Metal::new(harmonicity, modulation_index, resonance, envelope, gain, sr))
            }
            VoiceSpec::PolyFm {
                harmonicity,
                modulation_index,
                envelope,
                modulation_envelope,
                max_polyphony,
                gain,
            } => Box::new(PolySynth::new(max_polyphony, gain, || {
                FmSub::new(harmonicity, modulation_index, envelope, modulation_envelope, sr)
            })),
            VoiceSpec::Poly { waveform, envelope, max_polyphony, gain } => {
                Box::new(PolySynth::new(max_polyphony, gain, || BasicSub::new(waveform, envelope, sr)))
            }
        };
        Ok(voice)
    }
}
