use log::debug;

use crate::error::Result;
use crate::shared::{Drum, TrackId};

use super::backend::{SynthesisBackend, TriggerSignature, VoiceSpec};
use super::envelope::EnvelopeSpec;
use super::osc::{NoiseColor, Waveform};
use super::voice::Voice;

// fixed timbres

pub fn bass_spec() -> VoiceSpec {
    VoiceSpec::Mono {
        waveform: Waveform::Sawtooth,
        envelope: EnvelopeSpec::new(0.02, 0.3, 0.6, 0.4),
        filter_envelope: EnvelopeSpec::new(0.02, 0.2, 0.4, 0.4),
        base_cutoff: 100.0,
        octaves: 2.0,
        gain: 0.35,
    }
}

pub fn drum_spec(drum: Drum) -> VoiceSpec {
    match drum {
        Drum::Kick => VoiceSpec::Membrane {
            pitch_decay: 0.05,
            octaves: 6.0,
            envelope: EnvelopeSpec::new(0.001, 0.4, 0.01, 0.4),
            gain: 0.7,
        },
        Drum::Snare => VoiceSpec::Noise {
            color: NoiseColor::White,
            seed: 0x5EED_0001,
            envelope: EnvelopeSpec::new(0.001, 0.15, 0.0, 0.1),
            gain: 0.3,
        },
        Drum::HiHat => VoiceSpec::Metal {
            frequency: 400.0,
            harmonicity: 5.1,
            modulation_index: 32.0,
            resonance: 4000.0,
            envelope: EnvelopeSpec::new(0.001, 0.05, 0.0, 0.01),
            gain: 0.12,
        },
        Drum::OpenHat => VoiceSpec::Metal {
            frequency: 400.0,
            harmonicity: 5.1,
            modulation_index: 32.0,
            resonance: 4000.0,
            envelope: EnvelopeSpec::new(0.001, 0.3, 0.0, 0.1),
            gain: 0.12,
        },
        Drum::Clap => VoiceSpec::Noise {
            color: NoiseColor::Pink,
            seed: 0x5EED_0002,
            envelope: EnvelopeSpec::new(0.005, 0.1, 0.0, 0.05),
            gain: 0.3,
        },
        Drum::Tom => VoiceSpec::Membrane {
            pitch_decay: 0.08,
            octaves: 4.0,
            envelope: EnvelopeSpec::new(0.001, 0.3, 0.01, 0.3),
            gain: 0.5,
        },
    }
}

pub fn harmony_spec() -> VoiceSpec {
    VoiceSpec::PolyFm {
        harmonicity: 1.0,
        modulation_index: 2.0,
        envelope: EnvelopeSpec::new(0.3, 0.3, 0.8, 0.8),
        modulation_envelope: EnvelopeSpec::new(0.5, 0.2, 0.5, 0.5),
        max_polyphony: 8,
        gain: 0.12,
    }
}

pub fn melody_spec() -> VoiceSpec {
    VoiceSpec::Poly {
        waveform: Waveform::Triangle,
        envelope: EnvelopeSpec::new(0.02, 0.2, 0.5, 0.3),
        max_polyphony: 4,
        gain: 0.2,
    }
}

/// One percussion voice and the way it wants to be triggered.
pub struct DrumSlot {
    pub voice: Box<dyn Voice>,
    pub signature: TriggerSignature,
}

pub struct DrumKit {
    slots: Vec<DrumSlot>,
}

impl DrumKit {
    pub fn get_mut(&mut self, drum: Drum) -> &mut DrumSlot {
        // slots are built in Drum::ALL order
        &mut self.slots[drum as usize]
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for slot in &mut self.slots {
            slot.voice.render(out);
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.slots.iter().any(|s| s.voice.is_sounding())
    }
}

/// The nine voices of one playback context.
///
/// Every call to [`InstrumentBank::create`] builds a fresh, independent set;
/// the live engine and each offline render own their own bank.
pub struct InstrumentBank {
    pub bass: Box<dyn Voice>,
    pub drums: DrumKit,
    pub harmony: Box<dyn Voice>,
    pub melody: Box<dyn Voice>,
}

impl InstrumentBank {
    pub fn create(backend: &dyn SynthesisBackend, sample_rate: u32) -> Result<Self> {
        let bass = backend.create_voice(&bass_spec(), sample_rate)?;
        let slots = Drum::ALL
            .iter()
            .map(|&drum| {
                let spec = drum_spec(drum);
                Ok(DrumSlot { signature: spec.signature(), voice: backend.create_voice(&spec, sample_rate)? })
            })
            .collect::<Result<Vec<_>>>()?;
        let harmony = backend.create_voice(&harmony_spec(), sample_rate)?;
        let melody = backend.create_voice(&melody_spec(), sample_rate)?;
        debug!("instrument bank created at {sample_rate} Hz");
        Ok(Self { bass, drums: DrumKit { slots }, harmony, melody })
    }

    pub fn voice_count(&self) -> usize {
        3 + self.drums.slots.len()
    }

    /// Render every voice belonging to `track` into `out`, additively.
    pub fn render_track(&mut self, track: TrackId, out: &mut [f32]) {
        match track {
            TrackId::Bass => self.bass.render(out),
            TrackId::Drums => self.drums.render(out),
            TrackId::Harmony => self.harmony.render(out),
            TrackId::Melody => self.melody.render(out),
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.bass.is_sounding()
            || self.drums.is_sounding()
            || self.harmony.is_sounding()
            || self.melody.is_sounding()
    }

    pub fn dropped_notes(&self) -> u64 {
        self.harmony.dropped_notes() + self.melody.dropped_notes()
    }
}
