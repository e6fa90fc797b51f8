use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};

use crate::error::{Error, Result};

mod backend;
mod bank;
mod engine;
mod envelope;
mod filter;
mod frame;
mod mixer;
mod osc;
mod voice;

pub use backend::{BuiltinSynth, SynthesisBackend, TriggerSignature, VoiceSpec};
pub use bank::{DrumKit, DrumSlot, InstrumentBank, bass_spec, drum_spec, harmony_spec, melody_spec};
pub use engine::Engine;
pub use envelope::{Envelope, EnvelopeSpec, Stage};
pub use frame::StereoFrame;
pub use mixer::{Mixer, db_to_gain};
pub use osc::{NoiseColor, Waveform};
pub use voice::Voice;

/// Where live audio goes. Opening happens lazily on first play; `run` hands
/// the engine over to whatever thread pulls audio.
pub trait AudioOutput {
    /// Acquire the device and report its sample rate.
    fn open(&mut self) -> Result<u32>;

    /// Start pulling blocks from `engine`.
    fn run(&mut self, engine: Engine) -> Result<()>;
}

// upper bound on frames rendered per engine call inside the callback
const MAX_BLOCK: usize = 1024;

/// The default output device through cpal. Only f32 streams for now.
#[derive(Default)]
pub struct CpalOutput {
    device: Option<(cpal::Device, cpal::SupportedStreamConfig)>,
    stream: Option<cpal::Stream>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self) -> Result<u32> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioInit("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioInit(format!("no default output config: {e}")))?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(Error::AudioInit(format!(
                "unsupported sample format {:?} (only f32 supported for now)",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate();
        info!("audio output: {} channels at {sample_rate} Hz", config.channels());
        self.device = Some((device, config));
        Ok(sample_rate)
    }

    fn run(&mut self, engine: Engine) -> Result<()> {
        let (device, config) = self
            .device
            .as_ref()
            .ok_or_else(|| Error::AudioInit("output device was not opened".into()))?;
        let channels = (config.channels() as usize).max(1);
        let stream_config = config.config();

        let mut engine = engine;
        let mut frames = vec![StereoFrame::zero(); MAX_BLOCK];
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info| {
                    for chunk in data.chunks_mut(MAX_BLOCK * channels) {
                        let block = &mut frames[..chunk.len() / channels];
                        engine.render_block(block);
                        write_interleaved(block, chunk, channels);
                    }
                },
                |err| error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| Error::AudioInit(format!("could not build output stream: {e}")))?;
        stream
            .play()
            .map_err(|e| Error::AudioInit(format!("failed to play output stream: {e}")))?;

        self.stream = Some(stream);
        Ok(())
    }
}

/// Spread stereo frames over an interleaved buffer of any channel count.
/// Mono gets the average; channels past the second stay silent.
fn write_interleaved(frames: &[StereoFrame], out: &mut [f32], channels: usize) {
    for (frame, slot) in frames.iter().zip(out.chunks_mut(channels)) {
        match slot {
            [mono] => *mono = (frame.left + frame.right) * 0.5,
            [left, right, rest @ ..] => {
                *left = frame.left;
                *right = frame.right;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}
