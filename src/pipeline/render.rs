use log::{debug, info};

use crate::arrangement::Sequence;
use crate::audio::{InstrumentBank, StereoFrame, SynthesisBackend};
use crate::config::MIN_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::timing::{bars_to_seconds, clamp_bpm};

use super::sequencer::{Direct, Schedules, Sequencer};

/// Release tail appended after the last bar.
pub const TAIL_SECONDS: f64 = 1.5;
pub const RENDER_CHANNELS: usize = 2;
const BLOCK_FRAMES: usize = 128;

/// Planar float samples from an offline render.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl RenderedBuffer {
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Frames an offline render of `total_bars` at `bpm` produces.
pub fn render_frames(total_bars: u32, bpm: f64, sample_rate: u32) -> usize {
    let seconds = bars_to_seconds(total_bars, clamp_bpm(bpm)) + TAIL_SECONDS;
    (seconds * sample_rate as f64).floor() as usize
}

/// Render `sequence` from the origin on a private bank and transport.
///
/// Nothing here touches live state: the bank is built fresh, routing is
/// unity gain, looping is off. The same inputs always give the same samples.
pub fn render_offline(
    sequence: &Sequence,
    bpm: f64,
    backend: &dyn SynthesisBackend,
    sample_rate: u32,
) -> Result<RenderedBuffer> {
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(Error::Render(format!(
            "sample rate {sample_rate} Hz is below the {MIN_SAMPLE_RATE} Hz minimum"
        )));
    }
    let bpm = clamp_bpm(bpm);
    let bank = InstrumentBank::create(backend, sample_rate)
        .map_err(|e| Error::Render(format!("could not build instruments: {e}")))?;

    let mut sequencer = Sequencer::new(bank, sample_rate, bpm);
    sequencer.install(Schedules::from_sequence(sequence));
    sequencer.set_looping(false);
    sequencer.play();

    let total = render_frames(sequence.total_bars, bpm, sample_rate);
    info!("rendering {} bars at {bpm} bpm: {total} frames", sequence.total_bars);

    let mut left = Vec::with_capacity(total);
    let mut right = Vec::with_capacity(total);
    let mut block = [StereoFrame::zero(); BLOCK_FRAMES];
    let mut triggers = 0usize;

    while left.len() < total {
        let n = (total - left.len()).min(BLOCK_FRAMES);
        let block = &mut block[..n];
        block.fill(StereoFrame::zero());
        sequencer.render(block, &Direct, &mut |_| triggers += 1);
        for frame in block.iter() {
            left.push(frame.left);
            right.push(frame.right);
        }
    }

    if let Some(bad) = left.iter().chain(right.iter()).position(|s| !s.is_finite()) {
        return Err(Error::Render(format!("non-finite sample at index {bad}")));
    }

    debug!(
        "render done: {triggers} triggers, {} notes dropped by polyphony",
        sequencer.bank().dropped_notes()
    );
    Ok(RenderedBuffer { sample_rate, channels: vec![left, right] })
}
