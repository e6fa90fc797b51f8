// 16-bit PCM RIFF/WAVE encoding of a rendered buffer.

use std::path::Path;

use crate::error::{Error, Result};

use super::render::RenderedBuffer;

pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// `(clamp(s) * 32767)` truncated toward zero; NaN encodes as silence.
fn to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode `buffer` as a canonical 44-byte-header WAV with interleaved
/// little-endian samples. Ragged channels, or more audio than a RIFF size
/// field can describe, fail with [`Error::Render`].
pub fn encode(buffer: &RenderedBuffer) -> Result<Vec<u8>> {
    let frames = buffer.frames();
    if buffer.channels.is_empty() {
        return Err(Error::Render("no channels to encode".into()));
    }
    if let Some(short) = buffer.channels.iter().position(|c| c.len() != frames) {
        return Err(Error::Render(format!(
            "channel {short} has {} frames, expected {frames}",
            buffer.channels[short].len()
        )));
    }
    let channels = u16::try_from(buffer.number_of_channels())
        .map_err(|_| Error::Render(format!("{} channels", buffer.number_of_channels())))?;
    let block_align = channels
        .checked_mul(BITS_PER_SAMPLE / 8)
        .ok_or_else(|| Error::Render(format!("{channels} channels")))?;
    let too_long = || Error::Render(format!("{frames} frames do not fit in a wav file"));
    let data_size = frames
        .checked_mul(block_align as usize)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(too_long)?;
    let byte_rate = buffer
        .sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| Error::Render(format!("sample rate {} too high", buffer.sample_rate)))?;

    let mut out = Vec::with_capacity(HEADER_LEN + data_size as usize);

    // RIFF chunk
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt subchunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());

    for i in 0..frames {
        for channel in &buffer.channels {
            out.extend_from_slice(&to_i16(channel[i]).to_le_bytes());
        }
    }
    Ok(out)
}

pub fn write_wav(path: &Path, buffer: &RenderedBuffer) -> Result<()> {
    std::fs::write(path, encode(buffer)?)?;
    Ok(())
}
