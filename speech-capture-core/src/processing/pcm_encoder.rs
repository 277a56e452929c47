//! Float → signed 16-bit linear PCM quantization.
//!
//! Negative samples scale by 32768 and non-negative samples by 32767, so
//! `-1.0` maps to `i16::MIN` and `1.0` to `i16::MAX` without overflow.
//! Conversion truncates toward zero. No dithering.

const NEGATIVE_SCALE: f32 = 32768.0;
const POSITIVE_SCALE: f32 = 32767.0;

/// Quantize a single sample. Out-of-range input is clamped; NaN encodes as 0.
#[inline]
pub fn encode_sample(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * NEGATIVE_SCALE) as i16
    } else {
        (clamped * POSITIVE_SCALE) as i16
    }
}

/// Inverse of [`encode_sample`], up to one quantization step.
#[inline]
pub fn decode_sample(value: i16) -> f32 {
    if value < 0 {
        value as f32 / NEGATIVE_SCALE
    } else {
        value as f32 / POSITIVE_SCALE
    }
}

/// Quantize `samples` into `frame`, replacing its contents.
pub fn encode_into(samples: &[f32], frame: &mut Vec<i16>) {
    frame.clear();
    frame.extend(samples.iter().map(|&s| encode_sample(s)));
}

pub fn encode(samples: &[f32]) -> Vec<i16> {
    let mut frame = Vec::with_capacity(samples.len());
    encode_into(samples, &mut frame);
    frame
}

/// Serialize a PCM frame as little-endian bytes into `bytes`, replacing its contents.
pub fn frame_to_le_bytes_into(frame: &[i16], bytes: &mut Vec<u8>) {
    bytes.clear();
    for &value in frame {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
}

/// Reinterpret little-endian bytes as PCM words. A trailing odd byte is ignored.
pub fn frame_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
