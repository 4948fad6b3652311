//! Sample conversions at the API boundary.
//!
//! Everything downstream of the decoder and endpointer works on 16-bit
//! signed PCM. Callers may hand in f32 samples in [-1, 1] or raw byte
//! buffers; these helpers convert them once, here.

pub mod resample;

use serde::{Deserialize, Serialize};

use crate::error::{MurmurError, Result};

/// Encoding of a raw little-endian byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SampleFormat {
    #[default]
    I16,
    F32,
}

impl SampleFormat {
    /// Bytes per sample.
    pub fn width(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// Scale an f32 sample in [-1, 1] to i16, clamping out-of-range input.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

pub fn f32_slice_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(f32_to_i16).collect()
}

/// Decode a little-endian byte buffer to i16 samples.
///
/// # Errors
/// `UnalignedAudio` if the length is not a multiple of the sample width.
/// Nothing is ever truncated.
pub fn bytes_to_i16(bytes: &[u8], format: SampleFormat) -> Result<Vec<i16>> {
    let width = format.width();
    if bytes.len() % width != 0 {
        return Err(MurmurError::UnalignedAudio {
            len: bytes.len(),
            width,
        });
    }
    let samples = match format {
        SampleFormat::I16 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect(),
        SampleFormat::F32 => bytes
            .chunks_exact(4)
            .map(|b| f32_to_i16(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .collect(),
    };
    Ok(samples)
}

/// Average interleaved channels down to mono.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn float_conversion_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-4.0), -32767);
        assert_eq!(f32_slice_to_i16(&[0.5, -0.5]), vec![16384, -16384]);
    }

    #[test]
    fn bytes_decode_little_endian() {
        let samples = bytes_to_i16(&[0x01, 0x00, 0xff, 0xff], SampleFormat::I16).unwrap();
        assert_eq!(samples, vec![1, -1]);

        let half = 0.5f32.to_le_bytes();
        let samples = bytes_to_i16(&half, SampleFormat::F32).unwrap();
        assert_eq!(samples, vec![16384]);
    }

    #[test]
    fn misaligned_bytes_are_rejected() {
        let err = bytes_to_i16(&[0, 0, 0], SampleFormat::I16).unwrap_err();
        assert!(matches!(err, MurmurError::UnalignedAudio { len: 3, width: 2 }));
        assert!(bytes_to_i16(&[0; 6], SampleFormat::F32).is_err());
    }

    #[test]
    fn downmix_averages_frames() {
        let mono = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.0);
    }
}
