//! Offline sample-rate conversion for whole recordings.
//!
//! The endpointer accepts 8, 16, 32 or 48 kHz only, so a WAV file at any
//! other rate goes through [`resample`] once before framing. The result is
//! time-aligned with the input: rubato's filter delay is trimmed from the
//! front and the tail is flushed, leaving `round(len * target / source)`
//! samples.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{MurmurError, Result};

/// Input frames handed to rubato per call.
const CHUNK: usize = 1024;

fn resample_error(e: impl std::fmt::Display) -> MurmurError {
    MurmurError::Resample(e.to_string())
}

/// Convert mono f32 audio from `source_rate` to `target_rate`.
///
/// Equal rates return the input unchanged.
///
/// # Errors
/// `MurmurError::Resample` for a zero rate or if rubato rejects the ratio.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(MurmurError::Resample(format!(
            "cannot convert {source_rate} Hz to {target_rate} Hz"
        )));
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK, 1)
        .map_err(|e| MurmurError::Resample(format!("init: {e}")))?;
    let delay = resampler.output_delay();
    let wanted = (samples.len() as f64 * ratio).round() as usize;

    let mut buf = vec![vec![0f32; resampler.output_frames_max()]; 1];
    let mut out = Vec::with_capacity(delay + wanted + buf[0].len());

    let mut chunks = samples.chunks_exact(CHUNK);
    for chunk in &mut chunks {
        let (_, produced) = resampler
            .process_into_buffer(&[chunk], &mut buf, None)
            .map_err(resample_error)?;
        out.extend_from_slice(&buf[0][..produced]);
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let (_, produced) = resampler
            .process_partial_into_buffer(Some(&[tail][..]), &mut buf, None)
            .map_err(resample_error)?;
        out.extend_from_slice(&buf[0][..produced]);
    }
    // Push silence through until the delayed end of the signal is out.
    while out.len() < delay + wanted {
        let (_, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut buf, None)
            .map_err(resample_error)?;
        if produced == 0 {
            break;
        }
        out.extend_from_slice(&buf[0][..produced]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(wanted);
    debug!(source_rate, target_rate, input = samples.len(), output = out.len(), "resampled");
    Ok(out)
}
