//! Integer log-probability domain shared with the engine.

use crate::error::{MurmurError, Result};

/// Converts probabilities to and from integer logarithms in a fixed base.
///
/// The base comes from the `logbase` parameter (default `1.0001`), so one
/// log unit is roughly 1e-4 in natural-log terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogMath {
    base: f64,
    inv_log_of_base: f64,
    zero: i32,
}

impl LogMath {
    pub fn new(base: f64) -> Result<Self> {
        if base.is_nan() || base <= 1.0 || base.is_infinite() {
            return Err(MurmurError::InvalidValue {
                name: "logbase".into(),
                value: base.to_string(),
            });
        }
        Ok(Self {
            base,
            inv_log_of_base: 1.0 / base.ln(),
            // Leave headroom so sums of a few zeros cannot overflow.
            zero: i32::MIN >> 2,
        })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// The value used for log(0).
    pub fn zero(&self) -> i32 {
        self.zero
    }

    /// `log_base(p)`, truncated toward zero; `zero()` for `p <= 0`.
    pub fn log(&self, p: f64) -> i32 {
        if p <= 0.0 {
            return self.zero;
        }
        (p.ln() * self.inv_log_of_base) as i32
    }

    /// `base^logp`.
    pub fn exp(&self, logp: i32) -> f64 {
        self.base.powf(logp as f64)
    }
}
