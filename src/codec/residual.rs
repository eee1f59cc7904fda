//! Temporal residual arithmetic
//!
//! Elementwise temporal difference, dead-zone plus step quantization in
//! fixed-point arithmetic, centered dequantization, and saturating frame
//! reconstruction. The per-pixel hot path is integer-only: the configured
//! floating-point step `Q` is converted once to `Q_fx = round(Q * 2^fp)` and
//! only that integer participates in quantization, so encoder and decoder
//! agree exactly when the decoder re-derives `Q_fx` from a persisted
//! `Q_fx / 2^fp`.
//!
//! Round-trip property: for any residual `r`,
//! `|r - dequantize(quantize(r))| <= T + ceil(Q / 2)`.

use crate::error::{Error, Result};

/// Bias added to quantized residuals to shift them into unsigned space
///
/// The symbol codec is unsigned; 32768 centers the i16 range onto u16.
pub const RESIDUAL_BIAS: i32 = 32768;

/// Quantization parameters for residual coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationParams {
    /// Dead-zone threshold in DN
    pub dead_zone_t: u32,
    /// Quantization step in fixed point, `round(Q * 2^fp_bits)`
    pub quant_q_fixed: u32,
    /// Number of fractional bits
    pub fp_bits: u32,
}

impl QuantizationParams {
    /// Build parameters from a floating-point step
    ///
    /// `fp_bits` must be in `[1, 16]` and `quant_q` must be positive; both
    /// are enforced by configuration validation before codec entry.
    pub fn new(dead_zone_t: u32, quant_q: f64, fp_bits: u32) -> Self {
        let scale = f64::from(1u32 << fp_bits);
        // A step below 2^-fp is not representable; clamp to the smallest
        // nonzero fixed-point value instead of dividing by zero later.
        let quant_q_fixed = ((quant_q * scale + 0.5) as u32).max(1);
        QuantizationParams {
            dead_zone_t,
            quant_q_fixed,
            fp_bits,
        }
    }

    /// The effective quantization step, `Q_fx / 2^fp`
    pub fn quant_q(&self) -> f64 {
        f64::from(self.quant_q_fixed) / f64::from(1u32 << self.fp_bits)
    }
}

impl Default for QuantizationParams {
    fn default() -> Self {
        QuantizationParams::new(2, 2.0, 8)
    }
}

/// Compute the temporal residual `r[i] = current[i] - previous[i]`
///
/// Differences wrap in i16; reconstruction applies the inverse operation
/// identically, so no saturation is needed at this step.
pub fn compute_residual(current: &[u16], previous: &[u16]) -> Vec<i16> {
    debug_assert_eq!(current.len(), previous.len());
    current
        .iter()
        .zip(previous.iter())
        .map(|(&c, &p)| (c as i16).wrapping_sub(p as i16))
        .collect()
}

/// Quantize a residual with dead-zone and fixed-point step
///
/// For each sample: `a' = max(0, |r| - T)`, then
/// `q = sign(r) * round(a' / Q)` computed as
/// `(a' * 2^fp + Q_fx/2) / Q_fx` (round half up against the step).
/// Fails with [`Error::Overflow`] if any quantized magnitude exceeds i16.
pub fn quantize_residual(residual: &[i16], params: &QuantizationParams) -> Result<Vec<i16>> {
    let t = u64::from(params.dead_zone_t);
    let q_fx = u64::from(params.quant_q_fixed);
    let rounding = q_fx / 2;

    let mut quantized = Vec::with_capacity(residual.len());
    for &r in residual {
        let sign: i32 = if r >= 0 { 1 } else { -1 };
        let abs_r = u64::from((i32::from(r)).unsigned_abs());

        let a2 = abs_r.saturating_sub(t);
        let q_abs = ((a2 << params.fp_bits) + rounding) / q_fx;

        if q_abs > i16::MAX as u64 {
            return Err(Error::overflow(format!(
                "quantized residual {} does not fit i16 (|r|={}, Q_fx={})",
                q_abs, abs_r, q_fx
            )));
        }
        quantized.push((sign * q_abs as i32) as i16);
    }

    Ok(quantized)
}

/// Dequantize with centered reconstruction
///
/// `q == 0` reconstructs exactly to zero so flat regions stay flat; nonzero
/// symbols reconstruct to `sign(q) * (floor(|q| * Q_fx / 2^fp) + T/2)`, the
/// `+T/2` bias centering the value within the dead-zone.
pub fn dequantize_residual(quantized: &[i16], params: &QuantizationParams) -> Vec<i32> {
    let t_half = i64::from(params.dead_zone_t / 2);
    let q_fx = u64::from(params.quant_q_fixed);

    quantized
        .iter()
        .map(|&q| {
            if q == 0 {
                0
            } else {
                let sign: i64 = if q >= 0 { 1 } else { -1 };
                let abs_q = u64::from((i32::from(q)).unsigned_abs());
                let recon_abs = ((abs_q * q_fx) >> params.fp_bits) as i64 + t_half;
                (sign * recon_abs).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
            }
        })
        .collect()
}

/// Bias quantized residuals into unsigned space for the symbol codec
pub fn bias_residual(quantized: &[i16]) -> Vec<u16> {
    quantized
        .iter()
        .map(|&q| (i32::from(q) + RESIDUAL_BIAS) as u16)
        .collect()
}

/// Undo [`bias_residual`]
pub fn unbias_residual(biased: &[u16]) -> Vec<i16> {
    biased
        .iter()
        .map(|&u| (i32::from(u) - RESIDUAL_BIAS) as i16)
        .collect()
}

/// Reconstruct a frame from the previous frame and a dequantized residual
///
/// `out[i] = clamp(previous[i] + residual[i], 0, 65535)`.
pub fn reconstruct_frame(previous: &[u16], residual: &[i32]) -> Vec<u16> {
    debug_assert_eq!(previous.len(), residual.len());
    previous
        .iter()
        .zip(residual.iter())
        .map(|(&p, &r)| (i64::from(p) + i64::from(r)).clamp(0, 65535) as u16)
        .collect()
}

/// Reconstruction error statistics between original and reconstructed frames
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorStats {
    /// Largest absolute per-sample error
    pub max_error: f64,
    /// Mean absolute per-sample error
    pub mean_error: f64,
    /// Root-mean-square error
    pub rmse: f64,
}

/// Compute error statistics between an original and its reconstruction
pub fn compute_error_stats(original: &[u16], reconstructed: &[u16]) -> ErrorStats {
    if original.is_empty() {
        return ErrorStats::default();
    }

    let mut sum_error = 0.0;
    let mut sum_sq_error = 0.0;
    let mut max_error = 0.0f64;

    for (&o, &r) in original.iter().zip(reconstructed.iter()) {
        let err = (f64::from(o) - f64::from(r)).abs();
        sum_error += err;
        sum_sq_error += err * err;
        max_error = max_error.max(err);
    }

    let n = original.len() as f64;
    ErrorStats {
        max_error,
        mean_error: sum_error / n,
        rmse: (sum_sq_error / n).sqrt(),
    }
}
