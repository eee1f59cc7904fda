//! Residual statistics and session accounting
//!
//! The decision engine consumes [`ResidualStats`] computed from the raw
//! (pre-quantization) residual stream; the pipeline accumulates per-frame
//! [`FrameStats`] into [`SessionStats`] for the end-of-run summary.

use std::collections::HashMap;

use serde::Serialize;

/// Frame encoding mode decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Encode as a self-contained keyframe
    Intra,
    /// Encode as a quantized temporal difference
    Residual,
}

impl FrameMode {
    /// Is this the keyframe mode?
    pub fn is_keyframe(&self) -> bool {
        matches!(self, FrameMode::Intra)
    }

    /// Display name for logs
    pub fn name(&self) -> &'static str {
        match self {
            FrameMode::Intra => "KEYFRAME",
            FrameMode::Residual => "RESIDUAL",
        }
    }
}

/// Number of magnitude histogram bins (1 DN per bin, last bin open-ended)
pub const NUM_BINS: usize = 1024;

/// Residual statistics for the decision engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResidualStats {
    /// Fraction of residuals with magnitude inside the dead-zone
    pub zero_mass: f64,
    /// Mean absolute residual
    pub mean_abs: f64,
    /// 95th percentile of residual magnitude
    pub p95: f64,
    /// 99th percentile of residual magnitude
    pub p99: f64,
    /// Shannon entropy of the residual symbols in bits
    pub entropy_bits: f64,
    /// Estimated bits-per-symbol rate proxy
    pub bps_res: f64,
}

/// Histogram of residual magnitudes
///
/// Bins cover `[0, 1023]` with one DN per bin; bin 1023 accumulates all
/// larger magnitudes.
#[derive(Debug, Clone)]
pub struct ResidualHistogram {
    bins: Vec<u64>,
    total_samples: u64,
}

impl ResidualHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        ResidualHistogram {
            bins: vec![0; NUM_BINS],
            total_samples: 0,
        }
    }

    /// Accumulate residual magnitudes
    pub fn accumulate(&mut self, residuals: &[i16]) {
        for &r in residuals {
            let mag = (i32::from(r)).unsigned_abs() as usize;
            let bin = mag.min(NUM_BINS - 1);
            self.bins[bin] += 1;
        }
        self.total_samples += residuals.len() as u64;
    }

    /// Histogram bins
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Total accumulated samples
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Mean magnitude
    pub fn mean(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &count)| i as f64 * count as f64)
            .sum();
        sum / self.total_samples as f64
    }

    /// Percentile by cumulative bin scan, `p` in `[0, 1]`
    ///
    /// Ties break toward the lowest bin reaching the cumulative target.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.total_samples == 0 || !(0.0..=1.0).contains(&p) {
            return 0.0;
        }

        let target = (p * self.total_samples as f64) as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return i as f64;
            }
        }
        (NUM_BINS - 1) as f64
    }

    /// Shannon entropy of the magnitude distribution in bits
    pub fn entropy(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let n = self.total_samples as f64;
        self.bins
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / n;
                -p * p.log2()
            })
            .sum()
    }
}

impl Default for ResidualHistogram {
    fn default() -> Self {
        ResidualHistogram::new()
    }
}

/// Compute residual statistics for the decision engine
///
/// Operates on the raw residual; when the quantized symbols are also
/// supplied the entropy is taken over the empirical distribution of signed
/// symbols, otherwise it is estimated from the magnitude histogram plus one
/// bit for the sign.
pub fn compute_residual_stats(
    residual: &[i16],
    dead_zone_t: u32,
    quantized: Option<&[i16]>,
) -> ResidualStats {
    if residual.is_empty() {
        return ResidualStats::default();
    }

    let mut histogram = ResidualHistogram::new();
    histogram.accumulate(residual);

    let mut zero_count = 0u64;
    let mut sum_abs = 0.0f64;
    for &r in residual {
        let mag = (i32::from(r)).unsigned_abs();
        if mag <= dead_zone_t {
            zero_count += 1;
        }
        sum_abs += f64::from(mag);
    }

    let n = residual.len() as f64;
    let entropy_bits = match quantized {
        Some(symbols) => {
            let mut counts: HashMap<i16, u64> = HashMap::new();
            for &q in symbols {
                *counts.entry(q).or_insert(0) += 1;
            }
            counts
                .values()
                .map(|&count| {
                    let p = count as f64 / symbols.len() as f64;
                    -p * p.log2()
                })
                .sum()
        }
        None => histogram.entropy() + 1.0,
    };

    ResidualStats {
        zero_mass: zero_count as f64 / n,
        mean_abs: sum_abs / n,
        p95: histogram.percentile(0.95),
        p99: histogram.percentile(0.99),
        entropy_bits,
        bps_res: entropy_bits,
    }
}

/// Per-frame statistics row
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frame_index: u32,
    pub is_keyframe: bool,
    pub residual_mean_abs: f64,
    pub residual_p95: f64,
    pub residual_p99: f64,
    pub residual_entropy: f64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub compression_ratio: f64,
    pub encode_time_ms: f64,
    pub max_error: f64,
    pub mean_error: f64,
    pub rmse: f64,
}

impl FrameStats {
    /// CSV header matching [`FrameStats::to_csv`]
    pub fn csv_header() -> &'static str {
        "frame_index,is_keyframe,residual_mean_abs,residual_p95,residual_p99,\
         residual_entropy,original_bytes,compressed_bytes,compression_ratio,\
         encode_time_ms,max_error,mean_error,rmse"
    }

    /// Format as a CSV row
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{:.3},{:.3},{:.3},{:.3},{},{},{:.3},{:.3},{:.3},{:.3},{:.3}",
            self.frame_index,
            u8::from(self.is_keyframe),
            self.residual_mean_abs,
            self.residual_p95,
            self.residual_p99,
            self.residual_entropy,
            self.original_bytes,
            self.compressed_bytes,
            self.compression_ratio,
            self.encode_time_ms,
            self.max_error,
            self.mean_error,
            self.rmse
        )
    }
}

/// Aggregate statistics for an entire session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub total_frames: u32,
    pub keyframes: u32,
    pub residual_frames: u32,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub overall_compression_ratio: f64,
    pub avg_encode_time_ms: f64,
    pub avg_max_error: f64,
    pub avg_rmse: f64,
}

impl SessionStats {
    /// Accumulate one frame
    pub fn add_frame(&mut self, fs: &FrameStats) {
        self.total_frames += 1;
        if fs.is_keyframe {
            self.keyframes += 1;
        } else {
            self.residual_frames += 1;
        }

        self.total_original_bytes += fs.original_bytes;
        self.total_compressed_bytes += fs.compressed_bytes;

        self.avg_encode_time_ms += fs.encode_time_ms;
        self.avg_max_error += fs.max_error;
        self.avg_rmse += fs.rmse;
    }

    /// Turn the accumulators into final averages
    pub fn finalize(&mut self) {
        if self.total_frames > 0 {
            let n = f64::from(self.total_frames);
            self.avg_encode_time_ms /= n;
            self.avg_max_error /= n;
            self.avg_rmse /= n;
        }
        if self.total_compressed_bytes > 0 {
            self.overall_compression_ratio =
                self.total_original_bytes as f64 / self.total_compressed_bytes as f64;
        }
    }
}
