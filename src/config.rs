//! Compression configuration
//!
//! Parameters come from a YAML file (optionally through a named profile
//! under a top-level `profiles` mapping) and/or CLI overrides. Field names
//! match the YAML keys; everything except the input and output directories
//! has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::DecisionConfig;
use crate::error::{Error, Result};

fn default_gop_period() -> u32 {
    60
}
fn default_keyframe_near() -> u32 {
    0
}
fn default_residual_near() -> u32 {
    10
}
fn default_dead_zone_t() -> u32 {
    2
}
fn default_quant_q() -> f64 {
    2.0
}
fn default_fp_bits() -> u32 {
    8
}
fn default_enable_12bit_mode() -> bool {
    true
}
fn default_zero_mass_min() -> f64 {
    0.75
}
fn default_mean_abs_max() -> f64 {
    12.0
}
fn default_p95_threshold() -> f64 {
    30.0
}
fn default_p99_threshold() -> f64 {
    100.0
}
fn default_entropy_threshold() -> f64 {
    6.0
}
fn default_margin_bpp() -> f64 {
    0.3
}
fn default_hysteresis_bpp() -> f64 {
    0.15
}
fn default_ema_alpha() -> f64 {
    0.1
}

/// Complete compression configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompressionConfig {
    /// Directory of input PNG frames
    #[serde(default)]
    pub input_dir: PathBuf,
    /// Directory for compressed records and reports
    #[serde(default)]
    pub output_dir: PathBuf,

    /// Force a keyframe every N frames
    #[serde(default = "default_gop_period")]
    pub gop_period: u32,
    /// NEAR parameter for keyframes (0 = lossless)
    #[serde(default = "default_keyframe_near")]
    pub keyframe_near: u32,
    /// NEAR parameter for residual frames
    #[serde(default = "default_residual_near")]
    pub residual_near: u32,
    /// Dead-zone threshold
    #[serde(default = "default_dead_zone_t", rename = "dead_zone_T")]
    pub dead_zone_t: u32,
    /// Quantization step
    #[serde(default = "default_quant_q", rename = "quant_Q")]
    pub quant_q: f64,
    /// Fixed-point fractional bits
    #[serde(default = "default_fp_bits")]
    pub fp_bits: u32,

    /// Range-map intra frames to 12 bits when beneficial
    #[serde(default = "default_enable_12bit_mode")]
    pub enable_12bit_mode: bool,

    /// Minimum dead-zone fraction before forcing intra
    #[serde(default = "default_zero_mass_min")]
    pub decision_zero_mass_min: f64,
    /// Maximum mean absolute residual before forcing intra
    #[serde(default = "default_mean_abs_max")]
    pub decision_mean_abs_max: f64,
    /// P95 threshold for the intra decision
    #[serde(default = "default_p95_threshold")]
    pub decision_p95_threshold: f64,
    /// P99 threshold for the intra decision
    #[serde(default = "default_p99_threshold")]
    pub decision_p99_threshold: f64,
    /// Entropy threshold for the intra decision
    #[serde(default = "default_entropy_threshold")]
    pub decision_entropy_threshold: f64,
    /// BPP slack added to the residual rate proxy
    #[serde(default = "default_margin_bpp")]
    pub decision_margin_bpp: f64,
    /// BPP hysteresis preventing mode flip-flop
    #[serde(default = "default_hysteresis_bpp")]
    pub decision_hysteresis_bpp: f64,
    /// EMA smoothing factor
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,

    /// Write a per-frame statistics CSV next to the compressed output
    #[serde(default)]
    pub write_frame_stats: bool,
    /// Decode every emitted record and write the reconstruction as PNG
    #[serde(default)]
    pub write_decoded_frames: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            gop_period: default_gop_period(),
            keyframe_near: default_keyframe_near(),
            residual_near: default_residual_near(),
            dead_zone_t: default_dead_zone_t(),
            quant_q: default_quant_q(),
            fp_bits: default_fp_bits(),
            enable_12bit_mode: default_enable_12bit_mode(),
            decision_zero_mass_min: default_zero_mass_min(),
            decision_mean_abs_max: default_mean_abs_max(),
            decision_p95_threshold: default_p95_threshold(),
            decision_p99_threshold: default_p99_threshold(),
            decision_entropy_threshold: default_entropy_threshold(),
            decision_margin_bpp: default_margin_bpp(),
            decision_hysteresis_bpp: default_hysteresis_bpp(),
            ema_alpha: default_ema_alpha(),
            write_frame_stats: false,
            write_decoded_frames: false,
        }
    }
}

impl CompressionConfig {
    /// Load configuration from a YAML file
    ///
    /// When `profile` is given, the named subtree under the top-level
    /// `profiles` mapping replaces the root document.
    pub fn load_from_yaml(path: &Path, profile: Option<&str>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| Error::config(format!("YAML parse error in {}: {}", path.display(), e)))?;

        let node = match profile {
            Some(name) => doc
                .get("profiles")
                .and_then(|profiles| profiles.get(name))
                .cloned()
                .ok_or_else(|| {
                    Error::config(format!(
                        "profile '{}' not found in {}",
                        name,
                        path.display()
                    ))
                })?,
            None => doc,
        };

        let config: CompressionConfig = serde_yaml::from_value(node)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        Ok(config)
    }

    /// Validate all parameters
    pub fn validate(&self) -> Result<()> {
        if self.input_dir.as_os_str().is_empty() || self.output_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "input and output directories must be specified",
            ));
        }
        if self.gop_period == 0 {
            return Err(Error::config("gop_period must be > 0"));
        }
        if self.quant_q <= 0.0 {
            return Err(Error::config("quant_Q must be > 0"));
        }
        if !(1..=16).contains(&self.fp_bits) {
            return Err(Error::config("fp_bits must be in [1, 16]"));
        }
        if self.keyframe_near > 255 || self.residual_near > 255 {
            return Err(Error::config("NEAR parameters must be <= 255"));
        }
        if self.dead_zone_t >= 1 << 15 {
            return Err(Error::config("dead_zone_T must be < 32768"));
        }
        if self.decision_p95_threshold < 0.0
            || self.decision_p99_threshold < 0.0
            || self.decision_entropy_threshold < 0.0
            || self.decision_mean_abs_max < 0.0
        {
            return Err(Error::config("decision thresholds must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.decision_zero_mass_min) {
            return Err(Error::config("decision_zero_mass_min must be in [0, 1]"));
        }
        if !(0.1..=0.2).contains(&self.ema_alpha) {
            return Err(Error::config("ema_alpha must be in [0.1, 0.2]"));
        }
        Ok(())
    }

    /// Decision engine view of this configuration
    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            gop_period: self.gop_period,
            zero_mass_min: self.decision_zero_mass_min,
            mean_abs_max: self.decision_mean_abs_max,
            p95_max: self.decision_p95_threshold,
            p99_max: self.decision_p99_threshold,
            entropy_max: self.decision_entropy_threshold,
            margin_bpp: self.decision_margin_bpp,
            hysteresis_bpp: self.decision_hysteresis_bpp,
            ema_alpha: self.ema_alpha,
        }
    }
}
