//! Intra vs. residual decision engine
//!
//! Three stages, evaluated in order; the first stage to demand a keyframe
//! wins:
//!
//! 1. **Periodic**: force intra every `gop_period` frames, counted both by
//!    frames since the last keyframe and by absolute frame index.
//! 2. **Heuristic**: force intra on statistical evidence of a scene change,
//!    flat-field correction, or a large global shift (low zero-mass, high
//!    mean-abs, heavy tails, high entropy).
//! 3. **Rate**: compare the residual bits-per-pixel proxy against the EMA
//!    of observed intra bpp, with hysteresis around the last decision.
//!
//! [`FrameDecisionEngine::decide`] is pure; all state changes happen in
//! [`FrameDecisionEngine::update`] once the actual compressed size is known,
//! which makes a decision stream trivial to replay from logged statistics.

use super::stats::{FrameMode, ResidualStats};

/// Decision thresholds and tuning
#[derive(Debug, Clone, Copy)]
pub struct DecisionConfig {
    /// Force a keyframe every N frames
    pub gop_period: u32,
    /// Minimum fraction of dead-zone residuals before forcing intra
    pub zero_mass_min: f64,
    /// Maximum mean absolute residual before forcing intra
    pub mean_abs_max: f64,
    /// P95 magnitude threshold
    pub p95_max: f64,
    /// P99 magnitude threshold
    pub p99_max: f64,
    /// Entropy threshold in bits
    pub entropy_max: f64,
    /// BPP slack added to the residual proxy before comparing
    pub margin_bpp: f64,
    /// BPP stickiness preventing mode flip-flop
    pub hysteresis_bpp: f64,
    /// EMA smoothing factor
    pub ema_alpha: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            gop_period: 60,
            zero_mass_min: 0.75,
            mean_abs_max: 12.0,
            p95_max: 30.0,
            p99_max: 100.0,
            entropy_max: 6.0,
            margin_bpp: 0.3,
            hysteresis_bpp: 0.15,
            ema_alpha: 0.1,
        }
    }
}

/// Stateful three-stage frame mode selector
#[derive(Debug, Clone)]
pub struct FrameDecisionEngine {
    config: DecisionConfig,
    ema_intra_bpp: Option<f64>,
    ema_residual_bpp: Option<f64>,
    frames_since_key: u32,
    last_mode: FrameMode,
}

impl FrameDecisionEngine {
    /// Create an engine with the given thresholds
    pub fn new(config: DecisionConfig) -> Self {
        FrameDecisionEngine {
            config,
            ema_intra_bpp: None,
            ema_residual_bpp: None,
            frames_since_key: 0,
            last_mode: FrameMode::Intra,
        }
    }

    /// Decide the encoding mode for the frame at `frame_index`
    ///
    /// Pure: state is only advanced by [`FrameDecisionEngine::update`].
    pub fn decide(&self, stats: &ResidualStats, frame_index: u32) -> FrameMode {
        if self.should_force_periodic(frame_index) {
            return FrameMode::Intra;
        }

        if self.should_force_heuristic(stats) {
            return FrameMode::Intra;
        }

        if self.should_use_intra_rate(stats) {
            return FrameMode::Intra;
        }

        FrameMode::Residual
    }

    /// Fold the observed compressed size into the engine state
    ///
    /// Updates the appropriate bits-per-pixel EMA, the `frames_since_key`
    /// counter, and the last emitted mode.
    pub fn update(&mut self, compressed_bytes: usize, width: u32, height: u32, was_keyframe: bool) {
        let pixels = f64::from(width) * f64::from(height);
        let bpp = (compressed_bytes as f64 * 8.0) / pixels;
        let alpha = self.config.ema_alpha;

        if was_keyframe {
            self.ema_intra_bpp = Some(match self.ema_intra_bpp {
                Some(prev) => alpha * bpp + (1.0 - alpha) * prev,
                None => bpp,
            });
            self.frames_since_key = 0;
            self.last_mode = FrameMode::Intra;
        } else {
            self.ema_residual_bpp = Some(match self.ema_residual_bpp {
                Some(prev) => alpha * bpp + (1.0 - alpha) * prev,
                None => bpp,
            });
            self.frames_since_key += 1;
            self.last_mode = FrameMode::Residual;
        }
    }

    /// Frames emitted since the last keyframe
    pub fn frames_since_key(&self) -> u32 {
        self.frames_since_key
    }

    /// The last emitted mode
    pub fn last_mode(&self) -> FrameMode {
        self.last_mode
    }

    /// EMA of observed intra bits-per-pixel, if any keyframe was seen
    pub fn ema_intra_bpp(&self) -> Option<f64> {
        self.ema_intra_bpp
    }

    /// EMA of observed residual bits-per-pixel, if any residual was seen
    pub fn ema_residual_bpp(&self) -> Option<f64> {
        self.ema_residual_bpp
    }

    fn should_force_periodic(&self, frame_index: u32) -> bool {
        self.frames_since_key >= self.config.gop_period
            || frame_index % self.config.gop_period == 0
    }

    fn should_force_heuristic(&self, stats: &ResidualStats) -> bool {
        stats.zero_mass < self.config.zero_mass_min
            || stats.mean_abs > self.config.mean_abs_max
            || stats.p95 > self.config.p95_max
            || stats.p99 > self.config.p99_max
            || stats.entropy_bits > self.config.entropy_max
    }

    fn should_use_intra_rate(&self, stats: &ResidualStats) -> bool {
        let Some(ema_intra) = self.ema_intra_bpp else {
            return false;
        };

        let threshold = match self.last_mode {
            FrameMode::Residual => ema_intra - self.config.hysteresis_bpp,
            FrameMode::Intra => ema_intra + self.config.hysteresis_bpp,
        };

        stats.bps_res + self.config.margin_bpp >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Statistics of a quiet, stationary residual frame
    fn quiet_stats() -> ResidualStats {
        ResidualStats {
            zero_mass: 0.99,
            mean_abs: 0.4,
            p95: 1.0,
            p99: 2.0,
            entropy_bits: 0.5,
            bps_res: 0.5,
        }
    }

    fn engine_with_gop(gop_period: u32) -> FrameDecisionEngine {
        FrameDecisionEngine::new(DecisionConfig {
            gop_period,
            ..DecisionConfig::default()
        })
    }

    #[test]
    fn test_gop_forcing_pattern() {
        // gop_period = 3 over a stationary 10-frame sequence: I R R I R R I R R I
        let mut engine = engine_with_gop(3);
        let stats = quiet_stats();
        let mut modes = Vec::new();

        for i in 0..10u32 {
            let mode = engine.decide(&stats, i);
            modes.push(mode);
            // Keyframes ~2 bpp, residuals ~0.5 bpp on a 4x2 frame
            let bytes = if mode.is_keyframe() { 2 } else { 1 };
            engine.update(bytes, 4, 2, mode.is_keyframe());
        }

        use FrameMode::{Intra as I, Residual as R};
        assert_eq!(modes, vec![I, R, R, I, R, R, I, R, R, I]);
    }

    #[test]
    fn test_periodic_invariant() {
        // Residual run length between keyframes stays below gop_period
        let mut engine = engine_with_gop(5);
        let stats = quiet_stats();
        let mut run = 0u32;

        for i in 0..100u32 {
            let mode = engine.decide(&stats, i);
            if mode.is_keyframe() {
                run = 0;
            } else {
                run += 1;
                assert!(run < 5);
            }
            engine.update(if mode.is_keyframe() { 50 } else { 2 }, 16, 16, mode.is_keyframe());
        }
    }

    #[test]
    fn test_heuristic_forcing_overrides_ema() {
        let mut engine = engine_with_gop(60);
        engine.update(100, 16, 16, true);
        engine.update(4, 16, 16, false);

        let mut stats = quiet_stats();
        stats.p99 = 200.0;
        assert_eq!(engine.decide(&stats, 5), FrameMode::Intra);
    }

    #[test]
    fn test_heuristic_thresholds_individually() {
        let engine = engine_with_gop(60);
        let base = quiet_stats();

        let cases = [
            ResidualStats { zero_mass: 0.5, ..base },
            ResidualStats { mean_abs: 20.0, ..base },
            ResidualStats { p95: 31.0, ..base },
            ResidualStats { p99: 101.0, ..base },
            ResidualStats { entropy_bits: 7.0, ..base },
        ];
        for stats in cases {
            assert_eq!(engine.decide(&stats, 5), FrameMode::Intra);
        }
        assert_eq!(engine.decide(&base, 5), FrameMode::Residual);
    }

    #[test]
    fn test_decision_monotonic_in_statistics() {
        // Raising any heuristic feature never flips intra back to residual
        let mut engine = engine_with_gop(60);
        engine.update(512, 16, 16, true);

        let mut stats = quiet_stats();
        stats.p95 = 31.0;
        assert_eq!(engine.decide(&stats, 5), FrameMode::Intra);

        stats.p99 = 500.0;
        stats.mean_abs = 100.0;
        stats.entropy_bits = 12.0;
        assert_eq!(engine.decide(&stats, 5), FrameMode::Intra);
    }

    #[test]
    fn test_rate_stage_defaults_to_residual_without_history() {
        let engine = engine_with_gop(60);
        let mut stats = quiet_stats();
        stats.bps_res = 50.0;
        // Heavy rate proxy, but no intra EMA yet and heuristics quiet
        stats.entropy_bits = 0.5;
        assert_eq!(engine.decide(&stats, 5), FrameMode::Residual);
    }

    #[test]
    fn test_rate_stage_with_hysteresis() {
        let mut engine = engine_with_gop(1000);
        // Intra EMA of 2.0 bpp on a 16x16 frame: 64 bytes
        engine.update(64, 16, 16, true);
        engine.update(8, 16, 16, false);
        assert_eq!(engine.last_mode(), FrameMode::Residual);

        // margin 0.3, hysteresis 0.15, last mode residual: threshold 1.85
        let mut stats = quiet_stats();
        stats.bps_res = 1.5;
        assert_eq!(engine.decide(&stats, 7), FrameMode::Residual);

        stats.bps_res = 1.6;
        assert_eq!(engine.decide(&stats, 7), FrameMode::Intra);
    }

    #[test]
    fn test_ema_updates() {
        let mut engine = engine_with_gop(60);
        assert_eq!(engine.ema_intra_bpp(), None);

        // First sample sets the EMA directly: 64 bytes on 16x16 = 2.0 bpp
        engine.update(64, 16, 16, true);
        assert_eq!(engine.ema_intra_bpp(), Some(2.0));
        assert_eq!(engine.frames_since_key(), 0);

        // Second sample blends with alpha = 0.1: 0.1*4.0 + 0.9*2.0 = 2.2
        engine.update(128, 16, 16, true);
        let ema = engine.ema_intra_bpp().unwrap();
        assert!((ema - 2.2).abs() < 1e-12);

        engine.update(8, 16, 16, false);
        assert_eq!(engine.frames_since_key(), 1);
        assert_eq!(engine.last_mode(), FrameMode::Residual);
        assert_eq!(engine.ema_residual_bpp(), Some(0.25));
    }
}
