//! lwirc - temporal compression for LWIR thermal image sequences
//!
//! Frames are 16-bit single-channel rasters with strong inter-frame
//! correlation. Each frame is encoded either as a self-contained keyframe or
//! as a quantized temporal difference against the previously reconstructed
//! frame, and the resulting symbol plane goes through a near-lossless
//! entropy coder.
//!
//! # Architecture
//!
//! - `codec`: the temporal codec core - residual arithmetic, range mapping,
//!   the closed-loop frame codec, the decision engine, the symbol codec
//!   adapter, and the compressed record format
//! - `config`: YAML configuration with profile support
//! - `pipeline`: directory-to-directory compression workflow
//! - `error`: common error and result types

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;

pub use error::{Error, Result};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logging configuration for [`init`]
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable info-level logging
    pub verbose: bool,
    /// Enable debug-level logging
    pub debug: bool,
}

/// Initialize library logging
///
/// Installs a `tracing` subscriber when verbose or debug output is
/// requested; quiet by default.
pub fn init(config: Config) {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt().with_env_filter(level).init();
    }
}
