//! lwirc CLI - temporal compression for LWIR thermal imagery
//!
//! Usage:
//!   lwirc --config example_config.yaml [--profile high_quality]
//!   lwirc --input frames/ --output compressed/ [--gop 60] [...]
//!
//! Exit codes: 0 on success, 1 on configuration or IO failure, 130 when
//! interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;

use lwirc_lib::config::CompressionConfig;
use lwirc_lib::error::Error;
use lwirc_lib::pipeline::CompressionPipeline;

/// Exit code emitted after an interrupt, matching shell convention
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "lwirc")]
#[command(about = "LWIR temporal compression - residual coding over a near-lossless entropy coder")]
#[command(version)]
struct Cli {
    /// Load configuration from a YAML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use a specific profile from the config file
    #[arg(long)]
    profile: Option<String>,

    /// Input directory containing 16-bit grayscale PNG frames
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory for compressed frames
    #[arg(long)]
    output: Option<PathBuf>,

    /// GOP period (frames between forced keyframes)
    #[arg(long)]
    gop: Option<u32>,

    /// NEAR parameter for keyframes (0 = lossless)
    #[arg(long = "keyframe-near")]
    keyframe_near: Option<u32>,

    /// NEAR parameter for residual frames
    #[arg(long = "residual-near")]
    residual_near: Option<u32>,

    /// Quantization step Q
    #[arg(long = "quant-q")]
    quant_q: Option<f64>,

    /// Dead-zone threshold T
    #[arg(long = "dead-zone")]
    dead_zone: Option<u32>,

    /// Fixed-point fractional bits
    #[arg(long = "fp-bits")]
    fp_bits: Option<u32>,

    /// Enable info-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug-level logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    /// Resolve the effective configuration from file and flag overrides
    fn build_config(&self) -> Result<CompressionConfig, Error> {
        if self.config.is_none() && (self.input.is_none() || self.output.is_none()) {
            return Err(Error::config(
                "specify either --config or both --input and --output",
            ));
        }

        let mut config = match &self.config {
            Some(path) => CompressionConfig::load_from_yaml(path, self.profile.as_deref())?,
            None => CompressionConfig::default(),
        };

        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(gop) = self.gop {
            config.gop_period = gop;
        }
        if let Some(near) = self.keyframe_near {
            config.keyframe_near = near;
        }
        if let Some(near) = self.residual_near {
            config.residual_near = near;
        }
        if let Some(q) = self.quant_q {
            config.quant_q = q;
        }
        if let Some(t) = self.dead_zone {
            config.dead_zone_t = t;
        }
        if let Some(fp) = self.fp_bits {
            config.fp_bits = fp;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    lwirc_lib::init(lwirc_lib::Config {
        verbose: cli.verbose,
        debug: cli.debug,
    });

    let config = match cli.build_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(1);
        }
    };

    println!("LWIR compression: {} -> {}", config.input_dir.display(), config.output_dir.display());
    println!(
        "  GOP {} | keyframe NEAR {} | residual NEAR {} | Q {} T {} fp {}",
        config.gop_period,
        config.keyframe_near,
        config.residual_near,
        config.quant_q,
        config.dead_zone_t,
        config.fp_bits
    );

    let mut pipeline = CompressionPipeline::new(config);

    let interrupted = pipeline.interrupt_flag();
    if let Err(err) = ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Error: failed to install interrupt handler: {}", err);
        return ExitCode::from(1);
    }

    match pipeline.run() {
        Ok(stats) => {
            println!();
            println!("Frames processed: {}", stats.total_frames);
            println!(
                "  {} keyframes, {} residual frames",
                stats.keyframes, stats.residual_frames
            );
            println!(
                "Compressed {:.2} MB -> {:.2} MB ({:.2}x)",
                stats.total_original_bytes as f64 / (1024.0 * 1024.0),
                stats.total_compressed_bytes as f64 / (1024.0 * 1024.0),
                stats.overall_compression_ratio
            );
            println!(
                "Average encode time: {:.2} ms/frame ({:.1} fps)",
                stats.avg_encode_time_ms,
                if stats.avg_encode_time_ms > 0.0 {
                    1000.0 / stats.avg_encode_time_ms
                } else {
                    0.0
                }
            );
            ExitCode::SUCCESS
        }
        Err(Error::Interrupted) => {
            println!("Compression interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            error!("compression pipeline failed: {}", err);
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        }
    }
}
