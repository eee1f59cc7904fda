//! Compression pipeline orchestration
//!
//! Drives the complete workflow: scan the input directory for 16-bit
//! grayscale PNG frames, consult the decision engine, encode through the
//! closed-loop frame codec, write one record file per frame, and account
//! statistics. A summary JSON (and optionally a per-frame CSV and decoded
//! validation PNGs) lands in the output directory.
//!
//! The pipeline always computes real residual statistics against the
//! codec's current reference before consulting the decision engine; frames
//! whose dimensions differ from the reference force a keyframe instead.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{
    compute_error_stats, compute_residual, compute_residual_stats, CompressedFrame, Frame,
    FrameCodec, FrameDecisionEngine, FrameMode, FrameStats, QuantizationParams, RecordWriter,
    ResidualStats, SessionStats,
};
use crate::config::CompressionConfig;
use crate::error::{Error, Result};

/// Effective parameters echoed into the summary JSON
#[derive(Debug, Serialize)]
struct ConfigEcho {
    gop_period: u32,
    keyframe_near: u32,
    residual_near: u32,
    #[serde(rename = "quant_Q")]
    quant_q: f64,
    #[serde(rename = "dead_zone_T")]
    dead_zone_t: u32,
    fp_bits: u32,
    enable_12bit_mode: bool,
}

/// Session summary written to `compression_stats.json`
#[derive(Debug, Serialize)]
struct SessionSummary {
    frames_processed: u32,
    keyframes: u32,
    residual_frames: u32,
    total_original_bytes: u64,
    total_compressed_bytes: u64,
    compression_ratio: f64,
    avg_encode_time_ms: f64,
    throughput_fps: f64,
    avg_max_error: f64,
    avg_rmse: f64,
    config: ConfigEcho,
}

/// End-to-end compression pipeline
pub struct CompressionPipeline {
    config: CompressionConfig,
    interrupted: Arc<AtomicBool>,
    session: SessionStats,
}

impl CompressionPipeline {
    /// Create a pipeline over a validated configuration
    pub fn new(config: CompressionConfig) -> Self {
        CompressionPipeline {
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
            session: SessionStats::default(),
        }
    }

    /// Flag checked between frames; wire this into a signal handler
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Session statistics accumulated so far
    pub fn session_stats(&self) -> &SessionStats {
        &self.session
    }

    /// Compress every PNG frame in the input directory
    ///
    /// Returns the finalized session statistics. An interrupt finishes the
    /// in-progress frame, writes the summary, and surfaces as
    /// [`Error::Interrupted`].
    pub fn run(&mut self) -> Result<SessionStats> {
        let input_files = scan_input_dir(&self.config.input_dir)?;
        info!(
            count = input_files.len(),
            input = %self.config.input_dir.display(),
            "found input frames"
        );

        fs::create_dir_all(&self.config.output_dir)?;
        let decoded_dir = self.config.output_dir.join("decoded");
        if self.config.write_decoded_frames {
            fs::create_dir_all(&decoded_dir)?;
        }

        let mut csv = if self.config.write_frame_stats {
            let mut file = BufWriter::new(File::create(
                self.config.output_dir.join("frame_stats.csv"),
            )?);
            writeln!(file, "{}", FrameStats::csv_header())?;
            Some(file)
        } else {
            None
        };

        let quant_params = QuantizationParams::new(
            self.config.dead_zone_t,
            self.config.quant_q,
            self.config.fp_bits,
        );
        let mut engine = FrameDecisionEngine::new(self.config.decision_config());
        let mut encoder = FrameCodec::new();
        let mut validator = self.config.write_decoded_frames.then(FrameCodec::new);

        for (index, path) in input_files.iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("interrupt received, stopping after {} frames", index);
                self.finish()?;
                return Err(Error::Interrupted);
            }

            let frame = load_frame_from_png(path, index as u32)?;
            let original_bytes = (frame.pixel_count() * 2) as u64;

            let residual_stats = decision_stats(&encoder, &frame, self.config.dead_zone_t);
            let mode = match residual_stats {
                Some(stats) => engine.decide(&stats, frame.frame_index),
                None => FrameMode::Intra,
            };

            let encode_start = Instant::now();
            let record = encoder.encode_frame(
                &frame,
                mode.is_keyframe(),
                self.config.keyframe_near,
                self.config.residual_near,
                &quant_params,
                self.config.enable_12bit_mode,
            )?;
            let encode_time_ms = encode_start.elapsed().as_secs_f64() * 1000.0;

            let reference = encoder
                .reference()
                .ok_or_else(|| Error::codec("reference missing after successful encode"))?;
            let error_stats = compute_error_stats(&frame.data, &reference.data);

            write_record_file(&record, &self.config.output_dir)?;
            engine.update(
                record.compressed_data.len(),
                record.width,
                record.height,
                record.is_keyframe,
            );

            let compressed_bytes = record.compressed_data.len() as u64;
            let stats_row = FrameStats {
                frame_index: frame.frame_index,
                is_keyframe: record.is_keyframe,
                residual_mean_abs: residual_stats.map_or(0.0, |s| s.mean_abs),
                residual_p95: residual_stats.map_or(0.0, |s| s.p95),
                residual_p99: residual_stats.map_or(0.0, |s| s.p99),
                residual_entropy: residual_stats.map_or(0.0, |s| s.entropy_bits),
                original_bytes,
                compressed_bytes,
                compression_ratio: original_bytes as f64 / compressed_bytes.max(1) as f64,
                encode_time_ms,
                max_error: error_stats.max_error,
                mean_error: error_stats.mean_error,
                rmse: error_stats.rmse,
            };
            self.session.add_frame(&stats_row);

            if let Some(file) = csv.as_mut() {
                writeln!(file, "{}", stats_row.to_csv())?;
            }

            if let Some(decoder) = validator.as_mut() {
                let decoded = decoder.decode_frame(&record)?;
                write_decoded_png(&decoded, &decoded_dir)?;
            }

            info!(
                frame = frame.frame_index,
                mode = mode.name(),
                bytes = compressed_bytes,
                ratio = stats_row.compression_ratio,
                ms = encode_time_ms,
                "encoded frame"
            );
        }

        self.finish()?;
        Ok(self.session.clone())
    }

    /// Finalize counters and write the summary JSON
    fn finish(&mut self) -> Result<()> {
        self.session.finalize();
        let summary_path = self.config.output_dir.join("compression_stats.json");
        let summary = self.build_summary();
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| Error::config(format!("failed to serialize summary: {}", e)))?;
        fs::write(&summary_path, json)?;
        info!(path = %summary_path.display(), "wrote session summary");
        Ok(())
    }

    fn build_summary(&self) -> SessionSummary {
        let stats = &self.session;
        let throughput_fps = if stats.avg_encode_time_ms > 0.0 {
            1000.0 / stats.avg_encode_time_ms
        } else {
            0.0
        };

        SessionSummary {
            frames_processed: stats.total_frames,
            keyframes: stats.keyframes,
            residual_frames: stats.residual_frames,
            total_original_bytes: stats.total_original_bytes,
            total_compressed_bytes: stats.total_compressed_bytes,
            compression_ratio: stats.overall_compression_ratio,
            avg_encode_time_ms: stats.avg_encode_time_ms,
            throughput_fps,
            avg_max_error: stats.avg_max_error,
            avg_rmse: stats.avg_rmse,
            config: ConfigEcho {
                gop_period: self.config.gop_period,
                keyframe_near: self.config.keyframe_near,
                residual_near: self.config.residual_near,
                quant_q: self.config.quant_q,
                dead_zone_t: self.config.dead_zone_t,
                fp_bits: self.config.fp_bits,
                enable_12bit_mode: self.config.enable_12bit_mode,
            },
        }
    }
}

/// Residual statistics against the encoder's current reference, when usable
fn decision_stats(
    encoder: &FrameCodec,
    frame: &Frame,
    dead_zone_t: u32,
) -> Option<ResidualStats> {
    let reference = encoder.reference()?;
    if reference.width != frame.width || reference.height != frame.height {
        return None;
    }
    let residual = compute_residual(&frame.data, &reference.data);
    Some(compute_residual_stats(&residual, dead_zone_t, None))
}

/// Collect and sort the PNG frame paths of a directory
fn scan_input_dir(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir).map_err(|e| {
        Error::config(format!(
            "failed to open input directory {}: {}",
            input_dir.display(),
            e
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Error::config(format!(
            "no PNG files found in {}",
            input_dir.display()
        )));
    }
    Ok(files)
}

/// Load a 16-bit grayscale PNG as a frame
fn load_frame_from_png(path: &Path, frame_index: u32) -> Result<Frame> {
    let img = image::open(path).map_err(|e| {
        Error::decode(frame_index, format!("{}: {}", path.display(), e))
    })?;

    match img {
        DynamicImage::ImageLuma16(buffer) => {
            let width = buffer.width();
            let height = buffer.height();
            Ok(Frame {
                data: buffer.into_raw(),
                width,
                height,
                timestamp: u64::from(frame_index),
                frame_index,
            })
        }
        other => Err(Error::decode(
            frame_index,
            format!(
                "{} must be 16-bit grayscale, got {:?}",
                path.display(),
                other.color()
            ),
        )),
    }
}

/// Write one compressed record as `frame_NNNNNN.lwir`
fn write_record_file(record: &CompressedFrame, output_dir: &Path) -> Result<()> {
    let path = output_dir.join(format!("frame_{:06}.lwir", record.frame_index));
    let file = BufWriter::new(File::create(&path)?);
    let mut writer = RecordWriter::new(file);
    writer.write_record(record)?;
    writer.into_inner()?;
    debug!(path = %path.display(), "wrote compressed record");
    Ok(())
}

/// Write a decoded frame as a 16-bit grayscale PNG
fn write_decoded_png(frame: &Frame, decoded_dir: &Path) -> Result<()> {
    let path = decoded_dir.join(format!("frame_{:06}.png", frame.frame_index));
    let buffer =
        image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
            frame.width,
            frame.height,
            frame.data.clone(),
        )
        .ok_or_else(|| Error::codec("decoded frame buffer does not match its dimensions"))?;
    buffer
        .save(&path)
        .map_err(|e| Error::decode(frame.frame_index, format!("PNG write failed: {}", e)))?;
    Ok(())
}
