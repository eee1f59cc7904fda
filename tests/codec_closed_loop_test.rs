//! Closed-loop codec integration tests
//!
//! Runs encoder and independent decoder over synthetic LWIR-like sequences
//! (fixed-pattern noise plus slow global drift and occasional scene events)
//! and verifies the encoder/decoder agreement invariant, the serialized
//! record round trip, and the end-to-end reconstruction error bound.

use std::io::Cursor;

use lwirc_lib::codec::{
    compute_residual, compute_residual_stats, CompressedFrame, Frame, FrameCodec,
    FrameDecisionEngine, FrameMode, QuantizationParams, RecordReader, RecordWriter,
};
use lwirc_lib::config::CompressionConfig;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

/// Deterministic fixed-pattern noise, stable across frames like real
/// per-pixel non-uniformity
fn fixed_pattern(seed: u32) -> Vec<u16> {
    let n = (WIDTH * HEIGHT) as usize;
    let mut state = seed.wrapping_mul(747796405).wrapping_add(2891336453);
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            20000 + (state >> 22) as u16
        })
        .collect()
}

/// Frame `index` of a drifting scene over the given pattern
fn scene_frame(pattern: &[u16], index: u32, global_offset: u16) -> Frame {
    Frame {
        data: pattern
            .iter()
            .map(|&v| v + index as u16 + global_offset)
            .collect(),
        width: WIDTH,
        height: HEIGHT,
        timestamp: u64::from(index),
        frame_index: index,
    }
}

#[test]
fn test_stream_agreement_lossless() {
    stream_agreement(0, 0);
}

#[test]
fn test_stream_agreement_near_lossless() {
    stream_agreement(1, 4);
}

/// Encode a sequence, serialize every record to bytes, parse them back, and
/// decode with an independent codec: the decoder output must equal the
/// encoder's reference frame at every step.
fn stream_agreement(keyframe_near: u32, residual_near: u32) {
    let pattern = fixed_pattern(17);
    let params = QuantizationParams::new(2, 2.0, 8);

    let mut encoder = FrameCodec::new();
    let mut stream = Vec::new();

    let mut writer = RecordWriter::new(Cursor::new(&mut stream));
    for index in 0..9u32 {
        // Scene change at frame 5: large global shift
        let offset = if index >= 5 { 3000 } else { 0 };
        let frame = scene_frame(&pattern, index, offset);

        let is_keyframe = index == 0 || index == 5 || index % 4 == 0;
        let record = encoder
            .encode_frame(&frame, is_keyframe, keyframe_near, residual_near, &params, true)
            .unwrap();
        writer.write_record(&record).unwrap();
    }
    writer.into_inner().unwrap();

    // Replay the byte stream through a fresh encoder and an independent
    // decoder, checking lockstep at every frame.
    let mut reference_encoder = FrameCodec::new();
    let mut decoder = FrameCodec::new();
    let mut reader = RecordReader::new(Cursor::new(&stream));

    for index in 0..9u32 {
        let record = reader.read_record().unwrap();
        assert_eq!(record.frame_index, index);

        let offset = if index >= 5 { 3000 } else { 0 };
        let frame = scene_frame(&pattern, index, offset);
        let is_keyframe = index == 0 || index == 5 || index % 4 == 0;
        let re_encoded = reference_encoder
            .encode_frame(&frame, is_keyframe, keyframe_near, residual_near, &params, true)
            .unwrap();
        assert_eq!(re_encoded, record, "record drift at frame {}", index);

        let decoded = decoder.decode_frame(&record).unwrap();
        assert_eq!(
            decoded.data,
            reference_encoder.reference().unwrap().data,
            "reference drift at frame {}",
            index
        );
    }
}

#[test]
fn test_reconstruction_error_bound_end_to_end() {
    // T=2, Q=2: residual error bounded by T + ceil(Q/2) = 3; keyframes by
    // the range-map round trip, which is tighter here.
    let pattern = fixed_pattern(3);
    let params = QuantizationParams::new(2, 2.0, 8);

    let mut encoder = FrameCodec::new();
    let mut decoder = FrameCodec::new();

    for index in 0..6u32 {
        let frame = scene_frame(&pattern, index, 0);
        let record = encoder
            .encode_frame(&frame, index == 0, 0, 0, &params, true)
            .unwrap();
        let decoded = decoder.decode_frame(&record).unwrap();

        for (&orig, &dec) in frame.data.iter().zip(decoded.data.iter()) {
            let err = (i32::from(orig) - i32::from(dec)).unsigned_abs();
            assert!(err <= 3, "frame {}: error {} exceeds bound", index, err);
        }
    }
}

#[test]
fn test_engine_and_codec_gop_pattern() {
    // Decision engine wired the way the pipeline drives it: stationary
    // fixed-pattern scene, gop_period 3, ten frames => I R R I R R I R R I.
    // Residual coding is lossless here; a lossy NEAR would shift the flat
    // zero-residual plane and trip the heuristics on the next frame.
    let pattern = fixed_pattern(29);
    let mut config = CompressionConfig::default();
    config.gop_period = 3;
    config.residual_near = 0;
    let params = QuantizationParams::new(config.dead_zone_t, config.quant_q, config.fp_bits);

    let mut engine = FrameDecisionEngine::new(config.decision_config());
    let mut encoder = FrameCodec::new();
    let mut modes = Vec::new();

    for index in 0..10u32 {
        let frame = scene_frame(&pattern, index, 0);

        let mode = match encoder.reference() {
            Some(reference) => {
                let residual = compute_residual(&frame.data, &reference.data);
                let stats = compute_residual_stats(&residual, config.dead_zone_t, None);
                engine.decide(&stats, index)
            }
            None => FrameMode::Intra,
        };
        modes.push(mode);

        let record = encoder
            .encode_frame(
                &frame,
                mode.is_keyframe(),
                config.keyframe_near,
                config.residual_near,
                &params,
                config.enable_12bit_mode,
            )
            .unwrap();
        engine.update(
            record.compressed_data.len(),
            record.width,
            record.height,
            record.is_keyframe,
        );
    }

    use FrameMode::{Intra as I, Residual as R};
    assert_eq!(modes, vec![I, R, R, I, R, R, I, R, R, I]);
}

#[test]
fn test_scene_change_forces_keyframe_through_heuristics() {
    // A flat-field style global shift blows past p99 and zero-mass
    // thresholds regardless of EMA state.
    let pattern = fixed_pattern(41);
    let config = CompressionConfig::default();

    let mut engine = FrameDecisionEngine::new(config.decision_config());
    let mut encoder = FrameCodec::new();
    let params = QuantizationParams::new(config.dead_zone_t, config.quant_q, config.fp_bits);

    let f0 = scene_frame(&pattern, 0, 0);
    let record = encoder.encode_frame(&f0, true, 0, 10, &params, true).unwrap();
    engine.update(record.compressed_data.len(), WIDTH, HEIGHT, true);

    let f1 = scene_frame(&pattern, 1, 0);
    let record = encoder.encode_frame(&f1, false, 0, 10, &params, true).unwrap();
    engine.update(record.compressed_data.len(), WIDTH, HEIGHT, false);

    // FFC-style event: +500 DN everywhere
    let f2 = scene_frame(&pattern, 2, 500);
    let residual = compute_residual(&f2.data, &encoder.reference().unwrap().data);
    let stats = compute_residual_stats(&residual, config.dead_zone_t, None);
    assert!(stats.p99 > config.decision_p99_threshold || stats.zero_mass < 0.75);
    assert_eq!(engine.decide(&stats, 2), FrameMode::Intra);
}

#[test]
fn test_decoder_rejects_record_for_wrong_state() {
    let pattern = fixed_pattern(5);
    let params = QuantizationParams::default();

    let mut encoder = FrameCodec::new();
    let f0 = scene_frame(&pattern, 0, 0);
    let f1 = scene_frame(&pattern, 1, 0);
    encoder.encode_frame(&f0, true, 0, 0, &params, false).unwrap();
    let residual_record = encoder
        .encode_frame(&f1, false, 0, 0, &params, false)
        .unwrap();

    // Residual before any keyframe
    let mut decoder = FrameCodec::new();
    assert!(decoder.decode_frame(&residual_record).is_err());

    // Tampered payload fails cleanly instead of desynchronizing
    let mut truncated = residual_record.clone();
    truncated.compressed_data.truncate(6);
    let mut decoder = FrameCodec::new();
    let keyframe_record = {
        let mut enc = FrameCodec::new();
        enc.encode_frame(&f0, true, 0, 0, &params, false).unwrap()
    };
    decoder.decode_frame(&keyframe_record).unwrap();
    assert!(decoder.decode_frame(&truncated).is_err());
}

#[test]
fn test_record_stream_preserves_quant_metadata() {
    let pattern = fixed_pattern(13);
    let params = QuantizationParams::new(4, 1.5, 10);

    let mut encoder = FrameCodec::new();
    let f0 = scene_frame(&pattern, 0, 0);
    let f1 = scene_frame(&pattern, 1, 0);
    encoder.encode_frame(&f0, true, 0, 0, &params, false).unwrap();
    let record: CompressedFrame = encoder.encode_residual(&f1, 2, &params).unwrap();

    assert_eq!(record.dead_zone_t, 4);
    assert_eq!(record.fp_bits, 10);
    assert_eq!(record.quant_q, params.quant_q());
    assert_eq!(record.near_lossless, 2);
}
