//! Closed-loop frame codec
//!
//! Orchestrates the intra and residual coding paths and owns the reference
//! frame. Both encoding and decoding maintain the reference exclusively
//! through the decoded output of the emitted codestream, so an encoder and
//! an independent decoder fed the same records hold byte-identical reference
//! state at every step, even under near-lossless symbol coding.
//!
//! Any failure on the closed-loop path aborts the current frame without
//! touching the reference; continuing would desynchronize encoder and
//! decoder and poison every subsequent residual.

use tracing::debug;

use super::frame::{CompressedFrame, Frame};
use super::range_map::{compute_range_map, map_from_12bit, map_to_12bit, RangeMap};
use super::residual::{
    bias_residual, compute_residual, dequantize_residual, quantize_residual, reconstruct_frame,
    unbias_residual, QuantizationParams,
};
use super::symbol::{NearLosslessCodec, SymbolCodec};
use crate::error::{Error, Result};

/// Frame encoder/decoder with closed-loop reference maintenance
///
/// A single instance serves one direction of one frame sequence: it mutates
/// its reference on every successful operation and must observe strict frame
/// ordering. Use separate instances for encoding and decoding.
pub struct FrameCodec<C: SymbolCodec = NearLosslessCodec> {
    symbol_codec: C,
    reference: Option<Frame>,
}

impl FrameCodec<NearLosslessCodec> {
    /// Create a codec backed by the built-in symbol coder
    pub fn new() -> Self {
        FrameCodec::with_symbol_codec(NearLosslessCodec)
    }
}

impl Default for FrameCodec<NearLosslessCodec> {
    fn default() -> Self {
        FrameCodec::new()
    }
}

impl<C: SymbolCodec> FrameCodec<C> {
    /// Create a codec over a caller-supplied symbol coder
    pub fn with_symbol_codec(symbol_codec: C) -> Self {
        FrameCodec {
            symbol_codec,
            reference: None,
        }
    }

    /// The most recent reconstructed frame, if any
    ///
    /// This is exactly what a decoder of the emitted stream would hold;
    /// callers may read it but reference state is only ever replaced through
    /// the closed-loop paths.
    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Clear the reference frame
    ///
    /// A residual record encountered after a reset fails with
    /// [`Error::NoReference`].
    pub fn reset(&mut self) {
        self.reference = None;
    }

    /// Encode a frame in the requested mode
    pub fn encode_frame(
        &mut self,
        frame: &Frame,
        is_keyframe: bool,
        keyframe_near: u32,
        residual_near: u32,
        quant_params: &QuantizationParams,
        enable_12bit_mode: bool,
    ) -> Result<CompressedFrame> {
        if is_keyframe {
            self.encode_intra(frame, keyframe_near, enable_12bit_mode)
        } else {
            self.encode_residual(frame, residual_near, quant_params)
        }
    }

    /// Encode a self-contained keyframe
    ///
    /// When `enable_12bit_mode` is set and the frame's value range is narrow
    /// enough to be beneficial, samples are range-mapped into 12 bits before
    /// symbol coding. The reference is refreshed from a decode of the emitted
    /// bytes even at NEAR=0, so it is literally the decoder's reconstruction.
    pub fn encode_intra(
        &mut self,
        frame: &Frame,
        near_lossless: u32,
        enable_12bit_mode: bool,
    ) -> Result<CompressedFrame> {
        if !frame.is_valid() {
            return Err(Error::codec("frame buffer does not match its dimensions"));
        }

        let mut output = CompressedFrame {
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            is_keyframe: true,
            near_lossless,
            ..CompressedFrame::default()
        };

        let mut mapped_data = None;
        if enable_12bit_mode {
            let range_map = compute_range_map(&frame.data);
            if range_map.is_beneficial() {
                mapped_data = Some(map_to_12bit(&frame.data, &range_map));
                output.use_range_map = true;
                output.range_min = range_map.min_value;
                output.range_max = range_map.max_value;
                debug!(
                    frame_index = frame.frame_index,
                    range_min = range_map.min_value,
                    range_max = range_map.max_value,
                    "range-mapping intra frame to 12 bits"
                );
            }
        }

        let (data_to_encode, bits_per_sample): (&[u16], u8) = match &mapped_data {
            Some(mapped) => (mapped, 12),
            None => (&frame.data, 16),
        };

        output.compressed_data = self.symbol_codec.encode(
            data_to_encode,
            frame.width,
            frame.height,
            bits_per_sample,
            near_lossless,
        )?;

        // Closed-loop refresh: the reference must be the decoder's view.
        let (decoded, decoded_bits) =
            self.symbol_codec
                .decode(&output.compressed_data, frame.width, frame.height)?;
        if decoded_bits != bits_per_sample {
            return Err(Error::codec(format!(
                "closed-loop decode returned {} bits, expected {}",
                decoded_bits, bits_per_sample
            )));
        }

        let reference_data = if output.use_range_map {
            let range_map = RangeMap::new(output.range_min, output.range_max);
            map_from_12bit(&decoded, &range_map)
        } else {
            decoded
        };

        self.reference = Some(Frame {
            data: reference_data,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
        });

        Ok(output)
    }

    /// Encode a frame as a quantized temporal difference against the reference
    pub fn encode_residual(
        &mut self,
        frame: &Frame,
        near_lossless: u32,
        quant_params: &QuantizationParams,
    ) -> Result<CompressedFrame> {
        if !frame.is_valid() {
            return Err(Error::codec("frame buffer does not match its dimensions"));
        }
        let reference = self.reference.as_ref().ok_or(Error::NoReference)?;
        if frame.width != reference.width || frame.height != reference.height {
            return Err(Error::DimensionMismatch {
                actual_width: frame.width,
                actual_height: frame.height,
                expected_width: reference.width,
                expected_height: reference.height,
            });
        }

        let residual = compute_residual(&frame.data, &reference.data);
        let quantized = quantize_residual(&residual, quant_params)?;
        let biased = bias_residual(&quantized);

        let mut output = CompressedFrame {
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            is_keyframe: false,
            near_lossless,
            quant_q: quant_params.quant_q(),
            dead_zone_t: quant_params.dead_zone_t,
            fp_bits: quant_params.fp_bits,
            ..CompressedFrame::default()
        };

        output.compressed_data = self.symbol_codec.encode(
            &biased,
            frame.width,
            frame.height,
            16,
            near_lossless,
        )?;

        // Closed-loop reconstruction through the full decode path. At NEAR=0
        // this is equivalent to dequantizing `quantized` directly, but the
        // decode keeps the invariant literal rather than assumed.
        let (decoded_unsigned, decoded_bits) =
            self.symbol_codec
                .decode(&output.compressed_data, frame.width, frame.height)?;
        if decoded_bits != 16 {
            return Err(Error::codec(format!(
                "closed-loop decode returned {} bits, expected 16",
                decoded_bits
            )));
        }

        let decoded_quantized = unbias_residual(&decoded_unsigned);
        let reconstructed_residual = dequantize_residual(&decoded_quantized, quant_params);
        let reconstructed = reconstruct_frame(&reference.data, &reconstructed_residual);

        self.reference = Some(Frame {
            data: reconstructed,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
        });

        Ok(output)
    }

    /// Decode one compressed record, mirroring the encode paths
    pub fn decode_frame(&mut self, compressed: &CompressedFrame) -> Result<Frame> {
        if compressed.is_keyframe {
            self.decode_intra(compressed)
        } else {
            self.decode_residual(compressed)
        }
    }

    fn decode_intra(&mut self, compressed: &CompressedFrame) -> Result<Frame> {
        let (decoded, _bits) = self.symbol_codec.decode(
            &compressed.compressed_data,
            compressed.width,
            compressed.height,
        )?;

        let data = if compressed.use_range_map {
            let range_map = RangeMap::new(compressed.range_min, compressed.range_max);
            map_from_12bit(&decoded, &range_map)
        } else {
            decoded
        };

        let frame = Frame {
            data,
            width: compressed.width,
            height: compressed.height,
            timestamp: compressed.timestamp,
            frame_index: compressed.frame_index,
        };
        self.reference = Some(frame.clone());
        Ok(frame)
    }

    fn decode_residual(&mut self, compressed: &CompressedFrame) -> Result<Frame> {
        let reference = self.reference.as_ref().ok_or(Error::NoReference)?;
        if compressed.width != reference.width || compressed.height != reference.height {
            return Err(Error::DimensionMismatch {
                actual_width: compressed.width,
                actual_height: compressed.height,
                expected_width: reference.width,
                expected_height: reference.height,
            });
        }

        let (decoded_unsigned, _bits) = self.symbol_codec.decode(
            &compressed.compressed_data,
            compressed.width,
            compressed.height,
        )?;

        // Quantization parameters come from the record's fixed-point value,
        // never from re-parsing a configured double.
        let quant_params = QuantizationParams::new(
            compressed.dead_zone_t,
            compressed.quant_q,
            compressed.fp_bits,
        );

        let decoded_quantized = unbias_residual(&decoded_unsigned);
        let reconstructed_residual = dequantize_residual(&decoded_quantized, &quant_params);
        let data = reconstruct_frame(&reference.data, &reconstructed_residual);

        let frame = Frame {
            data,
            width: compressed.width,
            height: compressed.height,
            timestamp: compressed.timestamp,
            frame_index: compressed.frame_index,
        };
        self.reference = Some(frame.clone());
        Ok(frame)
    }
}
