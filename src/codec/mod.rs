//! Temporal codec for LWIR frame sequences
//!
//! The codec encodes each 16-bit frame either as a self-contained keyframe
//! (intra) or as a quantized temporal difference against the previously
//! reconstructed frame (residual), then hands the resulting symbol plane to
//! a near-lossless entropy coder.
//!
//! ```text
//! Encode:
//!   raw frame -> decision engine -> frame codec -> range mapper (intra only)
//!             -> symbol codec -> closed-loop decode -> reference update
//!             -> record writer
//!
//! Decode:
//!   record reader -> symbol codec -> dequantize / inverse map
//!                 -> reference update -> output frame
//! ```
//!
//! The load-bearing discipline is *closed-loop* reference maintenance: both
//! the encoder and the decoder replace their reference only with the decoded
//! output of the emitted codestream, so the two stay in lockstep even when
//! the symbol coder is lossy (`NEAR > 0`).
//!
//! Everything here is single-threaded and synchronous; a [`FrameCodec`]
//! instance mutates its reference on every successful operation and must see
//! frames in strict order. Parallelism across independent sequences is the
//! caller's business.

pub mod bitstream;
pub mod decision;
pub mod encoder;
pub mod frame;
pub mod range_map;
pub mod residual;
pub mod stats;
pub mod symbol;

pub use bitstream::{RecordReader, RecordWriter, RECORD_HEADER_SIZE};
pub use decision::{DecisionConfig, FrameDecisionEngine};
pub use encoder::FrameCodec;
pub use frame::{CompressedFrame, Frame};
pub use range_map::{compute_range_map, map_from_12bit, map_to_12bit, RangeMap};
pub use residual::{
    bias_residual, compute_error_stats, compute_residual, dequantize_residual, quantize_residual,
    reconstruct_frame, unbias_residual, ErrorStats, QuantizationParams, RESIDUAL_BIAS,
};
pub use stats::{
    compute_residual_stats, FrameMode, FrameStats, ResidualHistogram, ResidualStats, SessionStats,
    NUM_BINS,
};
pub use symbol::{NearLosslessCodec, SymbolCodec};
