//! Frame types for LWIR sequences
//!
//! A [`Frame`] is a dense 16-bit single-channel raster in row-major order,
//! typically 640x512 for LWIR sensors. A [`CompressedFrame`] is the in-memory
//! record emitted by the frame codec; its serialized byte layout lives in
//! [`crate::codec::bitstream`].

/// A single LWIR frame with metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// 16-bit grayscale pixel data, row-major
    pub data: Vec<u16>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Opaque timestamp (microseconds or frame number)
    pub timestamp: u64,
    /// Monotonic frame index within the sequence
    pub frame_index: u32,
}

impl Frame {
    /// Create a zero-filled frame with the given dimensions
    pub fn new(width: u32, height: u32, frame_index: u32, timestamp: u64) -> Self {
        Frame {
            data: vec![0; (width as usize) * (height as usize)],
            width,
            height,
            timestamp,
            frame_index,
        }
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check the `len(data) == width * height` invariant
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.pixel_count()
    }
}

/// Compressed frame record with the metadata a decoder needs
///
/// Owned by the caller after emission. `quant_q` carries the quantization step
/// reconstructed from its fixed-point representation (`Q_fx / 2^fp`), never
/// the configured double, so that encoder and decoder derive identical
/// integer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedFrame {
    /// Opaque symbol-codec bytes
    pub compressed_data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Monotonic frame index
    pub frame_index: u32,
    /// Opaque timestamp
    pub timestamp: u64,
    /// True for intra (keyframe) records
    pub is_keyframe: bool,

    /// NEAR parameter the symbol codec was invoked with
    pub near_lossless: u32,
    /// Quantization step, `Q_fx / 2^fp` (0.0 on intra records)
    pub quant_q: f64,
    /// Dead-zone threshold (0 on intra records)
    pub dead_zone_t: u32,
    /// Fixed-point fractional bits (0 on intra records)
    pub fp_bits: u32,

    /// Whether the 16-to-12-bit range map was applied (intra only)
    pub use_range_map: bool,
    /// Minimum sample value of the mapped range
    pub range_min: u16,
    /// Maximum sample value of the mapped range
    pub range_max: u16,
}

impl Default for CompressedFrame {
    fn default() -> Self {
        CompressedFrame {
            compressed_data: Vec::new(),
            width: 0,
            height: 0,
            frame_index: 0,
            timestamp: 0,
            is_keyframe: false,
            near_lossless: 0,
            quant_q: 0.0,
            dead_zone_t: 0,
            fp_bits: 0,
            use_range_map: false,
            range_min: 0,
            range_max: 65535,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validity() {
        let frame = Frame::new(4, 2, 0, 0);
        assert_eq!(frame.pixel_count(), 8);
        assert!(frame.is_valid());

        let mut truncated = frame.clone();
        truncated.data.pop();
        assert!(!truncated.is_valid());

        let empty = Frame::default();
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_compressed_frame_defaults() {
        let record = CompressedFrame::default();
        assert!(!record.is_keyframe);
        assert!(!record.use_range_map);
        assert_eq!(record.range_max, 65535);
        assert_eq!(record.quant_q, 0.0);
    }
}
