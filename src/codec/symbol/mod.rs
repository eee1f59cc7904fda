//! Symbol codec adapter
//!
//! The frame codec is written against the [`SymbolCodec`] trait: an abstract
//! near-lossless coder for unsigned sample planes with a single tunable
//! parameter (`NEAR`). The shipped implementation is the predictive coder in
//! [`coder`]; swapping in another JPEG-LS backend only requires implementing
//! the trait.
//!
//! The adapter owns the output sizing discipline: it requests a buffer of
//! the estimated codestream size plus a 10% + 1 KiB safety margin and the
//! result is truncated to the bytes actually written.

pub mod bitio;
pub mod coder;

use crate::error::{Error, Result};

pub use coder::HEADER_SIZE;

/// Abstract near-lossless symbol codec over unsigned sample planes
pub trait SymbolCodec {
    /// Encode a plane at 12 or 16 bits per sample
    ///
    /// `near` is forwarded verbatim: 0 is lossless, `k` bounds the
    /// per-sample reconstruction error by `+/-k`.
    fn encode(
        &self,
        samples: &[u16],
        width: u32,
        height: u32,
        bits_per_sample: u8,
        near: u32,
    ) -> Result<Vec<u8>>;

    /// Decode a plane, validating embedded dimensions against expectations
    ///
    /// Returns the reconstructed samples and the embedded bit depth.
    /// Fails with [`Error::HeaderMismatch`] if the codestream disagrees
    /// with `expected_width`/`expected_height`.
    fn decode(&self, bytes: &[u8], expected_width: u32, expected_height: u32)
        -> Result<(Vec<u16>, u8)>;
}

/// The built-in predictive near-lossless codec
#[derive(Debug, Clone, Copy, Default)]
pub struct NearLosslessCodec;

impl SymbolCodec for NearLosslessCodec {
    fn encode(
        &self,
        samples: &[u16],
        width: u32,
        height: u32,
        bits_per_sample: u8,
        near: u32,
    ) -> Result<Vec<u8>> {
        if bits_per_sample != 12 && bits_per_sample != 16 {
            return Err(Error::codec(format!(
                "bits per sample must be 12 or 16, got {}",
                bits_per_sample
            )));
        }

        let estimated = HEADER_SIZE + samples.len() * 2;
        let capacity = estimated + estimated / 10 + 1024;
        coder::encode_plane(samples, width, height, bits_per_sample, near, capacity)
    }

    fn decode(
        &self,
        bytes: &[u8],
        expected_width: u32,
        expected_height: u32,
    ) -> Result<(Vec<u16>, u8)> {
        let (samples, width, height, bits_per_sample, _near) = coder::decode_plane(bytes)?;

        if width != expected_width
            || height != expected_height
            || (bits_per_sample != 12 && bits_per_sample != 16)
        {
            return Err(Error::HeaderMismatch {
                expected_width,
                expected_height,
                actual_width: width,
                actual_height: height,
                bits_per_sample,
            });
        }

        Ok((samples, bits_per_sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_round_trip() {
        let codec = NearLosslessCodec;
        let samples: Vec<u16> = (0u16..64).map(|i| 20000 + (i * 37) % 512).collect();

        let bytes = codec.encode(&samples, 8, 8, 16, 0).unwrap();
        let (decoded, bits) = codec.decode(&bytes, 8, 8).unwrap();

        assert_eq!(bits, 16);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_adapter_rejects_unsupported_depth() {
        let codec = NearLosslessCodec;
        let samples = vec![0u16; 4];
        assert!(codec.encode(&samples, 2, 2, 8, 0).is_err());
        assert!(codec.encode(&samples, 2, 2, 14, 0).is_err());
    }

    #[test]
    fn test_adapter_header_mismatch() {
        let codec = NearLosslessCodec;
        let samples = vec![100u16; 16];
        let bytes = codec.encode(&samples, 4, 4, 16, 0).unwrap();

        let result = codec.decode(&bytes, 8, 2);
        assert!(matches!(
            result,
            Err(Error::HeaderMismatch {
                expected_width: 8,
                expected_height: 2,
                actual_width: 4,
                actual_height: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_adapter_near_forwarded() {
        let codec = NearLosslessCodec;
        let samples: Vec<u16> = (0u16..256).map(|i| (i * 97) % 4096).collect();

        let bytes = codec.encode(&samples, 16, 16, 12, 2).unwrap();
        let (decoded, bits) = codec.decode(&bytes, 16, 16).unwrap();

        assert_eq!(bits, 12);
        for (&orig, &dec) in samples.iter().zip(decoded.iter()) {
            assert!((i32::from(orig) - i32::from(dec)).unsigned_abs() <= 2);
        }
    }
}
