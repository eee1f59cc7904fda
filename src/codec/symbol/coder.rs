//! Predictive near-lossless plane coder
//!
//! Single-component grayscale coder in the JPEG-LS mold: a median edge
//! detector predicts each sample from its reconstructed causal neighbours,
//! the prediction error is quantized by `2*NEAR + 1`, and the quantized
//! errors are entropy coded with adaptive Golomb-Rice codes. The encoder
//! reconstructs in-loop, so the decoder's output is byte-identical to the
//! reconstruction the encoder observed.
//!
//! NEAR=0 is lossless; NEAR=k bounds per-sample reconstruction error by
//! +/-k. That contract is all the rest of the crate relies on.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Codestream magic
const MAGIC: &[u8; 4] = b"NLS1";

/// Header size in bytes: magic + width + height + bits + near
pub const HEADER_SIZE: usize = 14;

/// Unary quotient limit; longer quotients escape to raw bits
const QUOTIENT_LIMIT: u32 = 31;

/// Width of the raw escape payload
///
/// Mapped errors never exceed `2 * 65535 + 1 < 2^18`.
const ESCAPE_BITS: u8 = 18;

/// Golomb parameter adaptation reset threshold
const RESET_THRESHOLD: u64 = 64;

/// Upper bound on decoded pixel count, guards against allocation bombs
const MAX_PIXELS: u64 = 1 << 28;

/// Adaptive Golomb-Rice parameter state
///
/// JPEG-LS style `A/N` adaptation: `k` is the smallest value with
/// `N * 2^k >= A`, and both counters halve periodically so the coder tracks
/// non-stationary statistics. Encoder and decoder run identical updates.
struct GolombState {
    error_sum: u64,
    count: u64,
}

impl GolombState {
    fn new(maxval: u32, near: u32) -> Self {
        let range = u64::from(maxval / (2 * near + 1)) + 1;
        GolombState {
            error_sum: ((range + 32) / 64).max(2),
            count: 1,
        }
    }

    fn k(&self) -> u8 {
        let mut k = 0u8;
        while (self.count << k) < self.error_sum && k < 24 {
            k += 1;
        }
        k
    }

    fn update(&mut self, mapped: u32) {
        self.error_sum += u64::from(mapped);
        self.count += 1;
        if self.count >= RESET_THRESHOLD {
            self.error_sum >>= 1;
            self.count >>= 1;
        }
    }
}

/// Median edge detector prediction from reconstructed causal neighbours
#[inline]
fn predict(recon: &[u16], width: usize, x: usize, y: usize) -> i32 {
    let b = if y > 0 {
        i32::from(recon[(y - 1) * width + x])
    } else {
        0
    };
    let c = if y > 0 && x > 0 {
        i32::from(recon[(y - 1) * width + x - 1])
    } else {
        b
    };
    let a = if x > 0 {
        i32::from(recon[y * width + x - 1])
    } else {
        b
    };

    let mn = a.min(b);
    let mx = a.max(b);
    if c >= mx {
        mn
    } else if c <= mn {
        mx
    } else {
        a + b - c
    }
}

/// Map a signed quantized error onto the non-negative integers
#[inline]
fn map_error(qerr: i32) -> u32 {
    if qerr >= 0 {
        (qerr as u32) << 1
    } else {
        (((-qerr) as u32) << 1) - 1
    }
}

/// Inverse of [`map_error`]
#[inline]
fn unmap_error(mapped: u32) -> i32 {
    if mapped & 1 == 0 {
        (mapped >> 1) as i32
    } else {
        -(((mapped + 1) >> 1) as i32)
    }
}

/// Encode a grayscale plane
///
/// `capacity` pre-sizes the output buffer; the returned vector is truncated
/// to the bytes actually written.
pub fn encode_plane(
    samples: &[u16],
    width: u32,
    height: u32,
    bits_per_sample: u8,
    near: u32,
    capacity: usize,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(Error::codec("plane dimensions must be non-zero"));
    }
    let pixel_count = (width as usize) * (height as usize);
    if samples.len() != pixel_count {
        return Err(Error::codec(format!(
            "sample count {} does not match {}x{}",
            samples.len(),
            width,
            height
        )));
    }
    if !(2..=16).contains(&bits_per_sample) {
        return Err(Error::codec(format!(
            "unsupported bit depth {}",
            bits_per_sample
        )));
    }
    if near > 255 {
        return Err(Error::codec(format!("NEAR {} exceeds maximum 255", near)));
    }

    let maxval: u32 = (1u32 << bits_per_sample) - 1;
    if let Some(&bad) = samples.iter().find(|&&s| u32::from(s) > maxval) {
        return Err(Error::codec(format!(
            "sample {} exceeds {}-bit range",
            bad, bits_per_sample
        )));
    }

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&width.to_le_bytes());
    header.extend_from_slice(&height.to_le_bytes());
    header.push(bits_per_sample);
    header.push(near as u8);

    let mut writer = BitWriter::with_capacity(capacity);
    writer.write_bytes(&header);

    let near_i = near as i32;
    let step = 2 * near_i + 1;
    let mut state = GolombState::new(maxval, near);
    let mut recon = vec![0u16; pixel_count];

    let w = width as usize;
    for y in 0..height as usize {
        for x in 0..w {
            let idx = y * w + x;
            let pred = predict(&recon, w, x, y);
            let errval = i32::from(samples[idx]) - pred;

            let qerr = if near == 0 {
                errval
            } else if errval > 0 {
                (errval + near_i) / step
            } else {
                -((near_i - errval) / step)
            };

            let rx = (pred + qerr * step).clamp(0, maxval as i32);
            recon[idx] = rx as u16;

            let mapped = map_error(qerr);
            let k = state.k();
            let quotient = mapped >> k;
            if quotient < QUOTIENT_LIMIT {
                for _ in 0..quotient {
                    writer.write_bit(0);
                }
                writer.write_bit(1);
                if k > 0 {
                    writer.write_bits(mapped & ((1 << k) - 1), k);
                }
            } else {
                for _ in 0..QUOTIENT_LIMIT {
                    writer.write_bit(0);
                }
                writer.write_bit(1);
                writer.write_bits(mapped, ESCAPE_BITS);
            }
            state.update(mapped);
        }
    }

    Ok(writer.finish())
}

/// Decode a grayscale plane
///
/// Returns the reconstructed samples together with the header fields
/// `(width, height, bits_per_sample, near)`.
pub fn decode_plane(bytes: &[u8]) -> Result<(Vec<u16>, u32, u32, u8, u32)> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::codec("codestream shorter than header"));
    }
    if &bytes[..4] != MAGIC {
        return Err(Error::codec("bad codestream magic"));
    }

    let mut cursor = Cursor::new(&bytes[4..HEADER_SIZE]);
    let width = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::codec(format!("header read failed: {}", e)))?;
    let height = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::codec(format!("header read failed: {}", e)))?;
    let bits_per_sample = cursor
        .read_u8()
        .map_err(|e| Error::codec(format!("header read failed: {}", e)))?;
    let near = u32::from(
        cursor
            .read_u8()
            .map_err(|e| Error::codec(format!("header read failed: {}", e)))?,
    );

    if width == 0 || height == 0 {
        return Err(Error::codec("codestream header has zero dimension"));
    }
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(Error::codec("codestream dimensions exceed pixel limit"));
    }
    if !(2..=16).contains(&bits_per_sample) {
        return Err(Error::codec(format!(
            "codestream header has unsupported bit depth {}",
            bits_per_sample
        )));
    }

    let pixel_count = (width as usize) * (height as usize);
    let maxval: u32 = (1u32 << bits_per_sample) - 1;
    let near_i = near as i32;
    let step = 2 * near_i + 1;

    let mut reader = BitReader::new(&bytes[HEADER_SIZE..]);
    let mut state = GolombState::new(maxval, near);
    let mut recon = vec![0u16; pixel_count];

    let w = width as usize;
    for y in 0..height as usize {
        for x in 0..w {
            let k = state.k();

            let mut quotient = 0u32;
            while reader.read_bit()? == 0 {
                quotient += 1;
                if quotient > QUOTIENT_LIMIT {
                    return Err(Error::codec("corrupt unary run in codestream"));
                }
            }

            let mapped = if quotient == QUOTIENT_LIMIT {
                reader.read_bits(ESCAPE_BITS)?
            } else if k > 0 {
                (quotient << k) | reader.read_bits(k)?
            } else {
                quotient
            };

            let qerr = unmap_error(mapped);
            let pred = predict(&recon, w, x, y);
            let rx = (pred + qerr * step).clamp(0, maxval as i32);
            recon[y * w + x] = rx as u16;

            state.update(mapped);
        }
    }

    Ok((recon, width, height, bits_per_sample, near))
}
