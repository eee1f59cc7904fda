//! Compressed frame record serialization
//!
//! One record per frame, little-endian throughout:
//!
//! ```text
//! offset  size  field
//!      0     4  width (u32)
//!      4     4  height (u32)
//!      8     8  timestamp (u64)
//!     16     4  frame_index (u32)
//!     20     1  is_keyframe (u8, 0/1)
//!     21     4  near_lossless (u32)
//!     25     8  quant_Q (f64; 0.0 on intra)
//!     33     4  dead_zone_T (u32; 0 on intra)
//!     37     4  fp_bits (u32; 0 on intra)
//!     41     1  use_range_map (u8)
//!     42     2  range_min (u16)
//!     44     2  range_max (u16)
//!     46     4  compressed_size N (u32)
//!     50     N  opaque codec bytes
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::frame::CompressedFrame;
use crate::error::{Error, Result};

/// Size of the fixed record header in bytes
pub const RECORD_HEADER_SIZE: usize = 50;

/// Upper bound on the payload size accepted when reading a record
const MAX_PAYLOAD_BYTES: u32 = 1 << 30;

/// Writes compressed frame records to a byte sink
pub struct RecordWriter<W: Write> {
    writer: W,
}

impl<W: Write> RecordWriter<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        RecordWriter { writer }
    }

    /// Serialize one record
    pub fn write_record(&mut self, frame: &CompressedFrame) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(frame.width)?;
        self.writer.write_u32::<LittleEndian>(frame.height)?;
        self.writer.write_u64::<LittleEndian>(frame.timestamp)?;
        self.writer.write_u32::<LittleEndian>(frame.frame_index)?;
        self.writer.write_u8(u8::from(frame.is_keyframe))?;
        self.writer.write_u32::<LittleEndian>(frame.near_lossless)?;
        self.writer.write_f64::<LittleEndian>(frame.quant_q)?;
        self.writer.write_u32::<LittleEndian>(frame.dead_zone_t)?;
        self.writer.write_u32::<LittleEndian>(frame.fp_bits)?;
        self.writer.write_u8(u8::from(frame.use_range_map))?;
        self.writer.write_u16::<LittleEndian>(frame.range_min)?;
        self.writer.write_u16::<LittleEndian>(frame.range_max)?;
        self.writer
            .write_u32::<LittleEndian>(frame.compressed_data.len() as u32)?;
        self.writer.write_all(&frame.compressed_data)?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads compressed frame records from a byte source
pub struct RecordReader<R: Read> {
    reader: R,
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        RecordReader { reader }
    }

    /// Deserialize one record
    pub fn read_record(&mut self) -> Result<CompressedFrame> {
        let width = self.reader.read_u32::<LittleEndian>()?;
        let height = self.reader.read_u32::<LittleEndian>()?;
        let timestamp = self.reader.read_u64::<LittleEndian>()?;
        let frame_index = self.reader.read_u32::<LittleEndian>()?;
        let is_keyframe = self.reader.read_u8()? != 0;
        let near_lossless = self.reader.read_u32::<LittleEndian>()?;
        let quant_q = self.reader.read_f64::<LittleEndian>()?;
        let dead_zone_t = self.reader.read_u32::<LittleEndian>()?;
        let fp_bits = self.reader.read_u32::<LittleEndian>()?;
        let use_range_map = self.reader.read_u8()? != 0;
        let range_min = self.reader.read_u16::<LittleEndian>()?;
        let range_max = self.reader.read_u16::<LittleEndian>()?;

        let compressed_size = self.reader.read_u32::<LittleEndian>()?;
        if compressed_size > MAX_PAYLOAD_BYTES {
            return Err(Error::codec(format!(
                "record payload of {} bytes exceeds limit",
                compressed_size
            )));
        }

        let mut compressed_data = vec![0u8; compressed_size as usize];
        self.reader.read_exact(&mut compressed_data)?;

        Ok(CompressedFrame {
            compressed_data,
            width,
            height,
            frame_index,
            timestamp,
            is_keyframe,
            near_lossless,
            quant_q,
            dead_zone_t,
            fp_bits,
            use_range_map,
            range_min,
            range_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_record() -> CompressedFrame {
        CompressedFrame {
            compressed_data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            width: 640,
            height: 512,
            frame_index: 42,
            timestamp: 123_456_789,
            is_keyframe: false,
            near_lossless: 10,
            quant_q: 2.0,
            dead_zone_t: 2,
            fp_bits: 8,
            use_range_map: false,
            range_min: 0,
            range_max: 65535,
        }
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE + 4);

        let mut reader = RecordReader::new(Cursor::new(bytes));
        let restored = reader.read_record().unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_keyframe_record_round_trip() {
        let record = CompressedFrame {
            is_keyframe: true,
            use_range_map: true,
            range_min: 29134,
            range_max: 34436,
            quant_q: 0.0,
            dead_zone_t: 0,
            fp_bits: 0,
            ..sample_record()
        };

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let restored = RecordReader::new(Cursor::new(bytes)).read_record().unwrap();
        assert!(restored.is_keyframe);
        assert!(restored.use_range_map);
        assert_eq!(restored.range_min, 29134);
        assert_eq!(restored.range_max, 34436);
    }

    #[test]
    fn test_field_offsets_match_layout() {
        let record = sample_record();
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 640);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 512);
        assert_eq!(
            u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            123_456_789
        );
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 42);
        assert_eq!(bytes[20], 0);
        assert_eq!(u32::from_le_bytes(bytes[21..25].try_into().unwrap()), 10);
        assert_eq!(f64::from_le_bytes(bytes[25..33].try_into().unwrap()), 2.0);
        assert_eq!(u32::from_le_bytes(bytes[33..37].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[37..41].try_into().unwrap()), 8);
        assert_eq!(bytes[41], 0);
        assert_eq!(u16::from_le_bytes(bytes[42..44].try_into().unwrap()), 0);
        assert_eq!(u16::from_le_bytes(bytes[44..46].try_into().unwrap()), 65535);
        assert_eq!(u32::from_le_bytes(bytes[46..50].try_into().unwrap()), 4);
    }

    #[test]
    fn test_truncated_record_fails() {
        let record = sample_record();
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = RecordReader::new(Cursor::new(&bytes[..bytes.len() - 2]));
        assert!(matches!(reader.read_record(), Err(Error::Io(_))));

        let mut reader = RecordReader::new(Cursor::new(&bytes[..10]));
        assert!(reader.read_record().is_err());
    }
}
