//! ISO-9660 directory record codec
//!
//! Layout of one record:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 1 | record length |
//! | 1 | 1 | extended attribute record length |
//! | 2 | 8 | extent sector (LE + BE) |
//! | 10 | 8 | data length (LE + BE) |
//! | 18 | 6 | recording date and time |
//! | 24 | 1 | GMT offset (15 minute units) |
//! | 25 | 7 | middle block: flags, unit size, gap, volume sequence (LE + BE) |
//! | 32 | 1 | name length |
//! | 33 | n | name, then a pad byte if `n` is even |
//! | .. | .. | extended block (system use area, e.g. XA attributes) |

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::flags::FileFlags;
use crate::error::{Error, Result};

/// Size of the fixed part of a record, up to and including the name length.
pub const FIXED_RECORD_LEN: usize = 33;
/// Size of the opaque block between the timestamp and the name length.
pub const MIDDLE_BLOCK_LEN: usize = 7;
/// Name of the record describing the directory itself.
pub const SELF_NAME: &str = "\u{0}";
/// Name of the record describing the parent directory.
pub const PARENT_NAME: &str = "\u{1}";

/// Recording date and time of a directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RecordTimestamp {
    /// Years representable on disc (stored as years since 1900 in one byte).
    const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2155;

    #[must_use]
    pub fn from_datetime(datetime: &NaiveDateTime) -> Self {
        let year = datetime.year().clamp(*Self::YEAR_RANGE.start(), *Self::YEAR_RANGE.end());
        Self {
            year: year as u16,
            month: datetime.month() as u8,
            day: datetime.day() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
            second: datetime.second() as u8,
        }
    }

    /// `None` when the stored fields do not form a valid date.
    #[must_use]
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }

    fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            year: 1900 + u16::from(bytes[0]),
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
        }
    }

    fn to_bytes(self) -> [u8; 6] {
        [
            (self.year.saturating_sub(1900)).min(255) as u8,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}

/// One named entry of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// File identifier including the version suffix (`"WEP.SPR;1"`).
    pub filename: String,
    /// First sector of the file's extent.
    pub sector: u32,
    /// Data length in bytes.
    pub size: u32,
    pub timestamp: RecordTimestamp,
    /// GMT offset in 15 minute units.
    pub gmt_offset: i8,
    /// Flags, unit size, interleave gap and volume sequence number, passed through.
    pub middle_bytes: [u8; MIDDLE_BLOCK_LEN],
    /// System use area after the name, passed through.
    pub extended_bytes: Vec<u8>,
}

impl DirectoryEntry {
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        sector: u32,
        size: u32,
        timestamp: RecordTimestamp,
        gmt_offset: i8,
        middle_bytes: [u8; MIDDLE_BLOCK_LEN],
        extended_bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            sector,
            size,
            timestamp,
            gmt_offset,
            middle_bytes,
            extended_bytes,
        }
    }

    /// New entry that copies GMT offset and attribute blocks from `template`.
    #[must_use]
    pub fn like(template: &DirectoryEntry, filename: impl Into<String>, sector: u32, size: u32, timestamp: RecordTimestamp) -> Self {
        Self::new(
            filename,
            sector,
            size,
            timestamp,
            template.gmt_offset,
            template.middle_bytes,
            template.extended_bytes.clone(),
        )
    }

    /// Decode one record. `at` is only used for error reporting.
    pub fn decode(record: &[u8], at: usize) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidDirectoryRecord { offset: at, reason };

        if record.len() < FIXED_RECORD_LEN {
            return Err(invalid(format!("record is {} bytes, shorter than {FIXED_RECORD_LEN}", record.len())));
        }
        let record_len = record[0] as usize;
        if record_len < FIXED_RECORD_LEN || record_len > record.len() {
            return Err(invalid(format!("record length {record_len} out of range")));
        }

        let mut cursor = Cursor::new(&record[..record_len]);
        cursor.set_position(1);
        let ext_attr_len = cursor.read_u8()?;
        if ext_attr_len != 0 {
            tracing::warn!("Directory record at {at:#X} has an extended attribute record ({ext_attr_len} sectors); ignored");
        }
        let sector = cursor.read_u32::<LittleEndian>()?;
        let _sector_be = cursor.read_u32::<BigEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let _size_be = cursor.read_u32::<BigEndian>()?;

        let mut stamp = [0u8; 6];
        cursor.read_exact(&mut stamp)?;
        let gmt_offset = cursor.read_i8()?;

        let mut middle_bytes = [0u8; MIDDLE_BLOCK_LEN];
        cursor.read_exact(&mut middle_bytes)?;

        let name_len = cursor.read_u8()? as usize;
        let name_end = FIXED_RECORD_LEN + name_len;
        if name_end > record_len {
            return Err(invalid(format!("name of {name_len} bytes overruns record of {record_len}")));
        }
        let filename = String::from_utf8(record[FIXED_RECORD_LEN..name_end].to_vec())
            .map_err(|e| invalid(format!("filename is not valid text: {e}")))?;

        let ext_start = (name_end + padding(name_len)).min(record_len);
        let extended_bytes = record[ext_start..record_len].to_vec();

        Ok(Self {
            filename,
            sector,
            size,
            timestamp: RecordTimestamp::from_bytes(stamp),
            gmt_offset,
            middle_bytes,
            extended_bytes,
        })
    }

    /// Length of the encoded record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let name_len = self.filename.len();
        FIXED_RECORD_LEN + name_len + padding(name_len) + self.extended_bytes.len()
    }

    /// Encode the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDirectoryRecord`] if the record would exceed 255 bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record_len = self.encoded_len();
        let record_len_byte = u8::try_from(record_len).map_err(|_| Error::InvalidDirectoryRecord {
            offset: 0,
            reason: format!("{:?} encodes to {record_len} bytes, more than 255", self.filename),
        })?;

        let mut out = Vec::with_capacity(record_len);
        out.write_u8(record_len_byte)?;
        out.write_u8(0)?;
        out.write_u32::<LittleEndian>(self.sector)?;
        out.write_u32::<BigEndian>(self.sector)?;
        out.write_u32::<LittleEndian>(self.size)?;
        out.write_u32::<BigEndian>(self.size)?;
        out.write_all(&self.timestamp.to_bytes())?;
        out.write_i8(self.gmt_offset)?;
        out.write_all(&self.middle_bytes)?;
        out.write_u8(self.filename.len() as u8)?;
        out.write_all(self.filename.as_bytes())?;
        if padding(self.filename.len()) == 1 {
            out.write_u8(0)?;
        }
        out.write_all(&self.extended_bytes)?;
        Ok(out)
    }

    #[must_use]
    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits(self.middle_bytes[0])
    }

    /// The `"\0"` (self) and `"\x01"` (parent) records.
    #[must_use]
    pub fn is_self_or_parent(&self) -> bool {
        self.filename == SELF_NAME || self.filename == PARENT_NAME
    }

    /// Filename with the `;version` suffix removed.
    #[must_use]
    pub fn name_without_version(&self) -> &str {
        self.filename.split(';').next().unwrap_or(&self.filename)
    }
}

/// The name is followed by a pad byte when its length is even.
fn padding(name_len: usize) -> usize {
    usize::from(name_len % 2 == 0)
}
