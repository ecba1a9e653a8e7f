//! Seek/read/write accessor over a disc image stream

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian};

use super::layout::{CD_SYNC_PATTERN, MODE2_FORM1_DATA_OFFSET, PVD_MAGIC, PVD_SECTOR, RAW_SECTOR_SIZE, VOLUME_SPACE_SIZE};
use super::{PAYLOAD_SIZE, Platform};
use crate::error::{Error, Result};
use crate::patch::{FilePosition, Patch};

/// Chunk size used when streaming data into the image.
const COPY_CHUNK: usize = 64 * 1024;

/// A disc image over a caller-owned stream.
///
/// Physical offsets (`read_at`, `write_at`) address the stream directly.
/// Logical offsets (`read_file`, `apply_patch`) address file content as
/// `sector * 2048 + offset` and skip the raw sector preamble on PSX images.
pub struct DiscImage<S> {
    stream: S,
    platform: Platform,
    len: u64,
}

impl<S: Read + Seek> DiscImage<S> {
    /// Open an image, detecting its platform variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedImage`] if neither variant's volume
    /// descriptor is found at sector 16.
    pub fn open(mut stream: S) -> Result<Self> {
        let len = stream.seek(SeekFrom::End(0))?;
        let platform = detect_platform(&mut stream, len)?;
        tracing::debug!("Opened {platform} image, {len} bytes");
        Ok(Self {
            stream,
            platform,
            len,
        })
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Current stream length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn raw_sector_size(&self) -> u64 {
        self.platform.raw_sector_size()
    }

    #[must_use]
    pub fn payload_offset(&self) -> u64 {
        self.platform.payload_offset()
    }

    /// Number of whole physical sectors in the stream.
    #[must_use]
    pub fn sector_count(&self) -> u64 {
        self.len / self.raw_sector_size()
    }

    /// Read `len` bytes at a physical offset.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        read_exact_at(&mut self.stream, offset, &mut buf)?;
        Ok(buf)
    }

    /// Read the payload of `count` consecutive sectors.
    pub fn read_sectors(&mut self, sector: u32, count: usize) -> Result<Vec<u8>> {
        self.read_file(sector, 0, count * PAYLOAD_SIZE as usize)
    }

    /// Read `len` bytes of file content starting `offset` bytes into the file
    /// whose first sector is `sector`.
    pub fn read_file(&mut self, sector: u32, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = u64::from(sector) * PAYLOAD_SIZE + offset;
        let mut buf = vec![0u8; len];
        for (physical, range) in self.chunks(start, len) {
            read_exact_at(&mut self.stream, physical, &mut buf[range])?;
        }
        Ok(buf)
    }

    /// Read the bytes of a known position.
    pub fn read_position(&mut self, position: &FilePosition) -> Result<Vec<u8>> {
        self.read_file(position.sector, u64::from(position.offset), position.length)
    }

    /// Volume space size from the primary volume descriptor (little-endian copy).
    pub fn volume_sector_count(&mut self) -> Result<u32> {
        let bytes = self.read_position(&VOLUME_SPACE_SIZE.little)?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    /// Split a logical range into per-sector physical chunks.
    fn chunks(&self, logical: u64, len: usize) -> Vec<(u64, std::ops::Range<usize>)> {
        if self.platform.payload_offset() == 0 && self.raw_sector_size() == PAYLOAD_SIZE {
            return vec![(logical, 0..len)];
        }

        let mut chunks = Vec::with_capacity(len / PAYLOAD_SIZE as usize + 2);
        let mut pos = 0usize;
        while pos < len {
            let at = logical + pos as u64;
            let inner = (at % PAYLOAD_SIZE) as usize;
            let take = (PAYLOAD_SIZE as usize - inner).min(len - pos);
            chunks.push((self.platform.physical_offset(at), pos..pos + take));
            pos += take;
        }
        chunks
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give the stream back to the caller.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write + Seek> DiscImage<S> {
    /// Write bytes at a physical offset inside the current stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteOutOfBounds`] if the write would extend the stream.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.check_bounds(offset, bytes.len())?;
        self.stream.seek(SeekFrom::Start(offset))?;
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// Apply one patch through the logical mapping.
    ///
    /// The whole patch is bounds-checked before anything is written.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        let chunks = self.chunks(patch.offset, patch.len());
        if let Some((physical, range)) = chunks.last() {
            self.check_bounds(*physical, range.len())?;
        }
        for (physical, range) in chunks {
            self.stream.seek(SeekFrom::Start(physical))?;
            self.stream.write_all(&patch.bytes[range])?;
        }
        Ok(())
    }

    /// Apply patches in order, returning how many were written.
    pub fn apply_patches<'a>(&mut self, patches: impl IntoIterator<Item = &'a Patch>) -> Result<usize> {
        let mut applied = 0;
        for patch in patches {
            self.apply_patch(patch)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Write one whole physical sector; the only operation that may grow the stream.
    ///
    /// The sector must start at or before the current end so no hole is left.
    pub fn write_raw_sector(&mut self, sector: u64, raw: &[u8]) -> Result<()> {
        let size = self.raw_sector_size();
        if raw.len() as u64 != size {
            return Err(Error::InvalidFormat(format!(
                "raw sector must be {size} bytes, got {}",
                raw.len()
            )));
        }
        let offset = sector * size;
        if offset > self.len {
            return Err(Error::WriteOutOfBounds {
                offset,
                len: raw.len(),
                stream_len: self.len,
            });
        }
        self.stream.seek(SeekFrom::Start(offset))?;
        self.stream.write_all(raw)?;
        self.len = self.len.max(offset + size);
        Ok(())
    }

    /// Stream `len` bytes from `reader` into the image at a logical offset.
    pub fn copy_into<R: Read>(&mut self, logical: u64, reader: &mut R, len: u64) -> Result<()> {
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        while copied < len {
            let take = (len - copied).min(COPY_CHUNK as u64) as usize;
            reader.read_exact(&mut buf[..take]).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    Error::ShortRead {
                        offset: copied,
                        len: take,
                    }
                } else {
                    Error::Io(e)
                }
            })?;
            self.apply_patch(&Patch::new(logical + copied, &buf[..take]))?;
            copied += take as u64;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    fn check_bounds(&self, offset: u64, len: usize) -> Result<()> {
        if offset + len as u64 > self.len {
            return Err(Error::WriteOutOfBounds {
                offset,
                len,
                stream_len: self.len,
            });
        }
        Ok(())
    }
}

fn read_exact_at<S: Read + Seek>(stream: &mut S, offset: u64, buf: &mut [u8]) -> Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    stream.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::ShortRead {
                offset,
                len: buf.len(),
            }
        } else {
            Error::Io(e)
        }
    })
}

/// Identify the platform from the volume descriptor at sector 16.
fn detect_platform<S: Read + Seek>(stream: &mut S, len: u64) -> Result<Platform> {
    let pvd = u64::from(PVD_SECTOR);

    if len % RAW_SECTOR_SIZE == 0 && len >= (pvd + 1) * RAW_SECTOR_SIZE {
        let mut sync = [0u8; 12];
        let mut magic = [0u8; 6];
        read_exact_at(stream, pvd * RAW_SECTOR_SIZE, &mut sync)?;
        read_exact_at(stream, pvd * RAW_SECTOR_SIZE + MODE2_FORM1_DATA_OFFSET, &mut magic)?;
        if sync == CD_SYNC_PATTERN && magic == PVD_MAGIC {
            return Ok(Platform::Psx);
        }
    }

    if len >= (pvd + 1) * PAYLOAD_SIZE {
        let mut magic = [0u8; 6];
        read_exact_at(stream, pvd * PAYLOAD_SIZE, &mut magic)?;
        if magic == PVD_MAGIC {
            return Ok(Platform::Psp);
        }
    }

    Err(Error::UnrecognizedImage { len })
}
