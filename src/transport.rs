//! Sector transport: byte-for-byte ("simple") and IDE-interleaved physical
//! mediums underneath a common 256-byte-sector contract (spec.md §4.1).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{AfsError, AfsResult};

pub const SECTOR_SIZE: usize = 256;

/// Reads/writes fixed-size sectors from a backing file. `bytes` passed to
/// either method is always a multiple of `SECTOR_SIZE`.
pub trait SectorTransport {
    fn read(&mut self, start_sector: u32, buf: &mut [u8]) -> AfsResult<()>;
    fn write(&mut self, start_sector: u32, buf: &[u8]) -> AfsResult<()>;

    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> AfsResult<()> {
        self.read(sector, buf)
    }

    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> AfsResult<()> {
        self.write(sector, buf)
    }
}

fn check_multiple(bytes: usize) -> AfsResult<()> {
    if bytes % SECTOR_SIZE != 0 {
        return Err(AfsError::Bug("sector transport given a non-sector-multiple length"));
    }
    Ok(())
}

/// Sector N lives at byte offset `N * 256`; direct read/write.
pub struct SimpleTransport {
    file: File,
}

impl SimpleTransport {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl SectorTransport for SimpleTransport {
    fn read(&mut self, start_sector: u32, buf: &mut [u8]) -> AfsResult<()> {
        check_multiple(buf.len())?;
        self.file
            .seek(SeekFrom::Start(start_sector as u64 * SECTOR_SIZE as u64))?;
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                AfsError::BadEof
            } else {
                AfsError::Io(e)
            }
        })
    }

    fn write(&mut self, start_sector: u32, buf: &[u8]) -> AfsResult<()> {
        check_multiple(buf.len())?;
        self.file
            .seek(SeekFrom::Start(start_sector as u64 * SECTOR_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// Sector N occupies 512 physical bytes, one logical byte followed by a
/// zero byte; this is what a 16-bit IDE dump of an 8-bit bus looks like.
pub struct InterleavedTransport {
    file: File,
}

impl InterleavedTransport {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl SectorTransport for InterleavedTransport {
    fn read(&mut self, start_sector: u32, buf: &mut [u8]) -> AfsResult<()> {
        check_multiple(buf.len())?;
        self.file
            .seek(SeekFrom::Start(start_sector as u64 * (SECTOR_SIZE as u64) * 2))?;

        // Chunked at 256-byte boundaries to bound temporary storage
        // (spec.md §4.1).
        let mut raw = [0u8; SECTOR_SIZE * 2];
        for chunk in buf.chunks_mut(SECTOR_SIZE) {
            let doubled = &mut raw[..chunk.len() * 2];
            self.file.read_exact(doubled).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    AfsError::BadEof
                } else {
                    AfsError::Io(e)
                }
            })?;
            for (i, b) in chunk.iter_mut().enumerate() {
                *b = doubled[i * 2];
            }
        }
        Ok(())
    }

    fn write(&mut self, start_sector: u32, buf: &[u8]) -> AfsResult<()> {
        check_multiple(buf.len())?;
        self.file
            .seek(SeekFrom::Start(start_sector as u64 * (SECTOR_SIZE as u64) * 2))?;

        let mut raw = [0u8; SECTOR_SIZE * 2];
        for chunk in buf.chunks(SECTOR_SIZE) {
            let doubled = &mut raw[..chunk.len() * 2];
            for (i, b) in chunk.iter().enumerate() {
                doubled[i * 2] = *b;
                doubled[i * 2 + 1] = 0;
            }
            self.file.write_all(doubled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn medium(interleaved: bool) -> Box<dyn SectorTransport> {
        let f = NamedTempFile::new().unwrap();
        // Pre-size the file so seeks inside it don't produce holes that
        // `read_exact` would choke on.
        f.as_file().set_len(16 * SECTOR_SIZE as u64 * if interleaved { 2 } else { 1 }).unwrap();
        let file = f.reopen().unwrap();
        if interleaved {
            Box::new(InterleavedTransport::new(file))
        } else {
            Box::new(SimpleTransport::new(file))
        }
    }

    #[test]
    fn simple_round_trip() {
        let mut t = medium(false);
        let payload = [0xABu8; SECTOR_SIZE];
        t.write_sector(3, &payload).unwrap();
        let mut out = [0u8; SECTOR_SIZE];
        t.read_sector(3, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn interleave_is_its_own_inverse() {
        let mut t = medium(true);
        let mut payload = [0u8; SECTOR_SIZE];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i * 37 + 5) as u8;
        }
        t.write_sector(0, &payload).unwrap();
        let mut out = [0u8; SECTOR_SIZE];
        t.read_sector(0, &mut out).unwrap();
        assert_eq!(out, payload);
    }
}
