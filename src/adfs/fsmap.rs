//! The ADFS free-space map: a 512-byte structure (sectors 0 and 1) holding
//! ascending free extents with two checksums (spec.md §3, §4.4).

use crate::error::{AfsError, AfsResult};
use crate::transport::{SectorTransport, SECTOR_SIZE};

const MAX_EXTENTS: usize = 82;

fn get24(buf: &[u8], off: usize) -> u32 {
    buf[off] as u32 | (buf[off + 1] as u32) << 8 | (buf[off + 2] as u32) << 16
}

fn put24(buf: &mut [u8], off: usize, v: u32) {
    buf[off] = v as u8;
    buf[off + 1] = (v >> 8) as u8;
    buf[off + 2] = (v >> 16) as u8;
}

/// The classic Acorn additive checksum: starts from 255, accumulates bytes
/// 254 downto 0 with an 8-bit add-with-carry (spec.md §3).
fn checksum(buf: &[u8; SECTOR_SIZE]) -> u8 {
    let mut sum: u32 = 255;
    let mut carry: u32 = 0;
    for i in (0..255).rev() {
        sum += buf[i] as u32 + carry;
        carry = 0;
        if sum >= 256 {
            sum &= 0xff;
            carry = 1;
        }
    }
    sum as u8
}

/// An in-memory free-space map; held by the handle's private state, lazily
/// loaded and reused (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct AdfsFreeMap {
    /// `(start_sector, length_in_sectors)`, ascending by start, non-overlapping.
    entries: Vec<(u32, u32)>,
}

impl AdfsFreeMap {
    pub fn load(transport: &mut dyn SectorTransport) -> AfsResult<Self> {
        let mut s0 = [0u8; SECTOR_SIZE];
        let mut s1 = [0u8; SECTOR_SIZE];
        transport.read_sector(0, &mut s0)?;
        transport.read_sector(1, &mut s1)?;

        if checksum(&s0) != s0[255] {
            return Err(AfsError::BadFsmap("sector 0 checksum mismatch"));
        }
        if checksum(&s1) != s1[255] {
            return Err(AfsError::BadFsmap("sector 1 checksum mismatch"));
        }

        let valid_bytes = s1[254] as usize;
        if valid_bytes % 3 != 0 || valid_bytes / 3 > MAX_EXTENTS {
            return Err(AfsError::BadFsmap("invalid extent count"));
        }
        let count = valid_bytes / 3;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let start = get24(&s0, i * 3);
            let len = get24(&s1, i * 3);
            entries.push((start, len));
        }

        let mut map = AdfsFreeMap { entries };
        map.check_order()?;
        Ok(map)
    }

    fn check_order(&self) -> AfsResult<()> {
        for w in self.entries.windows(2) {
            let (prev_start, prev_len) = w[0];
            let (next_start, _) = w[1];
            if next_start <= prev_start {
                return Err(AfsError::BadFsmap("extents out of order"));
            }
            if prev_start + prev_len > next_start {
                return Err(AfsError::BadFsmap("overlapping extents"));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[(u32, u32)] {
        &self.entries
    }

    /// Builds a map directly from an ascending, non-overlapping extent
    /// list, validating I4 the same way [`AdfsFreeMap::load`] does. Used
    /// by callers synthesizing a fresh image (e.g. `mkfs`-style test
    /// fixtures) rather than loading one from a transport.
    pub fn from_extents(entries: Vec<(u32, u32)>) -> AfsResult<Self> {
        let map = AdfsFreeMap { entries };
        map.check_order()?;
        Ok(map)
    }

    #[cfg(test)]
    pub fn for_test(entries: Vec<(u32, u32)>) -> Self {
        AdfsFreeMap { entries }
    }

    /// First-fit allocation over ascending extents (spec.md §4.4).
    pub fn allocate(&mut self, n_sectors: u32) -> AfsResult<u32> {
        for i in 0..self.entries.len() {
            let (start, len) = self.entries[i];
            if len >= n_sectors {
                if len == n_sectors {
                    self.entries.remove(i);
                } else {
                    self.entries[i] = (start + n_sectors, len - n_sectors);
                }
                return Ok(start);
            }
        }
        Err(AfsError::NoSpace)
    }

    /// Returns sectors to the map, coalescing with the preceding extent
    /// when it ends exactly at `start` (spec.md §4.4; forward coalescing
    /// with the following extent is also performed here, which the spec
    /// explicitly allows as long as I4/I5 still hold).
    pub fn release(&mut self, start: u32, n_sectors: u32) -> AfsResult<()> {
        let end = start + n_sectors;
        let pos = self
            .entries
            .iter()
            .position(|&(s, _)| s > start)
            .unwrap_or(self.entries.len());

        let mut merged_into_prev = false;
        if pos > 0 {
            let (prev_start, prev_len) = self.entries[pos - 1];
            if prev_start + prev_len == start {
                self.entries[pos - 1] = (prev_start, prev_len + n_sectors);
                merged_into_prev = true;
            }
        }

        if merged_into_prev {
            // try to also merge forward into the next extent
            if pos < self.entries.len() {
                let (next_start, next_len) = self.entries[pos];
                let (merged_start, merged_len) = self.entries[pos - 1];
                if merged_start + merged_len == next_start {
                    self.entries[pos - 1] = (merged_start, merged_len + next_len);
                    self.entries.remove(pos);
                }
            }
            return Ok(());
        }

        if pos < self.entries.len() {
            let (next_start, next_len) = self.entries[pos];
            if end == next_start {
                self.entries[pos] = (start, n_sectors + next_len);
                return Ok(());
            }
        }

        if self.entries.len() >= MAX_EXTENTS {
            return Err(AfsError::MapFull);
        }
        self.entries.insert(pos, (start, n_sectors));
        Ok(())
    }

    /// Recomputes both checksums and writes sectors 0 and 1 via the
    /// transport.
    pub fn persist(&self, transport: &mut dyn SectorTransport) -> AfsResult<()> {
        if self.entries.len() > MAX_EXTENTS {
            return Err(AfsError::MapFull);
        }

        let mut s0 = [0u8; SECTOR_SIZE];
        let mut s1 = [0u8; SECTOR_SIZE];

        for (i, &(start, len)) in self.entries.iter().enumerate() {
            put24(&mut s0, i * 3, start);
            put24(&mut s1, i * 3, len);
        }
        s1[254] = (self.entries.len() * 3) as u8;

        s0[255] = checksum(&s0);
        s1[255] = checksum(&s1);

        transport.write_sector(0, &s0)?;
        transport.write_sector(1, &s1)?;
        Ok(())
    }
}
