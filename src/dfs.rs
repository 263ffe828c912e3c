//! The DFS backend: a single 512-byte catalogue (two 256-byte sectors),
//! 31 entries max, packed by strictly decreasing start sector (spec.md
//! §3, §4.6).

use std::io::Write;

use crate::error::{AfsError, AfsResult};
use crate::object::{Attr, Object};
use crate::transport::{SectorTransport, SECTOR_SIZE};
use crate::wildmat;

pub const CAT_BYTES: usize = 512;
pub const MAX_ENTRIES: usize = 31;
pub const NAME_LEN: usize = 7;
pub const TITLE_LEN_1: usize = 8;
pub const TITLE_LEN_2: usize = 4;

fn get16(buf: &[u8], off: usize) -> u32 {
    buf[off] as u32 | (buf[off + 1] as u32) << 8
}

fn put16(buf: &mut [u8], off: usize, v: u32) {
    buf[off] = v as u8;
    buf[off + 1] = (v >> 8) as u8;
}

/// Unpacks an 18-bit value (low 16 bits + 2 high bits), sign-extending
/// when the two high bits are `0b11` (spec.md §3, the load/exec address
/// convention).
fn unpack18_signed(low16: u32, high2: u32) -> u32 {
    let v = low16 | (high2 << 16);
    if high2 == 0b11 {
        v | 0xFFFC_0000
    } else {
        v
    }
}

fn pack18(value: u32) -> (u32, u32) {
    (value & 0xFFFF, (value >> 16) & 0b11)
}

#[derive(Debug, Clone)]
pub struct DfsEntry {
    pub name: String,
    pub dir_letter: char,
    pub locked: bool,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub length: u32,
    pub sector: u32,
}

impl DfsEntry {
    pub fn end_sector(&self) -> u32 {
        self.sector + Object::sectors_for(self.length)
    }

    pub fn to_object(&self) -> Object {
        let mut attr = Attr::empty();
        if self.locked {
            attr |= Attr::LOCKED;
        }
        Object {
            name: format!("{}.{}", self.dir_letter, self.name),
            load_addr: self.load_addr,
            exec_addr: self.exec_addr,
            length: self.length,
            sector: self.sector,
            attr,
            data: None,
        }
    }
}

fn split_pattern(pattern: &str) -> (String, String) {
    match pattern.find('.') {
        Some(idx) => (pattern[..idx].to_string(), pattern[idx + 1..].to_string()),
        None => ("$".to_string(), pattern.to_string()),
    }
}

fn pattern_matches(pattern: &str, letter: char, name: &str) -> bool {
    let (letter_pat, name_pat) = split_pattern(pattern);
    wildmat::matches(&letter_pat, &letter.to_string()) && wildmat::matches(&name_pat, name)
}

/// A loaded 512-byte catalogue (sectors 0 and 1).
pub struct Catalogue {
    buf: [u8; CAT_BYTES],
}

impl Catalogue {
    pub fn load(transport: &mut dyn SectorTransport) -> AfsResult<Catalogue> {
        let mut buf = [0u8; CAT_BYTES];
        let mut s0 = [0u8; SECTOR_SIZE];
        let mut s1 = [0u8; SECTOR_SIZE];
        transport.read_sector(0, &mut s0)?;
        transport.read_sector(1, &mut s1)?;
        buf[..SECTOR_SIZE].copy_from_slice(&s0);
        buf[SECTOR_SIZE..].copy_from_slice(&s1);
        let cat = Catalogue { buf };
        cat.validate()?;
        Ok(cat)
    }

    pub fn entry_count(&self) -> usize {
        (self.buf[0x105] / 8) as usize
    }

    fn set_entry_count(&mut self, n: usize) {
        self.buf[0x105] = (n * 8) as u8;
    }

    pub fn total_sectors(&self) -> u32 {
        (((self.buf[0x106] & 0x03) as u32) << 8) | self.buf[0x107] as u32
    }

    fn set_total_sectors(&mut self, n: u32) {
        self.buf[0x106] = (self.buf[0x106] & !0x03) | (((n >> 8) & 0x03) as u8);
        self.buf[0x107] = n as u8;
    }

    /// I7/sanity checks run both by the opener's probe and by `Check`.
    pub fn validate(&self) -> AfsResult<()> {
        if self.buf[0x105] % 8 != 0 || self.entry_count() > MAX_ENTRIES {
            return Err(AfsError::BrokenDir("bad DFS entry count"));
        }
        if self.total_sectors() > 1280 {
            return Err(AfsError::BrokenDir("bad DFS total sector count"));
        }
        let entries = self.entries();
        for e in &entries {
            if e.sector == 0 {
                return Err(AfsError::BrokenDir("zero start sector"));
            }
        }
        for w in entries.windows(2) {
            if w[1].sector >= w[0].sector {
                return Err(AfsError::BrokenDir("entries not in decreasing sector order"));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<DfsEntry> {
        let n = self.entry_count();
        let mut out = Vec::with_capacity(n);
        for k in 0..n {
            let name_off = 8 + 8 * k;
            let meta_off = 0x100 + 8 * k;

            let mut name = String::new();
            for i in 0..NAME_LEN {
                let b = self.buf[name_off + i] & 0x7F;
                if b == 0 || b == b' ' && name.is_empty() {
                    continue;
                }
                name.push(b as char);
            }
            let name = name.trim_end().to_string();

            let letter_byte = self.buf[name_off + 7];
            let dir_letter = (letter_byte & 0x7F) as char;
            let locked = letter_byte & 0x80 != 0;

            let packed = self.buf[meta_off + 6];
            let load_low = get16(&self.buf, meta_off);
            let exec_low = get16(&self.buf, meta_off + 2);
            let len_low = get16(&self.buf, meta_off + 4);
            let sector_low = self.buf[meta_off + 7] as u32;

            let load_high = ((packed >> 2) & 0b11) as u32;
            let exec_high = ((packed >> 6) & 0b11) as u32;
            let len_high = ((packed >> 4) & 0b11) as u32;
            let sector_high = (packed & 0b11) as u32;

            out.push(DfsEntry {
                name,
                dir_letter,
                locked,
                load_addr: unpack18_signed(load_low, load_high),
                exec_addr: unpack18_signed(exec_low, exec_high),
                length: len_low | (len_high << 16),
                sector: sector_low | (sector_high << 8),
            });
        }
        out
    }

    pub fn set_entries(&mut self, entries: &[DfsEntry]) -> AfsResult<()> {
        if entries.len() > MAX_ENTRIES {
            return Err(AfsError::DirFull);
        }
        for off in (8..0x100).step_by(8) {
            self.buf[off..off + 8].fill(0);
        }
        for off in (0x100..CAT_BYTES).step_by(8) {
            self.buf[off..off + 8].fill(0);
        }

        for (k, e) in entries.iter().enumerate() {
            let name_off = 8 + 8 * k;
            let meta_off = 0x100 + 8 * k;

            let name_bytes: Vec<u8> = e.name.bytes().take(NAME_LEN).collect();
            for i in 0..NAME_LEN {
                self.buf[name_off + i] = if i < name_bytes.len() {
                    name_bytes[i]
                } else {
                    b' '
                };
            }
            self.buf[name_off + 7] =
                (e.dir_letter as u8) | if e.locked { 0x80 } else { 0 };

            let (load_low, load_high) = pack18(e.load_addr);
            let (exec_low, exec_high) = pack18(e.exec_addr);
            let (len_low, len_high) = pack18(e.length);
            let sector_high = (e.sector >> 8) & 0b11;

            put16(&mut self.buf, meta_off, load_low);
            put16(&mut self.buf, meta_off + 2, exec_low);
            put16(&mut self.buf, meta_off + 4, len_low);
            self.buf[meta_off + 6] = ((load_high & 0b11) << 2) as u8
                | ((exec_high & 0b11) << 6) as u8
                | ((len_high & 0b11) << 4) as u8
                | sector_high as u8;
            self.buf[meta_off + 7] = e.sector as u8;
        }

        self.set_entry_count(entries.len());
        Ok(())
    }

    pub fn title(&self) -> String {
        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&self.buf[0..TITLE_LEN_1]);
        bytes.extend_from_slice(&self.buf[0x100..0x100 + TITLE_LEN_2]);
        let end = bytes
            .iter()
            .position(|&b| b == 0 || b == 0x0D)
            .unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
    }

    /// `Settitle`: first 8 chars into sector 0, remaining 4 into sector 1,
    /// space-padded (spec.md §4.6).
    pub fn set_title(&mut self, text: &str) {
        let mut padded = [b' '; 12];
        for (i, b) in text.bytes().take(12).enumerate() {
            padded[i] = b;
        }
        self.buf[0..TITLE_LEN_1].copy_from_slice(&padded[0..TITLE_LEN_1]);
        self.buf[0x100..0x100 + TITLE_LEN_2].copy_from_slice(&padded[TITLE_LEN_1..12]);
    }

    pub fn set_total_sectors_pub(&mut self, n: u32) {
        self.set_total_sectors(n);
    }

    pub fn save(&self, transport: &mut dyn SectorTransport) -> AfsResult<()> {
        let mut s0 = [0u8; SECTOR_SIZE];
        let mut s1 = [0u8; SECTOR_SIZE];
        s0.copy_from_slice(&self.buf[..SECTOR_SIZE]);
        s1.copy_from_slice(&self.buf[SECTOR_SIZE..]);
        transport.write_sector(0, &s0)?;
        transport.write_sector(1, &s1)?;
        Ok(())
    }
}

/// Stateless DFS operations; the catalogue is loaded fresh for every call
/// (the whole structure is one 512-byte page, not worth caching across
/// calls the way the ADFS free-space map is).
#[derive(Default)]
pub struct DfsBackend;

impl DfsBackend {
    pub fn new() -> Self {
        DfsBackend
    }

    pub fn find(&self, transport: &mut dyn SectorTransport, path: &str) -> AfsResult<Object> {
        let cat = Catalogue::load(transport)?;
        cat.entries()
            .into_iter()
            .find(|e| pattern_matches(path, e.dir_letter, &e.name))
            .map(|e| e.to_object())
            .ok_or(AfsError::NotFound)
    }

    pub fn glob(
        &self,
        transport: &mut dyn SectorTransport,
        pattern: &str,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        let cat = Catalogue::load(transport)?;
        for e in cat.entries() {
            if pattern_matches(pattern, e.dir_letter, &e.name) {
                let path = format!("{}.{}", e.dir_letter, e.name);
                cb(&path, &e.to_object())?;
            }
        }
        Ok(())
    }

    pub fn walk(
        &self,
        transport: &mut dyn SectorTransport,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        self.glob(transport, "$.*", cb)
    }

    pub fn load_data(
        &self,
        transport: &mut dyn SectorTransport,
        object: &Object,
    ) -> AfsResult<Vec<u8>> {
        let n_sectors = Object::sectors_for(object.length);
        let mut buf = vec![0u8; n_sectors as usize * SECTOR_SIZE];
        for i in 0..n_sectors {
            let mut sec = [0u8; SECTOR_SIZE];
            transport.read_sector(object.sector + i, &mut sec)?;
            let off = i as usize * SECTOR_SIZE;
            buf[off..off + SECTOR_SIZE].copy_from_slice(&sec);
        }
        buf.truncate(object.length as usize);
        Ok(buf)
    }

    fn find_gap(entries: &[DfsEntry], total_sectors: u32, required: u32) -> Option<u32> {
        let mut upper = total_sectors;
        for e in entries {
            let gap = upper.saturating_sub(e.end_sector());
            if gap >= required {
                return Some(upper - required);
            }
            upper = e.sector;
        }
        let gap = upper.saturating_sub(2);
        if gap >= required {
            Some(upper - required)
        } else {
            None
        }
    }

    /// `Save`: spec.md §4.6 "DFS allocates downward from high sectors".
    pub fn save(
        &self,
        transport: &mut dyn SectorTransport,
        object: &Object,
        dir_letter: char,
    ) -> AfsResult<()> {
        let mut cat = Catalogue::load(transport)?;
        let mut entries = cat.entries();
        let required = Object::sectors_for(object.length);

        let existing_idx = entries
            .iter()
            .position(|e| e.dir_letter == dir_letter && e.name == object.name);

        let start_sector = if let Some(idx) = existing_idx {
            if entries[idx].end_sector() - entries[idx].sector >= required {
                let s = entries[idx].sector;
                entries.remove(idx);
                s
            } else {
                entries.remove(idx);
                Self::find_gap(&entries, cat.total_sectors(), required).ok_or(AfsError::NoSpace)?
            }
        } else {
            if entries.len() >= MAX_ENTRIES {
                return Err(AfsError::DirFull);
            }
            Self::find_gap(&entries, cat.total_sectors(), required).ok_or(AfsError::NoSpace)?
        };

        if let Some(data) = &object.data {
            let n_sectors = Object::sectors_for(data.len() as u32);
            let mut padded = vec![0u8; n_sectors as usize * SECTOR_SIZE];
            padded[..data.len()].copy_from_slice(data);
            for i in 0..n_sectors {
                let mut sec = [0u8; SECTOR_SIZE];
                let off = i as usize * SECTOR_SIZE;
                sec.copy_from_slice(&padded[off..off + SECTOR_SIZE]);
                transport.write_sector(start_sector + i, &sec)?;
            }
        }

        let new_entry = DfsEntry {
            name: object.name.clone(),
            dir_letter,
            locked: object.attr.contains(Attr::LOCKED),
            load_addr: object.load_addr,
            exec_addr: object.exec_addr,
            length: object.length,
            sector: start_sector,
        };

        let insert_at = entries
            .iter()
            .position(|e| e.sector < start_sector)
            .unwrap_or(entries.len());
        entries.insert(insert_at, new_entry);

        cat.set_entries(&entries)?;
        cat.save(transport)
    }

    /// `Remove`: DFS-only (spec.md §4.6).
    pub fn remove(&self, transport: &mut dyn SectorTransport, pattern: &str) -> AfsResult<usize> {
        let mut cat = Catalogue::load(transport)?;
        let entries = cat.entries();
        let before = entries.len();
        let kept: Vec<DfsEntry> = entries
            .into_iter()
            .filter(|e| !pattern_matches(pattern, e.dir_letter, &e.name))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            cat.set_entries(&kept)?;
            cat.save(transport)?;
        }
        Ok(removed)
    }

    pub fn settitle(&self, transport: &mut dyn SectorTransport, text: &str) -> AfsResult<()> {
        let mut cat = Catalogue::load(transport)?;
        cat.set_title(text);
        cat.save(transport)
    }

    pub fn mkdir(&self, _transport: &mut dyn SectorTransport, _name: &str) -> AfsResult<()> {
        Err(AfsError::NotSupported)
    }

    pub fn check(
        &self,
        transport: &mut dyn SectorTransport,
        sink: &mut dyn Write,
        image_name: &str,
    ) -> AfsResult<usize> {
        let cat = match Catalogue::load(transport) {
            Ok(c) => c,
            Err(e) => {
                let _ = writeln!(sink, "{}: {}", image_name, e);
                return Ok(1);
            }
        };
        // `Catalogue::load` already ran `validate`; a successful load means
        // no I7/count/sector-count diagnostics to report.
        let _ = cat;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimpleTransport;
    use tempfile::NamedTempFile;

    fn fresh_image() -> SimpleTransport {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(1280 * 256).unwrap();
        let mut t = SimpleTransport::new(f.reopen().unwrap());
        let mut cat = Catalogue {
            buf: [0u8; CAT_BYTES],
        };
        cat.set_total_sectors_pub(800);
        cat.save(&mut t).unwrap();
        t
    }

    #[test]
    fn save_three_files_keeps_decreasing_order() {
        let mut t = fresh_image();
        let dfs = DfsBackend::new();
        for name in ["AAAAAAA", "BBBBBBB", "CCCCCCC"] {
            let obj = Object {
                name: name.to_string(),
                load_addr: 0,
                exec_addr: 0,
                length: 512,
                sector: 0,
                attr: Attr::empty(),
                data: Some(vec![0u8; 512]),
            };
            dfs.save(&mut t, &obj, '$').unwrap();
        }
        let cat = Catalogue::load(&mut t).unwrap();
        let entries = cat.entries();
        assert_eq!(entries.len(), 3);
        for w in entries.windows(2) {
            assert!(w[1].sector < w[0].sector);
        }
    }

    #[test]
    fn remove_shifts_and_flushes() {
        let mut t = fresh_image();
        let dfs = DfsBackend::new();
        let obj = Object {
            name: "HELLO".to_string(),
            load_addr: 0,
            exec_addr: 0,
            length: 256,
            sector: 0,
            attr: Attr::empty(),
            data: Some(vec![1u8; 256]),
        };
        dfs.save(&mut t, &obj, '$').unwrap();
        let removed = dfs.remove(&mut t, "$.HELLO").unwrap();
        assert_eq!(removed, 1);
        assert!(dfs.find(&mut t, "$.HELLO").is_err());
    }

    #[test]
    fn settitle_is_idempotent() {
        let mut t = fresh_image();
        let dfs = DfsBackend::new();
        dfs.settitle(&mut t, "MY DISC").unwrap();
        let cat1 = Catalogue::load(&mut t).unwrap();
        dfs.settitle(&mut t, "MY DISC").unwrap();
        let cat2 = Catalogue::load(&mut t).unwrap();
        assert_eq!(cat1.title(), cat2.title());
    }

    #[test]
    fn mkdir_not_supported() {
        let mut t = fresh_image();
        let dfs = DfsBackend::new();
        assert!(matches!(dfs.mkdir(&mut t, "X"), Err(AfsError::NotSupported)));
    }
}
