//! Shared helpers for building throwaway disc images, mirroring the way
//! the teacher's `tests/file_backed.rs` builds on a real file.

use std::fs::File;

use afs_core::adfs::dir::Directory;
use afs_core::adfs::fsmap::AdfsFreeMap;
use afs_core::transport::{SectorTransport, SimpleTransport};
use tempfile::NamedTempFile;

pub const TOTAL_SECTORS: u32 = 1280;

/// A pristine ADFS-simple image: an empty root directory at sector 2 and
/// one free extent covering the rest of the disc.
pub fn blank_adfs() -> (NamedTempFile, SimpleTransport) {
    let f = NamedTempFile::new().unwrap();
    f.as_file().set_len(TOTAL_SECTORS as u64 * 256).unwrap();
    let mut t = SimpleTransport::new(f.reopen().unwrap());

    Directory::new_empty(2, 2, "$").save(&mut t).unwrap();
    AdfsFreeMap::from_extents(vec![(7, TOTAL_SECTORS - 7)])
        .unwrap()
        .persist(&mut t)
        .unwrap();

    (f, t)
}

/// Reopens an on-disk image read-write, for scenarios that close and
/// reopen to check persistence.
pub fn reopen(f: &NamedTempFile) -> SimpleTransport {
    SimpleTransport::new(File::options().read(true).write(true).open(f.path()).unwrap())
}

/// A blank DFS catalogue: zero entries, `total_sectors` disc sectors.
pub fn blank_dfs(total_sectors: u32) -> (NamedTempFile, SimpleTransport) {
    let f = NamedTempFile::new().unwrap();
    f.as_file().set_len(total_sectors as u64 * 256).unwrap();
    let mut t = SimpleTransport::new(f.reopen().unwrap());

    let mut sec0 = [0u8; 256];
    let mut sec1 = [0u8; 256];
    sec1[6] = ((total_sectors >> 8) & 0x03) as u8;
    sec1[7] = total_sectors as u8;
    t.write_sector(0, &sec0).unwrap();
    t.write_sector(1, &sec1).unwrap();
    let _ = &mut sec0;

    (f, t)
}
