//! The image opener: probes a backing file for ADFS (simple, then
//! interleaved) and falls back to DFS, taking an advisory whole-file lock
//! along the way (spec.md §4.2, grounded directly in `original_source/
//! acorn-fs.c`'s `acorn_fs_open`/`lock_file`/`check_adfs`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adfs::{AdfsBackend, INTERLEAVED_PROBE_OFFSETS, SIMPLE_PROBE_OFFSETS};
use crate::dfs::{Catalogue, DfsBackend};
use crate::error::{AfsError, AfsResult};
use crate::fs::Filesystem;
use crate::registry::{self, HandleRef};
use crate::transport::{InterleavedTransport, SectorTransport, SimpleTransport};

/// Reads `len` bytes at `off1` and checks that bytes `[1..len]` equal
/// `pattern`, then re-reads at `off2` and requires the two reads to be
/// byte-identical (spec.md §4.2 steps 3/4; `acorn-fs.c`'s `check_adfs`).
/// `pattern` is `len - 1` bytes long; byte 0 of each read is unchecked
/// (it carries the sentinel's own leading `\0`, doubled under interleave).
fn check_adfs(file: &mut File, off1: u64, off2: u64, pattern: &[u8]) -> AfsResult<()> {
    let len = pattern.len() + 1;
    let mut id1 = [0u8; 10];
    let mut id2 = [0u8; 10];
    file.seek(SeekFrom::Start(off1))?;
    read_or(file, &mut id1[..len])?;
    if &id1[1..len] != pattern {
        return Err(AfsError::NotAcorn);
    }
    file.seek(SeekFrom::Start(off2))?;
    read_or(file, &mut id2[..len])?;
    if id1[..len] != id2[..len] {
        return Err(AfsError::BrokenDir("disagreeing directory sentinel copies"));
    }
    Ok(())
}

fn read_or(file: &mut File, buf: &mut [u8]) -> AfsResult<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            AfsError::BadEof
        } else {
            AfsError::Io(e)
        }
    })
}

#[cfg(unix)]
fn lock_file(file: &File, writable: bool) -> AfsResult<()> {
    use std::os::unix::io::AsRawFd;

    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = if writable { libc::F_WRLCK } else { libc::F_RDLCK } as libc::c_short;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = 0;
    fl.l_len = 0;

    let fd = file.as_raw_fd();
    loop {
        let rc = unsafe { libc::fcntl(fd, libc::F_SETLKW, &fl) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            log::warn!("advisory lock on image failed: {}", err);
            return Err(AfsError::Io(err));
        }
        // EINTR: retry, matching `acorn-fs.c`'s `lock_file` loop.
    }
}

/// Whole-file advisory locking is Unix-only; other targets skip it, as
/// spec.md §5 explicitly permits ("the implementation MAY skip locking
/// but MUST document this").
#[cfg(not(unix))]
fn lock_file(_file: &File, _writable: bool) -> AfsResult<()> {
    Ok(())
}

/// Opens `path` as an Acorn filing-system image, probing ADFS-simple,
/// then ADFS-interleaved, then falling back to DFS (spec.md §4.2).
/// Repeated opens of the same pathname return the registry's existing
/// handle rather than reopening the file (spec.md §4.2 step 6, §4.8).
pub fn open(path: &Path, writable: bool) -> AfsResult<HandleRef> {
    if let Some(existing) = registry::lookup(path) {
        return Ok(existing);
    }

    let mut opts = OpenOptions::new();
    opts.read(true).write(writable);
    let mut file = opts.open(path)?;

    lock_file(&file, writable)?;

    let filesystem = probe(&mut file)?;
    let handle: HandleRef = Arc::new(Mutex::new(filesystem));
    registry::register(path, handle.clone());
    Ok(handle)
}

/// Raw sentinel bytes (minus the leading, unchecked `\0`) for the simple
/// probe: `"Hugo"`.
const SIMPLE_PATTERN: &[u8] = b"Hugo";

/// Raw sentinel bytes (minus the leading, unchecked byte) for the
/// interleaved probe: `"Hugo"` doubled with a zero after each byte, plus
/// one further trailing zero (spec.md §4.2 step 4).
const INTERLEAVED_PATTERN: [u8; 9] = [0, b'H', 0, b'u', 0, b'g', 0, b'o', 0];

fn probe(file: &mut File) -> AfsResult<Filesystem> {
    match check_adfs(
        file,
        SIMPLE_PROBE_OFFSETS[0],
        SIMPLE_PROBE_OFFSETS[1],
        SIMPLE_PATTERN,
    ) {
        Ok(()) => {
            return Ok(Filesystem::Adfs {
                transport: Box::new(SimpleTransport::new(file.try_clone()?)),
                backend: AdfsBackend::new(),
            })
        }
        Err(AfsError::NotAcorn) => {}
        Err(e) => return Err(e),
    }

    match check_adfs(
        file,
        INTERLEAVED_PROBE_OFFSETS[0],
        INTERLEAVED_PROBE_OFFSETS[1],
        &INTERLEAVED_PATTERN,
    ) {
        Ok(()) => {
            return Ok(Filesystem::Adfs {
                transport: Box::new(InterleavedTransport::new(file.try_clone()?)),
                backend: AdfsBackend::new(),
            })
        }
        Err(AfsError::NotAcorn) => {}
        Err(e) => return Err(e),
    }

    let mut transport = SimpleTransport::new(file.try_clone()?);
    Catalogue::load(&mut transport)?;
    Ok(Filesystem::Dfs {
        transport: Box::new(transport),
        backend: DfsBackend::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adfs::dir::Directory;
    use crate::adfs::fsmap::AdfsFreeMap;
    use crate::transport::SECTOR_SIZE;
    use tempfile::NamedTempFile;

    #[test]
    fn opens_adfs_simple_image() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(1280 * 256).unwrap();
        let mut t = SimpleTransport::new(f.reopen().unwrap());
        Directory::new_empty(2, 2, "$").save(&mut t).unwrap();
        AdfsFreeMap::for_test(vec![(7, 1273)]).persist(&mut t).unwrap();
        drop(t);

        let handle = open(f.path(), false).unwrap();
        assert!(matches!(&*handle.lock().unwrap(), Filesystem::Adfs { .. }));
    }

    #[test]
    fn opens_interleaved_adfs_image() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(1280 * 256 * 2).unwrap();
        let mut t = InterleavedTransport::new(f.reopen().unwrap());
        Directory::new_empty(2, 2, "$").save(&mut t).unwrap();
        AdfsFreeMap::for_test(vec![(7, 1273)]).persist(&mut t).unwrap();
        drop(t);

        let handle = open(f.path(), false).unwrap();
        assert!(matches!(&*handle.lock().unwrap(), Filesystem::Adfs { .. }));
    }

    #[test]
    fn falls_back_to_dfs() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(1280 * 256).unwrap();
        let mut t = SimpleTransport::new(f.reopen().unwrap());
        // An all-zero catalogue: 0 entries, 0 total sectors, no ADFS
        // sentinel anywhere — valid DFS, not valid ADFS.
        t.write_sector(0, &[0u8; SECTOR_SIZE]).unwrap();
        t.write_sector(1, &[0u8; SECTOR_SIZE]).unwrap();
        drop(t);

        let handle = open(f.path(), false).unwrap();
        assert!(matches!(&*handle.lock().unwrap(), Filesystem::Dfs { .. }));
    }

    #[test]
    fn rejects_non_acorn_image() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(4096).unwrap();
        let path = f.path().to_path_buf();
        // random bytes: not a valid DFS catalogue (entry count byte nonzero
        // and not a multiple of 8) and no ADFS sentinel anywhere.
        {
            use std::io::Write as _;
            let mut file = f.reopen().unwrap();
            file.write_all(&[0xAAu8; 4096]).unwrap();
        }
        assert!(open(&path, false).is_err());
    }
}
