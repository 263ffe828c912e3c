//! Process-wide open-image registry: reuse-by-pathname and bulk close
//! (spec.md §4.8, §9 "process-wide registry").

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::fs::Filesystem;

pub type HandleRef = Arc<Mutex<Filesystem>>;

static REGISTRY: OnceLock<Mutex<Vec<(PathBuf, HandleRef)>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<(PathBuf, HandleRef)>> {
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Returns the already-open handle for `path`, if one exists whose last
/// external reference hasn't already been dropped.
pub fn lookup(path: &Path) -> Option<HandleRef> {
    let canon = canonical(path);
    let mut reg = registry().lock().unwrap();
    reg.retain(|(_, h)| Arc::strong_count(h) > 1);
    reg.iter().find(|(p, _)| *p == canon).map(|(_, h)| h.clone())
}

/// Registers a freshly opened handle, returning the reference callers
/// should use (duplicate-open is the caller's responsibility to check via
/// [`lookup`] first, matching spec.md §4.8 "duplicate-open returns the
/// existing handle unchanged").
pub fn register(path: &Path, handle: HandleRef) {
    let canon = canonical(path);
    registry().lock().unwrap().push((canon, handle));
}

/// Bulk close: clears the process-wide list. Handles still held by a
/// caller remain usable; they simply stop being shared on a subsequent
/// open of the same pathname.
pub fn close_all() {
    registry().lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimpleTransport;
    use crate::dfs::DfsBackend;
    use tempfile::NamedTempFile;

    #[test]
    fn duplicate_open_shares_handle() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(4096).unwrap();
        let path = f.path().to_path_buf();

        let handle: HandleRef = Arc::new(Mutex::new(Filesystem::Dfs {
            transport: Box::new(SimpleTransport::new(f.reopen().unwrap())),
            backend: DfsBackend::new(),
        }));
        register(&path, handle.clone());

        let again = lookup(&path).expect("handle should be registered");
        assert!(Arc::ptr_eq(&handle, &again));
    }

    #[test]
    fn close_all_empties_registry() {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(4096).unwrap();
        let path = f.path().to_path_buf();
        let handle: HandleRef = Arc::new(Mutex::new(Filesystem::Dfs {
            transport: Box::new(SimpleTransport::new(f.reopen().unwrap())),
            backend: DfsBackend::new(),
        }));
        register(&path, handle);
        close_all();
        assert!(lookup(&path).is_none());
    }
}
