//! The dispatcher: a `Filesystem` handle exposing one method set over
//! either backend (spec.md §4.8, §9 "model `Filesystem` as a capability
//! set ... with two variants").

use std::io::Write;

use crate::adfs::AdfsBackend;
use crate::dfs::DfsBackend;
use crate::error::{AfsError, AfsResult};
use crate::object::Object;
use crate::transport::SectorTransport;

/// An open image. Dispatch replaces the original C source's
/// function-pointer struct with a plain `match`.
pub enum Filesystem {
    Adfs {
        transport: Box<dyn SectorTransport>,
        backend: AdfsBackend,
    },
    Dfs {
        transport: Box<dyn SectorTransport>,
        backend: DfsBackend,
    },
}

impl Filesystem {
    pub fn find(&mut self, path: &str) -> AfsResult<Object> {
        match self {
            Filesystem::Adfs { transport, backend } => backend.find(transport.as_mut(), path),
            Filesystem::Dfs { transport, backend } => backend.find(transport.as_mut(), path),
        }
    }

    pub fn glob(
        &mut self,
        pattern: &str,
        mut cb: impl FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                backend.glob(transport.as_mut(), pattern, &mut cb)
            }
            Filesystem::Dfs { transport, backend } => {
                backend.glob(transport.as_mut(), pattern, &mut cb)
            }
        }
    }

    pub fn walk(&mut self, mut cb: impl FnMut(&str, &Object) -> AfsResult<()>) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                backend.walk(transport.as_mut(), &Object::root(), &mut cb)
            }
            Filesystem::Dfs { transport, backend } => backend.walk(transport.as_mut(), &mut cb),
        }
    }

    pub fn load(&mut self, object: &Object) -> AfsResult<Vec<u8>> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                backend.load_data(transport.as_mut(), object)
            }
            Filesystem::Dfs { transport, backend } => backend.load_data(transport.as_mut(), object),
        }
    }

    /// Saves `object` into `dest_path` (an ADFS directory path, ignored by
    /// the DFS backend which is single-level and always saves under `$`).
    pub fn save(&mut self, dest_path: &str, object: &Object) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                let dest_dir = backend.find(transport.as_mut(), dest_path)?;
                backend.save(transport.as_mut(), &dest_dir, object)
            }
            Filesystem::Dfs { transport, backend } => {
                let letter = dest_path.chars().next().unwrap_or('$');
                backend.save(transport.as_mut(), object, letter)
            }
        }
    }

    pub fn mkdir(&mut self, path: &str) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                let (parent_path, name) = split_parent(path);
                let parent = backend.find(transport.as_mut(), &parent_path)?;
                backend.mkdir(transport.as_mut(), &parent, &name)
            }
            Filesystem::Dfs { transport, backend } => backend.mkdir(transport.as_mut(), path),
        }
    }

    /// `Remove`: DFS-only (spec.md §4.6/§6).
    pub fn remove(&mut self, pattern: &str) -> AfsResult<usize> {
        match self {
            Filesystem::Adfs { .. } => Err(AfsError::NotSupported),
            Filesystem::Dfs { transport, backend } => backend.remove(transport.as_mut(), pattern),
        }
    }

    pub fn settitle(&mut self, text: &str) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                backend.settitle(transport.as_mut(), text)
            }
            Filesystem::Dfs { transport, backend } => backend.settitle(transport.as_mut(), text),
        }
    }

    pub fn check(&mut self, sink: &mut dyn Write, image_name: &str) -> AfsResult<usize> {
        match self {
            Filesystem::Adfs { transport, backend } => {
                backend.check(transport.as_mut(), sink, image_name)
            }
            Filesystem::Dfs { transport, backend } => {
                backend.check(transport.as_mut(), sink, image_name)
            }
        }
    }

    pub fn rdsect(&mut self, sector: u32, buf: &mut [u8]) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, .. } => transport.read(sector, buf),
            Filesystem::Dfs { transport, .. } => transport.read(sector, buf),
        }
    }

    pub fn wrsect(&mut self, sector: u32, buf: &[u8]) -> AfsResult<()> {
        match self {
            Filesystem::Adfs { transport, .. } => transport.write(sector, buf),
            Filesystem::Dfs { transport, .. } => transport.write(sector, buf),
        }
    }
}

fn split_parent(path: &str) -> (String, String) {
    match path.rfind('.') {
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => ("$".to_string(), path.to_string()),
    }
}
