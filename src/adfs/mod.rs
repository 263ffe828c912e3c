//! The ADFS "old-map" backend: free-space map, hierarchical directory
//! engine, structural checker (spec.md §4.4-§4.7).

pub mod check;
pub mod dir;
pub mod fsmap;

use std::io::Write;

use dir::{Directory, SearchResult, DIR_BYTES, DIR_SECTORS};
use fsmap::AdfsFreeMap;

use crate::error::{AfsError, AfsResult};
use crate::object::{Attr, Object};
use crate::transport::{SectorTransport, SECTOR_SIZE};

/// ADFS probe offsets and the zero-interleaved sentinel pattern used by the
/// image opener (spec.md §4.2).
pub const SIMPLE_PROBE_OFFSETS: [u64; 2] = [0x200, 0x6FA];
pub const INTERLEAVED_PROBE_OFFSETS: [u64; 2] = [0x400, 0xDF4];

fn split_path(path: &str) -> Vec<String> {
    let trimmed = if let Some(rest) = path.strip_prefix("$.") {
        rest
    } else if path == "$" {
        ""
    } else {
        path
    };
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('.').map(|s| s.to_string()).collect()
    }
}

fn write_payload(
    transport: &mut dyn SectorTransport,
    start_sector: u32,
    data: &[u8],
) -> AfsResult<()> {
    let n_sectors = Object::sectors_for(data.len() as u32);
    let mut padded = vec![0u8; n_sectors as usize * SECTOR_SIZE];
    padded[..data.len()].copy_from_slice(data);
    for i in 0..n_sectors {
        let mut sec = [0u8; SECTOR_SIZE];
        let off = i as usize * SECTOR_SIZE;
        sec.copy_from_slice(&padded[off..off + SECTOR_SIZE]);
        transport.write_sector(start_sector + i, &sec)?;
    }
    Ok(())
}

/// State owned by an open ADFS handle: the lazily-loaded free-space map.
#[derive(Default)]
pub struct AdfsBackend {
    map: Option<AdfsFreeMap>,
}

impl AdfsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, transport: &mut dyn SectorTransport) -> AfsResult<&mut AdfsFreeMap> {
        if self.map.is_none() {
            self.map = Some(AdfsFreeMap::load(transport)?);
        }
        Ok(self.map.as_mut().unwrap())
    }

    pub fn find(&mut self, transport: &mut dyn SectorTransport, path: &str) -> AfsResult<Object> {
        let segments = split_path(path);
        let mut current = Object::root();
        for seg in &segments {
            if !current.is_dir() {
                return Err(AfsError::NotDir);
            }
            let dir = Directory::load(transport, current.sector)?;
            match dir.search(seg) {
                SearchResult::Found { entry, .. } => current = entry.to_object(),
                SearchResult::NotFound { .. } => return Err(AfsError::NotFound),
            }
        }
        Ok(current)
    }

    pub fn glob(
        &mut self,
        transport: &mut dyn SectorTransport,
        pattern: &str,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        let segments = split_path(pattern);
        if segments.is_empty() {
            return Ok(());
        }
        self.glob_rec(transport, &Object::root(), &segments, "", cb)
    }

    fn glob_rec(
        &mut self,
        transport: &mut dyn SectorTransport,
        dir_obj: &Object,
        segments: &[String],
        prefix: &str,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        let dir = Directory::load(transport, dir_obj.sector)?;
        let (seg, rest) = (&segments[0], &segments[1..]);

        for e in dir.entries() {
            if !crate::wildmat::matches(seg, &e.name) {
                continue;
            }
            let full_path = if prefix.is_empty() {
                e.name.clone()
            } else {
                format!("{}.{}", prefix, e.name)
            };
            if rest.is_empty() {
                cb(&full_path, &e.to_object())?;
            } else if e.attr.contains(Attr::DIR) {
                self.glob_rec(transport, &e.to_object(), rest, &full_path, cb)?;
            }
        }
        Ok(())
    }

    pub fn walk(
        &mut self,
        transport: &mut dyn SectorTransport,
        start: &Object,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        self.walk_rec(transport, start, "", cb)
    }

    fn walk_rec(
        &mut self,
        transport: &mut dyn SectorTransport,
        dir_obj: &Object,
        prefix: &str,
        cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
    ) -> AfsResult<()> {
        let dir = Directory::load(transport, dir_obj.sector)?;
        for e in dir.entries() {
            let full_path = if prefix.is_empty() {
                e.name.clone()
            } else {
                format!("{}.{}", prefix, e.name)
            };
            cb(&full_path, &e.to_object())?;
            if e.attr.contains(Attr::DIR) {
                self.walk_rec(transport, &e.to_object(), &full_path, cb)?;
            }
        }
        Ok(())
    }

    pub fn load_data(
        &mut self,
        transport: &mut dyn SectorTransport,
        object: &Object,
    ) -> AfsResult<Vec<u8>> {
        let n_sectors = object.sectors();
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

    /// `Save`: allocate/replace the object's extent and insert its entry
    /// into `dest_dir` (spec.md §4.5). Writes the free-space map last, per
    /// the save-ordering guidance in spec.md §5.
    pub fn save(
        &mut self,
        transport: &mut dyn SectorTransport,
        dest_dir: &Object,
        object: &Object,
    ) -> AfsResult<()> {
        if !dest_dir.is_dir() {
            return Err(AfsError::NotDir);
        }
        let mut dir = Directory::load(transport, dest_dir.sector)?;
        let mut entries = dir.entries();

        let index = match dir.search(&object.name) {
            SearchResult::Found { entry, index } => {
                self.map_mut(transport)?
                    .release(entry.sector, Object::sectors_for(entry.length))?;
                entries.remove(index);
                index
            }
            SearchResult::NotFound {
                insert_at: Some(i),
            } => i,
            SearchResult::NotFound { insert_at: None } => return Err(AfsError::DirFull),
        };

        let n_sectors = Object::sectors_for(object.length);
        let start_sector = if n_sectors == 0 {
            0
        } else {
            self.map_mut(transport)?.allocate(n_sectors)?
        };

        if let Some(data) = &object.data {
            write_payload(transport, start_sector, data)?;
        }

        let mut entry = dir::DirEntry::from_object(object);
        entry.sector = start_sector;
        entries.insert(index, entry);

        dir.set_entries(&entries)?;
        dir.save(transport)?;
        self.map_mut(transport)?.persist(transport)?;
        Ok(())
    }

    /// `Mkdir`: synthesizes an empty directory page and inserts an entry
    /// for it (spec.md §4.5).
    pub fn mkdir(
        &mut self,
        transport: &mut dyn SectorTransport,
        parent: &Object,
        name: &str,
    ) -> AfsResult<()> {
        if !parent.is_dir() {
            return Err(AfsError::NotDir);
        }
        let mut dir = Directory::load(transport, parent.sector)?;
        let mut entries = dir.entries();

        let index = match dir.search(name) {
            SearchResult::Found { .. } => return Err(AfsError::Exists),
            SearchResult::NotFound {
                insert_at: Some(i),
            } => i,
            SearchResult::NotFound { insert_at: None } => return Err(AfsError::DirFull),
        };

        let new_sector = self.map_mut(transport)?.allocate(DIR_SECTORS)?;
        let new_dir = Directory::new_empty(new_sector, parent.sector, name);
        new_dir.save(transport)?;

        let entry = dir::DirEntry {
            name: name.to_string(),
            attr: Attr::new_dir_defaults(),
            load_addr: 0,
            exec_addr: 0,
            length: DIR_BYTES as u32,
            sector: new_sector,
        };
        entries.insert(index, entry);

        dir.set_entries(&entries)?;
        dir.save(transport)?;
        self.map_mut(transport)?.persist(transport)?;
        Ok(())
    }

    /// `Settitle`: rewrites the root directory's title field.
    pub fn settitle(&mut self, transport: &mut dyn SectorTransport, text: &str) -> AfsResult<()> {
        let mut root = Directory::load(transport, Object::root().sector)?;
        root.set_title(text);
        root.save(transport)
    }

    pub fn check(
        &mut self,
        transport: &mut dyn SectorTransport,
        sink: &mut dyn Write,
        image_name: &str,
    ) -> AfsResult<usize> {
        let map = self.map_mut(transport)?.clone();
        check::check(transport, &map, sink, image_name)
    }
}
