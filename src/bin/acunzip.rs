//! `acunzip <zip-file> ...` — extracts a zip archive, restoring the Acorn
//! metadata carried in each entry's extra field (id `0x4341`) as a `.inf`
//! sidecar (spec.md §6, grounded in `original_source/acunzip.c`).

use std::fs;
use std::io::Read;
use std::path::Path;

use afs_core::host::InfSidecar;
use afs_core::object::Attr;
use clap::Parser;
use zip::ZipArchive;

const ACORN_EXTRA_ID: u16 = 0x4341;

#[derive(Parser)]
#[command(name = "acunzip", about = "Extract a zip archive, restoring Acorn file metadata")]
struct Cli {
    #[arg(required = true)]
    archives: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let mut failures = 0usize;
    for archive in &cli.archives {
        if extract(archive).is_err() {
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn extract(path: &str) -> Result<(), ()> {
    let file = fs::File::open(path).map_err(|e| {
        eprintln!("acunzip: cannot open zip archive '{}': {}", path, e);
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| {
        eprintln!("acunzip: cannot open zip archive '{}': {}", path, e);
    })?;

    let mut failed = false;
    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("acunzip: unable to extract member {}: {}", i, e);
                failed = true;
                continue;
            }
        };
        let name = entry.name().to_string();
        if name.ends_with('/') {
            if let Err(e) = fs::create_dir_all(&name) {
                eprintln!("acunzip: unable to create directory '{}': {}", name, e);
                failed = true;
            }
            continue;
        }
        if let Some(parent) = Path::new(&name).parent() {
            let _ = fs::create_dir_all(parent);
        }

        let extra = entry.extra_data().to_vec();
        let mut data = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut data) {
            eprintln!("acunzip: unable to extract member '{}': {}", name, e);
            failed = true;
            continue;
        }
        if let Err(e) = fs::write(&name, &data) {
            eprintln!("acunzip: unable to open {} for writing: {}", name, e);
            failed = true;
            continue;
        }

        if let Some(field) = find_extra_field(&extra, ACORN_EXTRA_ID) {
            if let Err(e) = write_sidecar(&name, field, data.len() as u32) {
                eprintln!("acunzip: unable to write '{}.inf': {}", name, e);
                failed = true;
            }
        }
    }

    if failed {
        Err(())
    } else {
        Ok(())
    }
}

/// Parses the 4/8/16-byte Acorn extra-field payload (load[, exec[, attr]])
/// and writes the `.inf` sidecar alongside `name` (spec.md §6 `.inf`
/// format; byte layout grounded in `acunzip.c`'s inline reader).
fn write_sidecar(name: &str, field: &[u8], length: u32) -> std::io::Result<()> {
    if field.len() < 8 {
        return Ok(());
    }
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let load_addr = u32::from_le_bytes(field[4..8].try_into().unwrap());

    let (exec_addr, attr) = if field.len() >= 16 {
        let exec = u32::from_le_bytes(field[8..12].try_into().unwrap());
        let raw_attr = u32::from_le_bytes(field[12..16].try_into().unwrap());
        (exec, Attr::from_bits_truncate(raw_attr as u16))
    } else if field.len() >= 12 {
        (u32::from_le_bytes(field[8..12].try_into().unwrap()), Attr::empty())
    } else {
        (load_addr, Attr::empty())
    };

    let inf = InfSidecar {
        name: base,
        load_addr,
        exec_addr,
        length: Some(length),
        attr,
    };
    fs::write(format!("{}.inf", name), inf.write_line())
}

/// Scans a raw PKZIP extra-field blob (a sequence of `id:u16 LE, size:u16
/// LE, data` records) for the record whose id matches `id`.
fn find_extra_field(extra: &[u8], id: u16) -> Option<&[u8]> {
    let mut i = 0;
    while i + 4 <= extra.len() {
        let field_id = u16::from_le_bytes([extra[i], extra[i + 1]]);
        let size = u16::from_le_bytes([extra[i + 2], extra[i + 3]]) as usize;
        let start = i + 4;
        let end = start.checked_add(size)?;
        if end > extra.len() {
            return None;
        }
        if field_id == id {
            return Some(&extra[start..end]);
        }
        i = end;
    }
    None
}
