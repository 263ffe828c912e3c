//! `afscp [-r] src ... dest` — copy between Acorn images and the host,
//! distinguishing endpoints by the presence of a `:` (spec.md §6).

#[path = "common.rs"]
mod common;

use std::path::{Path, PathBuf};

use afs_core::host::{acorn_to_host, host_to_acorn, InfSidecar};
use afs_core::object::Attr;
use afs_core::{AfsError, AfsResult, Object};
use clap::Parser;
use common::Endpoint;

#[derive(Parser)]
#[command(name = "afscp", about = "Copy files between Acorn images and the host filesystem")]
struct Cli {
    /// Recurse into directories.
    #[arg(short = 'r', long = "recursive")]
    recursive: bool,

    /// Sources followed by a single destination.
    #[arg(required = true, num_args = 2..)]
    paths: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let (srcs, dest_arg) = cli.paths.split_at(cli.paths.len() - 1);
    let dest_arg = &dest_arg[0];
    let dest = common::parse_endpoint(dest_arg);
    let multi = srcs.len() > 1 || cli.recursive;

    let dest_dir = match is_directory(&dest) {
        Ok(b) => b,
        Err(e) => {
            common::diagnose("afscp", dest_arg, &e);
            std::process::exit(e.exit_code());
        }
    };
    if multi && !dest_dir {
        eprintln!("afscp: {}: destination must be a directory", dest_arg);
        std::process::exit(3);
    }

    let mut failures = 0usize;
    for src_arg in srcs {
        let src = common::parse_endpoint(src_arg);
        if let Err(e) = copy_one(&src, &dest, dest_dir, cli.recursive) {
            common::diagnose("afscp", src_arg, &e);
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn is_directory(ep: &Endpoint) -> AfsResult<bool> {
    match ep {
        Endpoint::Host(p) => Ok(p.is_dir()),
        Endpoint::Acorn { image, path } => {
            // Opened writable up front: the registry hands back the same
            // handle on every later open of this image, so the mode must
            // already match the writes `write_item`/`make_dir` will do.
            let handle = common::open_image(&image.to_string_lossy(), true)?;
            let mut fs = handle.lock().unwrap();
            match fs.find(path) {
                Ok(obj) => Ok(obj.is_dir()),
                Err(AfsError::NotFound) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}

fn split_parent(path: &str) -> (String, String) {
    match path.rfind('.') {
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => ("$".to_string(), path.to_string()),
    }
}

fn host_inf_path(p: &Path) -> PathBuf {
    let mut s = p.as_os_str().to_os_string();
    s.push(".inf");
    PathBuf::from(s)
}

fn host_basename(p: &Path) -> String {
    p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Writes one file's payload + metadata into `dest` (a concrete, final
/// item path, not a directory).
fn write_item(name: &str, load: u32, exec: u32, attr: Attr, data: &[u8], dest: &Endpoint) -> AfsResult<()> {
    match dest {
        Endpoint::Acorn { image, path } => {
            let handle = common::open_image(&image.to_string_lossy(), true)?;
            let mut fs = handle.lock().unwrap();
            let (parent, leaf) = split_parent(path);
            let obj = Object {
                name: if leaf.is_empty() { name.to_string() } else { leaf },
                load_addr: load,
                exec_addr: exec,
                length: data.len() as u32,
                sector: 0,
                attr,
                data: Some(data.to_vec()),
            };
            fs.save(&parent, &obj)
        }
        Endpoint::Host(p) => {
            std::fs::write(p, data)?;
            let inf = InfSidecar {
                name: name.to_string(),
                load_addr: load,
                exec_addr: exec,
                length: Some(data.len() as u32),
                attr,
            };
            std::fs::write(host_inf_path(p), inf.write_line())?;
            Ok(())
        }
    }
}

/// Builds the concrete per-item destination: `dest` itself when it names a
/// single file, or `dest/name` (joined per the destination's own path
/// syntax) when `dest` is a directory.
fn item_dest(dest: &Endpoint, dest_dir: bool, name: &str) -> Endpoint {
    if !dest_dir {
        return match dest {
            Endpoint::Host(p) => Endpoint::Host(p.clone()),
            Endpoint::Acorn { image, path } => Endpoint::Acorn { image: image.clone(), path: path.clone() },
        };
    }
    match dest {
        Endpoint::Host(p) => Endpoint::Host(p.join(name)),
        Endpoint::Acorn { image, path } => {
            let joined = if path == "$" { format!("$.{}", name) } else { format!("{}.{}", path, name) };
            Endpoint::Acorn { image: image.clone(), path: joined }
        }
    }
}

fn read_host_file(p: &Path) -> std::io::Result<(String, u32, u32, Attr, Vec<u8>)> {
    let data = std::fs::read(p)?;
    let inf_path = host_inf_path(p);
    if let Ok(line) = std::fs::read_to_string(&inf_path) {
        if let Some(inf) = InfSidecar::parse(line.trim()) {
            return Ok((inf.name, inf.load_addr, inf.exec_addr, inf.attr, data));
        }
    }
    let name = host_to_acorn(&host_basename(p), 10);
    Ok((name, 0, 0, Attr::empty(), data))
}

fn copy_one(src: &Endpoint, dest: &Endpoint, dest_dir: bool, recursive: bool) -> AfsResult<()> {
    match src {
        Endpoint::Acorn { image, path } => {
            let handle = common::open_image(&image.to_string_lossy(), false)?;
            let mut fs = handle.lock().unwrap();
            let obj = fs.find(path)?;
            if obj.is_dir() {
                if !recursive {
                    return Err(AfsError::NotSupported);
                }
                let (_, leaf) = split_parent(path);
                let dest_name = match dest {
                    Endpoint::Host(_) => acorn_to_host(&leaf, 255),
                    Endpoint::Acorn { .. } => leaf,
                };
                let mut entries = Vec::new();
                common::walk_from(&mut fs, path, &mut |p, o| {
                    entries.push((p.to_string(), o.clone()));
                    Ok(())
                })?;
                drop(fs);
                copy_acorn_tree(&handle, &entries, &item_dest(dest, dest_dir, &dest_name))
            } else {
                let data = fs.load(&obj)?;
                drop(fs);
                let dest_name = match dest {
                    Endpoint::Host(_) => acorn_to_host(&obj.name, 255),
                    Endpoint::Acorn { .. } => obj.name.clone(),
                };
                let target = item_dest(dest, dest_dir, &dest_name);
                write_item(&dest_name, obj.load_addr, obj.exec_addr, obj.attr, &data, &target)
            }
        }
        Endpoint::Host(p) => {
            if p.is_dir() {
                if !recursive {
                    return Err(AfsError::NotSupported);
                }
                let name = host_basename(p);
                copy_host_tree(p, &item_dest(dest, dest_dir, &host_to_acorn(&name, 10)))
            } else {
                let (name, load, exec, attr, data) =
                    read_host_file(p).map_err(AfsError::Io)?;
                let target = item_dest(dest, dest_dir, &name);
                write_item(&name, load, exec, attr, &data, &target)
            }
        }
    }
}

/// Joins an Acorn dot-path (`rel`, as produced by `walk_from`) onto
/// `dest_base`: one nested host path component per segment, translating
/// each through the host character mapping, or one more dot-segment for an
/// Acorn destination (which already uses the same separator).
fn acorn_rel_into(dest_base: &Endpoint, rel: &str) -> Endpoint {
    match dest_base {
        Endpoint::Host(p) => {
            let mut out = p.clone();
            for seg in rel.split('.') {
                out.push(acorn_to_host(seg, 255));
            }
            Endpoint::Host(out)
        }
        Endpoint::Acorn { image, path } => {
            let joined = if path == "$" { format!("$.{}", rel) } else { format!("{}.{}", path, rel) };
            Endpoint::Acorn { image: image.clone(), path: joined }
        }
    }
}

fn copy_acorn_tree(
    src_handle: &afs_core::registry::HandleRef,
    entries: &[(String, Object)],
    dest_base: &Endpoint,
) -> AfsResult<()> {
    make_dir(dest_base)?;
    for (rel, obj) in entries {
        let target = acorn_rel_into(dest_base, rel);
        if obj.is_dir() {
            make_dir(&target)?;
        } else {
            let data = {
                let mut fs = src_handle.lock().unwrap();
                fs.load(obj)?
            };
            let name = match &target {
                Endpoint::Host(_) => acorn_to_host(&obj.name, 255),
                Endpoint::Acorn { .. } => obj.name.clone(),
            };
            write_item(&name, obj.load_addr, obj.exec_addr, obj.attr, &data, &target)?;
        }
    }
    Ok(())
}

fn copy_host_tree(src_dir: &Path, dest_base: &Endpoint) -> AfsResult<()> {
    make_dir(dest_base)?;
    let mut stack = vec![(src_dir.to_path_buf(), dest_base.clone())];
    while let Some((dir, dest)) = stack.pop() {
        for entry in std::fs::read_dir(&dir).map_err(AfsError::Io)? {
            let entry = entry.map_err(AfsError::Io)?;
            let path = entry.path();
            if path.extension().map(|e| e == "inf").unwrap_or(false) {
                continue;
            }
            let name = host_basename(&path);
            if path.is_dir() {
                let child_name = host_to_acorn(&name, 10);
                let child_dest = append_relative(&dest, &child_name);
                make_dir(&child_dest)?;
                stack.push((path, child_dest));
            } else {
                let (acorn_name, load, exec, attr, data) =
                    read_host_file(&path).map_err(AfsError::Io)?;
                let target = append_relative(&dest, &acorn_name);
                write_item(&acorn_name, load, exec, attr, &data, &target)?;
            }
        }
    }
    Ok(())
}

fn append_relative(base: &Endpoint, rel: &str) -> Endpoint {
    match base {
        Endpoint::Host(p) => Endpoint::Host(p.join(rel)),
        Endpoint::Acorn { image, path } => {
            let joined = if path == "$" { format!("$.{}", rel) } else { format!("{}.{}", path, rel) };
            Endpoint::Acorn { image: image.clone(), path: joined }
        }
    }
}

fn make_dir(target: &Endpoint) -> AfsResult<()> {
    match target {
        Endpoint::Host(p) => {
            std::fs::create_dir_all(p)?;
            Ok(())
        }
        Endpoint::Acorn { image, path } => {
            let handle = common::open_image(&image.to_string_lossy(), true)?;
            let mut fs = handle.lock().unwrap();
            match fs.mkdir(path) {
                Ok(()) | Err(AfsError::Exists) => Ok(()),
                Err(e) => Err(e),
            }
        }
    }
}
