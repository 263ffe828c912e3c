//! Shared plumbing for the `afs*`/`ide2scsi`/`acunzip` binaries: argument
//! splitting, the listing-line format, and the `tool: name: message`
//! diagnostic convention (spec.md §6/§7). Pulled in with `#[path]` rather
//! than a crate module since it is CLI-only, not part of the core surface.

use std::path::PathBuf;

use afs_core::{AfsError, AfsResult, Filesystem, Object};
use clap::Parser;

/// Parses CLI args for `P`, exiting with the usage-error code (`1`) on a
/// parse failure rather than clap's own default exit code.
pub fn parse_or_exit<P: Parser>() -> P {
    match P::try_parse() {
        Ok(p) => p,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

/// Splits `image[:pattern]`; pattern defaults to `*` when omitted or empty.
pub fn split_image_pattern(arg: &str) -> (&str, &str) {
    match arg.split_once(':') {
        Some((image, pattern)) if !pattern.is_empty() => (image, pattern),
        Some((image, _)) => (image, "*"),
        None => (arg, "*"),
    }
}

/// Splits `image:path`, required form used by `afsmkdir`.
pub fn split_image_path(arg: &str) -> Option<(&str, &str)> {
    arg.split_once(':')
}

/// An `afscp` endpoint: Acorn (`image:path`) or host (no colon).
#[derive(Clone)]
pub enum Endpoint {
    Acorn { image: PathBuf, path: String },
    Host(PathBuf),
}

pub fn parse_endpoint(arg: &str) -> Endpoint {
    match arg.split_once(':') {
        Some((image, path)) => Endpoint::Acorn {
            image: PathBuf::from(image),
            path: if path.is_empty() { "$".to_string() } else { path.to_string() },
        },
        None => Endpoint::Host(PathBuf::from(arg)),
    }
}

/// One `afsls`/`afstree` listing line: `attrs load exec length sector path`.
pub fn listing_line(path: &str, obj: &Object) -> String {
    format!(
        "{} {:08x} {:08x} {:08x} {:5} {}",
        obj.attr.display_string(),
        obj.load_addr,
        obj.exec_addr,
        obj.length,
        obj.sector,
        path
    )
}

/// Prints the spec's `tool: name: message` diagnostic line to stderr.
pub fn diagnose(tool: &str, name: &str, err: &AfsError) {
    eprintln!("{}: {}: {}", tool, name, err);
}

pub fn open_image(image: &str, writable: bool) -> AfsResult<afs_core::registry::HandleRef> {
    afs_core::open(std::path::Path::new(image), writable)
}

/// A full walk, optionally rooted at `start` rather than `$` (`afstree`'s
/// `image[:start]` form; `Filesystem::walk` always starts at the root).
pub fn walk_from(
    fs: &mut Filesystem,
    start: &str,
    cb: &mut dyn FnMut(&str, &Object) -> AfsResult<()>,
) -> AfsResult<()> {
    match fs {
        Filesystem::Adfs { transport, backend } => {
            let start_obj = backend.find(transport.as_mut(), start)?;
            backend.walk(transport.as_mut(), &start_obj, cb)
        }
        Filesystem::Dfs { transport, backend } => backend.walk(transport.as_mut(), cb),
    }
}
