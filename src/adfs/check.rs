//! The ADFS consistency checker: cross-validates the free-space map
//! against the set of reachable file/directory extents (spec.md §4.7).

use std::io::Write;

use super::dir::Directory;
use super::fsmap::AdfsFreeMap;
use crate::error::AfsResult;
use crate::object::{Attr, Object};
use crate::transport::SectorTransport;

/// Walks the whole tree, reports I1/I2/I6 violations as it goes, then
/// merges the collected used extents against the free-space map to check
/// I4/I5. Returns the number of diagnostics written to `sink`.
pub fn check(
    transport: &mut dyn SectorTransport,
    map: &AdfsFreeMap,
    sink: &mut dyn Write,
    image_name: &str,
) -> AfsResult<usize> {
    let mut failures = 0usize;
    let mut used: Vec<(u32, u32, String)> = Vec::new();

    walk_and_collect(
        transport,
        &Object::root(),
        0,
        "$",
        &mut used,
        sink,
        image_name,
        &mut failures,
    )?;

    let mut all: Vec<(u32, u32, String)> = map
        .entries()
        .iter()
        .map(|&(s, l)| (s, l, "(free)".to_string()))
        .collect();
    all.extend(used);
    all.sort_by_key(|&(s, _, _)| s);

    for w in all.windows(2) {
        let (s0, l0, ref n0) = w[0];
        let (s1, _l1, ref n1) = w[1];
        let delta = s0 as i64 + l0 as i64 - s1 as i64;
        if delta != 0 {
            failures += 1;
            let kind = if delta < 0 { "gap" } else { "overlap" };
            let _ = writeln!(sink, "{}: {} between {} and {}", image_name, kind, n0, n1);
        }
    }

    Ok(failures)
}

#[allow(clippy::too_many_arguments)]
fn walk_and_collect(
    transport: &mut dyn SectorTransport,
    obj: &Object,
    parent_sector: u32,
    path: &str,
    used: &mut Vec<(u32, u32, String)>,
    sink: &mut dyn Write,
    image_name: &str,
    failures: &mut usize,
) -> AfsResult<()> {
    let dir = match Directory::load(transport, obj.sector) {
        Ok(d) => d,
        Err(e) => {
            *failures += 1;
            let _ = writeln!(sink, "{}: {}: {}", image_name, path, e);
            return Ok(());
        }
    };

    if path != "$" && dir.parent_sector() != parent_sector {
        *failures += 1;
        let _ = writeln!(sink, "{}: {}: parent link mismatch", image_name, path);
    }

    used.push((obj.sector, Object::sectors_for(obj.length), path.to_string()));

    let entries = dir.entries();
    for w in entries.windows(2) {
        if w[0].name.to_uppercase() > w[1].name.to_uppercase() {
            *failures += 1;
            let _ = writeln!(sink, "{}: {}: entries out of order", image_name, path);
            break;
        }
    }

    for e in &entries {
        let child_path = format!("{}.{}", path, e.name);
        if e.attr.contains(Attr::DIR) {
            walk_and_collect(
                transport,
                &e.to_object(),
                obj.sector,
                &child_path,
                used,
                sink,
                image_name,
                failures,
            )?;
        } else {
            used.push((e.sector, Object::sectors_for(e.length), child_path));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adfs::fsmap::AdfsFreeMap;
    use crate::transport::SimpleTransport;
    use tempfile::NamedTempFile;

    fn fresh_image() -> SimpleTransport {
        let f = NamedTempFile::new().unwrap();
        f.as_file().set_len(1280 * 256).unwrap();
        let mut t = SimpleTransport::new(f.reopen().unwrap());
        let root = Directory::new_empty(2, 2, "$");
        root.save(&mut t).unwrap();
        t
    }

    #[test]
    fn pristine_image_has_no_diagnostics() {
        let mut t = fresh_image();
        // root occupies sectors 2..7, everything else is free
        let map = AdfsFreeMap::for_test(vec![(7, 1273)]);
        let mut sink = Vec::new();
        let failures = check(&mut t, &map, &mut sink, "test.img").unwrap();
        assert_eq!(failures, 0, "{}", String::from_utf8_lossy(&sink));
    }
}
