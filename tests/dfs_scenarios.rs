//! End-to-end DFS scenarios driven through the public `Filesystem`
//! surface (spec.md §8: P1, P3, scenario 5).

mod common;

use afs_core::dfs::Catalogue;
use afs_core::object::{Attr, Object};
use afs_core::Filesystem;

fn fresh_fs(total_sectors: u32) -> (tempfile::NamedTempFile, Filesystem) {
    let (f, t) = common::blank_dfs(total_sectors);
    (
        f,
        Filesystem::Dfs {
            transport: Box::new(t),
            backend: Default::default(),
        },
    )
}

#[test]
fn three_saves_keep_decreasing_start_sector_order() {
    let (_f, mut fs) = fresh_fs(800);
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
        fs.save("$", &obj).unwrap();
    }

    let mut seen = Vec::new();
    fs.glob("$.*", |path, obj| {
        seen.push((path.to_string(), obj.sector));
        Ok(())
    })
    .unwrap();
    assert_eq!(seen.len(), 3);
    for w in seen.windows(2) {
        assert!(w[1].1 < w[0].1, "entries must be in decreasing sector order");
    }
}

#[test]
fn save_then_find_then_load_round_trips() {
    let (_f, mut fs) = fresh_fs(800);
    let obj = Object {
        name: "HELLO".to_string(),
        load_addr: 0x1900,
        exec_addr: 0x1900,
        length: 7,
        sector: 0,
        attr: Attr::LOCKED,
        data: Some(b"WORLD!\n".to_vec()),
    };
    fs.save("$", &obj).unwrap();

    let found = fs.find("$.HELLO").unwrap();
    assert_eq!(found.load_addr, 0x1900);
    assert!(found.attr.contains(Attr::LOCKED));
    assert_eq!(fs.load(&found).unwrap(), b"WORLD!\n");
}

#[test]
fn remove_then_find_fails() {
    let (_f, mut fs) = fresh_fs(800);
    let obj = Object {
        name: "GONE".to_string(),
        load_addr: 0,
        exec_addr: 0,
        length: 1,
        sector: 0,
        attr: Attr::empty(),
        data: Some(vec![0u8]),
    };
    fs.save("$", &obj).unwrap();
    assert_eq!(fs.remove("$.GONE").unwrap(), 1);
    assert!(fs.find("$.GONE").is_err());
}

#[test]
fn mkdir_not_supported_on_dfs() {
    let (_f, mut fs) = fresh_fs(800);
    assert!(matches!(
        fs.mkdir("NEWDIR"),
        Err(afs_core::AfsError::NotSupported)
    ));
}

#[test]
fn settitle_is_idempotent() {
    let (f, mut fs) = fresh_fs(800);
    fs.settitle("MY DISC").unwrap();
    drop(fs);
    let bytes_once = std::fs::read(f.path()).unwrap();

    let mut t = common::reopen(&f);
    let cat_before = Catalogue::load(&mut t).unwrap();
    let mut fs2 = Filesystem::Dfs {
        transport: Box::new(t),
        backend: Default::default(),
    };
    fs2.settitle("MY DISC").unwrap();
    drop(fs2);
    let bytes_twice = std::fs::read(f.path()).unwrap();

    assert_eq!(bytes_once, bytes_twice);
    assert_eq!(cat_before.title(), "MY DISC");
}
