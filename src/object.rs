//! The object descriptor: the in-memory handle for a file or directory,
//! and the attribute bitset carried in its high bits.

use bitflags::bitflags;

bitflags! {
    /// Attribute bits, one per high bit of the first nine bytes of an ADFS
    /// directory entry's name field (bytes 0..8 in that order), and (for
    /// DFS) the single LOCKED bit packed into the directory-letter byte.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
    pub struct Attr: u16 {
        const UREAD  = 1 << 0;
        const UWRITE = 1 << 1;
        const LOCKED = 1 << 2;
        const DIR    = 1 << 3;
        const UEXEC  = 1 << 4;
        const OREAD  = 1 << 5;
        const OWRITE = 1 << 6;
        const OEXEC  = 1 << 7;
        const PRIV   = 1 << 8;
    }
}

impl Attr {
    /// Default attributes synthesized for a freshly-made directory
    /// (`Mkdir` in spec.md §4.5): `DIR|LOCKED|UREAD`.
    pub fn new_dir_defaults() -> Self {
        Attr::DIR | Attr::LOCKED | Attr::UREAD
    }

    /// Renders attributes the way `afsls`/`afstree` print them: one letter
    /// per bit, in the fixed order the original `acorn_fs_info` table uses,
    /// `-` where the bit is clear.
    pub fn display_string(&self) -> String {
        const LETTERS: [(Attr, char); 9] = [
            (Attr::DIR, 'D'),
            (Attr::LOCKED, 'L'),
            (Attr::UREAD, 'R'),
            (Attr::UWRITE, 'W'),
            (Attr::UEXEC, 'E'),
            (Attr::OREAD, 'r'),
            (Attr::OWRITE, 'w'),
            (Attr::OEXEC, 'e'),
            (Attr::PRIV, 'P'),
        ];

        LETTERS
            .iter()
            .map(|&(bit, ch)| if self.contains(bit) { ch } else { '-' })
            .collect()
    }
}

/// The in-memory handle for a file or directory (spec.md §3 "Object
/// descriptor").
#[derive(Clone, Debug)]
pub struct Object {
    pub name: String,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub length: u32,
    pub sector: u32,
    pub attr: Attr,
    /// Present only after an explicit load; absent on a bare directory-scan
    /// result (spec.md §3 "Lifecycle").
    pub data: Option<Vec<u8>>,
}

impl Object {
    /// Fabricates the root directory object: sector 2, length 1280, `DIR`
    /// set, used by `find`/`glob`/`walk`/`settitle` (spec.md §9 "reuse
    /// `make_root` across all four").
    pub fn root() -> Self {
        Object {
            name: "$".to_string(),
            load_addr: 0,
            exec_addr: 0,
            length: 1280,
            sector: 2,
            attr: Attr::DIR | Attr::UREAD | Attr::OREAD,
            data: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attr.contains(Attr::DIR)
    }

    /// `sectors(n) = ceil(n/256)` for n>0, else 0 (spec.md I8).
    pub fn sectors_for(length: u32) -> u32 {
        if length == 0 {
            0
        } else {
            (length + 255) / 256
        }
    }

    pub fn sectors(&self) -> u32 {
        Self::sectors_for(self.length)
    }

    /// Releases owned payload data, matching the "freed explicitly after
    /// save or on descriptor disposal" lifecycle rule.
    pub fn free_data(&mut self) {
        self.data = None;
    }
}
