//! Host interchange helpers: the Acorn/host character mapping and the
//! `.inf` sidecar format (spec.md §6, grounded in `original_source/
//! acunzip.c`'s inline `.inf` writer).

use crate::object::Attr;

const HOST_CHARS: &[u8] = b"#$%&.?@^";
const ACORN_CHARS: &[u8] = b"?<;+/#=>";

/// Maps a host-legal filename to its Acorn-legal equivalent, truncating to
/// `max_len` characters.
pub fn host_to_acorn(name: &str, max_len: usize) -> String {
    translate(name, HOST_CHARS, ACORN_CHARS, max_len)
}

/// Maps an Acorn-legal filename to its host-legal equivalent, truncating to
/// `max_len` characters.
pub fn acorn_to_host(name: &str, max_len: usize) -> String {
    translate(name, ACORN_CHARS, HOST_CHARS, max_len)
}

fn translate(name: &str, from: &[u8], to: &[u8], max_len: usize) -> String {
    name.bytes()
        .map(|b| match from.iter().position(|&f| f == b) {
            Some(i) => to[i] as char,
            None => b as char,
        })
        .take(max_len)
        .collect()
}

/// A parsed `.inf` sidecar: `NAME LOAD EXEC [LENGTH [ATTR]]`, fields after
/// NAME hexadecimal, with the legacy trailing `L`/`l` locked shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfSidecar {
    pub name: String,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub length: Option<u32>,
    pub attr: Attr,
}

impl InfSidecar {
    pub fn parse(line: &str) -> Option<InfSidecar> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?.to_string();
        let load_addr = u32::from_str_radix(fields.next()?, 16).ok()?;

        let mut exec_addr = load_addr;
        let mut length = None;
        let mut attr = Attr::empty();

        if let Some(exec) = fields.next() {
            if exec.eq_ignore_ascii_case("l") {
                attr |= Attr::LOCKED;
            } else {
                exec_addr = u32::from_str_radix(exec, 16).ok()?;
            }
        }

        if let Some(len) = fields.next() {
            if len.eq_ignore_ascii_case("l") {
                attr |= Attr::LOCKED;
            } else {
                length = Some(u32::from_str_radix(len, 16).ok()?);
            }
        }

        if let Some(a) = fields.next() {
            if a.eq_ignore_ascii_case("l") {
                attr |= Attr::LOCKED;
            } else {
                attr |= Attr::from_bits_truncate(u16::from_str_radix(a, 16).ok()?);
            }
        }

        Some(InfSidecar {
            name,
            load_addr,
            exec_addr,
            length,
            attr,
        })
    }

    pub fn write_line(&self) -> String {
        let mut line = format!(
            "{} {:08X} {:08X}",
            self.name, self.load_addr, self.exec_addr
        );
        if let Some(len) = self.length {
            line.push_str(&format!(" {:08X}", len));
        }
        if self.attr.contains(Attr::LOCKED) {
            line.push_str(" L");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_mapping_round_trips() {
        let acorn = "FOO<BAR";
        let host = acorn_to_host(acorn, 255);
        assert_eq!(host, "FOO$BAR");
        assert_eq!(host_to_acorn(&host, 255), acorn);
    }

    #[test]
    fn truncates_to_max_len() {
        assert_eq!(acorn_to_host("ABCDEFGH", 4), "ABCD");
    }

    #[test]
    fn parses_minimal_inf_line() {
        let inf = InfSidecar::parse("HELLO FFFF1900 FFFF1900").unwrap();
        assert_eq!(inf.name, "HELLO");
        assert_eq!(inf.load_addr, 0xFFFF1900);
        assert_eq!(inf.exec_addr, 0xFFFF1900);
        assert_eq!(inf.length, None);
        assert!(!inf.attr.contains(Attr::LOCKED));
    }

    #[test]
    fn parses_locked_shorthand() {
        let inf = InfSidecar::parse("HELLO FFFF1900 FFFF8023 7 L").unwrap();
        assert_eq!(inf.length, Some(7));
        assert!(inf.attr.contains(Attr::LOCKED));
    }
}
