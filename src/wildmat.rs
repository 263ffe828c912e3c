//! Case-insensitive wildcard matcher with the "ordered" return convention
//! sorted directory scans need to short-circuit (spec.md §4.3).
//!
//! `*` matches zero or more characters within one path segment (callers
//! split patterns on `.` before invoking this); `#` matches exactly one
//! character. [`Ordering::Equal`] means "match"; [`Ordering::Greater`]
//! means the candidate is past anything the pattern could still match, so
//! a sorted scan can stop; [`Ordering::Less`] means keep scanning.

use std::cmp::Ordering;

/// Compares a single path segment `candidate` against `pattern`.
pub fn wildmat(pattern: &str, candidate: &str) -> Ordering {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_uppercase()).collect();
    let c: Vec<char> = candidate.chars().map(|c| c.to_ascii_uppercase()).collect();
    cmp(&p, &c)
}

/// Convenience boolean form for call sites that don't need the ordering.
pub fn matches(pattern: &str, candidate: &str) -> bool {
    wildmat(pattern, candidate) == Ordering::Equal
}

fn cmp(p: &[char], c: &[char]) -> Ordering {
    match p.first() {
        None => {
            if c.is_empty() {
                Ordering::Equal
            } else {
                // pattern exhausted but candidate has more: candidate sorts
                // after anything this pattern could match.
                Ordering::Greater
            }
        }
        Some('*') => {
            for take in 0..=c.len() {
                match cmp(&p[1..], &c[take..]) {
                    Ordering::Equal => return Ordering::Equal,
                    Ordering::Less => return Ordering::Less,
                    Ordering::Greater => continue,
                }
            }
            Ordering::Greater
        }
        Some('#') => {
            if c.is_empty() {
                Ordering::Less
            } else {
                cmp(&p[1..], &c[1..])
            }
        }
        Some(&pc) => match c.first() {
            None => Ordering::Less,
            Some(&cc) => match cc.cmp(&pc) {
                Ordering::Equal => cmp(&p[1..], &c[1..]),
                other => other,
            },
        },
    }
}
