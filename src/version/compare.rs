//! Firmware version ordering
//!
//! Vendor version strings rarely follow semver (`V1.0.2.60_1.1.2`,
//! `23.05.3`, `1.2.3-beta`), so they are compared segment by segment:
//!
//! - An optional leading `v`/`V` before a digit is ignored.
//! - Segments are maximal runs of digits or of letters; every other
//!   character is a delimiter.
//! - Two numeric segments compare by value, two alphabetic segments compare
//!   case-insensitively, and a numeric segment always sorts before an
//!   alphabetic one.
//! - The shorter version is padded with `0` segments, so `1.2 == 1.2.0` and
//!   `1.2.3 < 1.2.3-beta`.
//!
//! Strings without any alphanumeric segment sort before every other version
//! and, among themselves, by plain string order. The ordering is a total
//! preorder and never fails.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    /// Digits with leading zeros removed
    Numeric(&'a str),
    Alpha(String),
}

impl Segment<'_> {
    fn cmp_segment(&self, other: &Segment) -> Ordering {
        match (self, other) {
            // Without leading zeros, a longer digit run is the larger number
            (Segment::Numeric(a), Segment::Numeric(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            (Segment::Numeric(_), Segment::Alpha(_)) => Ordering::Less,
            (Segment::Alpha(_), Segment::Numeric(_)) => Ordering::Greater,
        }
    }
}

fn strip_prefix(version: &str) -> &str {
    let trimmed = version.trim();
    match trimmed.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => trimmed,
    }
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    let version = strip_prefix(version);
    let mut result = Vec::new();
    let mut chars = version.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_ascii_digit() {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            result.push(Segment::Numeric(version[start..end].trim_start_matches('0')));
        } else if c.is_alphabetic() {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !next.is_alphabetic() {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            result.push(Segment::Alpha(version[start..end].to_lowercase()));
        }
    }

    result
}

/// Compare two version strings; `Greater` means `a` is newer than `b`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let left = segments(a);
    let right = segments(b);

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return a.cmp(b),
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    let zero = Segment::Numeric("");
    let len = left.len().max(right.len());
    (0..len)
        .map(|i| {
            let l = left.get(i).unwrap_or(&zero);
            let r = right.get(i).unwrap_or(&zero);
            l.cmp_segment(r)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// The item with the newest version, keeping the first of equally
/// ordered items
pub fn max_by_version<T, I, F>(items: I, version: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &str,
{
    items.into_iter().fold(None, |best, candidate| match best {
        Some(current)
            if compare_versions(version(&candidate), version(&current)) != Ordering::Greater =>
        {
            Some(current)
        }
        _ => Some(candidate),
    })
}
