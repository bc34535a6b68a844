// SPDX-License-Identifier: MIT OR Apache-2.0
//! Escape-aware codec for hierarchical path selectors.
//!
//! On the wire, segments are joined by `/` and `!` escapes both itself and
//! `/` inside a segment.  This is a client-visible contract; the escape
//! discipline must be preserved bit-exactly.  Empty segments between
//! slashes are meaningful and survive a round trip.

/// Split a wire path into decoded segments.
///
/// `!x` decodes to a literal `x`; an unescaped `/` ends the current
/// segment.  A trailing lone `!` is kept literally.
#[must_use]
pub fn split(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '!' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('!'),
            },
            '/' => segments.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    segments.push(current);
    segments
}

/// Escape a single segment for the wire.
#[must_use]
pub fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == '!' || c == '/' {
            out.push('!');
        }
        out.push(c);
    }
    out
}

/// Join segments into a wire path, escaping as needed.
#[must_use]
pub fn join(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| escape(s))
        .collect::<Vec<_>>()
        .join("/")
}
