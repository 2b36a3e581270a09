//! # Abbreviation-Tolerant Option Matching
//!
//! Every enumerated command-line switch accepts any unambiguous,
//! case-insensitive prefix of one of its canonical names, so `-d ren`
//! selects `render` and `-p SW` selects `swirly`.
//!
//! ## Matching Rules
//!
//! Prefix lengths are widened one character at a time. At each length `k`
//! the first `k` characters of the query are compared, ignoring ASCII case,
//! with the first `k` characters of every entry:
//!
//! - exactly one entry agrees: that entry is the result
//! - no entry agrees: the query is unknown
//! - several entries agree: widen again, unless the query or every agreeing
//!   entry has run out of characters, in which case the query is ambiguous
//!
//! A query that runs out while still shared still resolves when one of the
//! agreeing entries is spelled exactly like the query.

use thiserror::Error;

/// Reasons a query could not be resolved to a single table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The query is shared by more than one entry
    #[error("ambiguous")]
    Ambiguous,

    /// No entry starts the way the query does
    #[error("not found")]
    NotFound,
}

/// A fixed set of values selectable by name on the command line
///
/// Implementors list their variants in `ALL`; the position of a variant in
/// that slice is the index returned by [`match_index`] for its name.
pub trait Vocabulary: Copy + 'static {
    /// Every variant, in table order
    const ALL: &'static [Self];

    /// Canonical name typed by the user
    fn name(self) -> &'static str;

    /// Names of all variants, in table order
    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.name()).collect()
    }

    /// Resolve a possibly abbreviated name to a variant
    fn lookup(query: &str) -> Result<Self, MatchError> {
        let names = Self::names();
        match_index(&names, query).map(|index| Self::ALL[index])
    }
}

/// Resolve `query` against `table`, returning the index of the single entry
/// it abbreviates.
///
/// A table holding an empty entry is malformed and resolves nothing.
pub fn match_index<S: AsRef<str>>(table: &[S], query: &str) -> Result<usize, MatchError> {
    if table.iter().any(|entry| entry.as_ref().is_empty()) {
        return Err(MatchError::NotFound);
    }

    let query_len = query.chars().count();
    let longest = table
        .iter()
        .map(|entry| entry.as_ref().chars().count())
        .max()
        .unwrap_or(0);

    for k in 1..=longest.max(1) {
        let matched: Vec<usize> = table
            .iter()
            .enumerate()
            .filter(|(_, entry)| prefix_eq_ignore_case(entry.as_ref(), query, k))
            .map(|(index, _)| index)
            .collect();

        match matched.as_slice() {
            [] => return Err(MatchError::NotFound),
            [only] => return Ok(*only),
            _ if k >= query_len => {
                // The whole query is shared; only an exact spelling settles it.
                return matched
                    .iter()
                    .copied()
                    .find(|&index| table[index].as_ref().eq_ignore_ascii_case(query))
                    .ok_or(MatchError::Ambiguous);
            }
            _ if matched
                .iter()
                .all(|&index| table[index].as_ref().chars().count() <= k) =>
            {
                return Err(MatchError::Ambiguous);
            }
            _ => continue,
        }
    }

    Err(MatchError::Ambiguous)
}

/// Compare at most `k` characters of `a` and `b`, ignoring ASCII case.
///
/// Like `strncasecmp`, a string ending before `k` only equals another that
/// ends at the same place.
fn prefix_eq_ignore_case(a: &str, b: &str, k: usize) -> bool {
    let mut a = a.chars().take(k);
    let mut b = b.chars().take(k);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.eq_ignore_ascii_case(&y) => continue,
            _ => return false,
        }
    }
}
