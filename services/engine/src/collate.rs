//! Numeric-aware string ordering ("S2" < "S10").

use std::cmp::Ordering;

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (idx, ch) in s.char_indices() {
        let digit = ch.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != digit => {
                out.push(chunk(&s[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        in_digits = Some(digit);
    }
    if let Some(digit) = in_digits {
        out.push(chunk(&s[start..], digit));
    }
    out
}

fn chunk(s: &str, digit: bool) -> Chunk<'_> {
    if digit {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

/// Compare two strings treating runs of ASCII digits as numbers.
///
/// Text runs compare case-insensitively first; the raw strings break any
/// remaining tie so the order is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(natural_cmp("S2", "S10"), Ordering::Less);
        assert_eq!(natural_cmp("S10", "S9"), Ordering::Greater);
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("S002", "S10"), Ordering::Less);
        assert_ne!(natural_cmp("S02", "S2"), Ordering::Equal);
    }

    #[test]
    fn test_text_is_case_insensitive_first() {
        assert_eq!(natural_cmp("alpha", "Beta"), Ordering::Less);
        assert_eq!(natural_cmp("a", "A"), "a".cmp("A"));
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(natural_cmp("", "A"), Ordering::Less);
        assert_eq!(natural_cmp("S1", "S1-A"), Ordering::Less);
    }

    #[test]
    fn test_sort_systems() {
        let mut systems = vec!["S10", "S2", "S1", "B-3", "S2A"];
        systems.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(systems, vec!["B-3", "S1", "S2", "S2A", "S10"]);
    }
}
