//! ISBN and ISSN normalization and check-digit validation.
//!
//! Catalog data often carries identifiers with hyphens, spaces or
//! qualifiers such as `(pbk.)`. Only identifiers with a valid check digit
//! are considered reliable enough to spend a lookup on.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static ISBN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9][0-9\- ]{8,}[0-9Xx]").expect("valid ISBN pattern"));

static ISSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}[\- ]?[0-9]{3}[0-9Xx]").expect("valid ISSN pattern"));

/// Extract and validate an ISBN-10 or ISBN-13.
///
/// Returns the bare digits (with an upper-case `X` check digit for ISBN-10).
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let found = ISBN_PATTERN.find(raw)?;
    let compact: String = found
        .as_str()
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid = match compact.len() {
        10 => isbn10_is_valid(&compact),
        13 => isbn13_is_valid(&compact),
        _ => false,
    };

    valid.then_some(compact)
}

/// Extract and validate an ISSN.
///
/// Returns the canonical hyphenated form, e.g. `0317-8471`.
pub fn normalize_issn(raw: &str) -> Option<String> {
    let found = ISSN_PATTERN.find(raw)?;
    let compact: String = found
        .as_str()
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() != 8 || !issn_is_valid(&compact) {
        return None;
    }

    Some(format!("{}-{}", &compact[..4], &compact[4..]))
}

fn digit_values(s: &str, allow_trailing_x: bool) -> Option<Vec<u32>> {
    let last = s.len().saturating_sub(1);
    s.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'X' if allow_trailing_x && i == last => Some(10),
            _ => c.to_digit(10),
        })
        .collect()
}

fn isbn10_is_valid(s: &str) -> bool {
    let Some(digits) = digit_values(s, true) else {
        return false;
    };
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| (10 - i as u32) * d)
        .sum();
    sum % 11 == 0
}

fn isbn13_is_valid(s: &str) -> bool {
    let Some(digits) = digit_values(s, false) else {
        return false;
    };
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    sum % 10 == 0
}

fn issn_is_valid(s: &str) -> bool {
    let Some(digits) = digit_values(s, true) else {
        return false;
    };
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| (8 - i as u32) * d)
        .sum();
    sum % 11 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn13() {
        assert_eq!(
            normalize_isbn("9780140449266").as_deref(),
            Some("9780140449266")
        );
        assert_eq!(
            normalize_isbn("978-0-14-044926-6 (pbk.)").as_deref(),
            Some("9780140449266")
        );
        assert!(normalize_isbn("9780140449267").is_none());
    }

    #[test]
    fn test_isbn10() {
        assert_eq!(normalize_isbn("0-14-044926-4").as_deref(), Some("0140449264"));
        assert_eq!(normalize_isbn("080442957x").as_deref(), Some("080442957X"));
        assert!(normalize_isbn("0140449265").is_none());
    }

    #[test]
    fn test_isbn_garbage() {
        assert!(normalize_isbn("").is_none());
        assert!(normalize_isbn("n/a").is_none());
        assert!(normalize_isbn("12345").is_none());
    }

    #[test]
    fn test_issn() {
        assert_eq!(normalize_issn("0317-8471").as_deref(), Some("0317-8471"));
        assert_eq!(normalize_issn("00280836").as_deref(), Some("0028-0836"));
        assert_eq!(normalize_issn("ISSN 2434-561x").as_deref(), Some("2434-561X"));
        assert!(normalize_issn("0317-8472").is_none());
        assert!(normalize_issn("none").is_none());
    }
}
