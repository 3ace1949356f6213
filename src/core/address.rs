// src/core/address.rs

//! Classifies raw user input into an [`AddressKind`].
//!
//! Pure pattern matching: no DNS lookups, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::models::AddressKind;

/// Inputs this short (after trimming) are treated as "nothing typed yet".
const MIN_ADDRESS_LEN: usize = 4;

static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(https?://)?",
        r"((([a-z\d]([a-z\d-]*[a-z\d])*)\.)+[a-z]{2,}|",
        r"((\d{1,3}\.){3}\d{1,3}))",
        r"(:\d+)?(/[-a-z\d%_.~+]*)*",
        r"(\?[;&a-z\d%_.~+=-]*)?",
        r"(#[-a-z\d_]*)?$",
    ))
    .unwrap()
});

static RE_IPV4: Lazy<Regex> = Lazy::new(|| {
    let octet = r"(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";
    Regex::new(&format!(r"^{octet}\.{octet}\.{octet}\.{octet}$")).unwrap()
});

static RE_HEX_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[\da-f]{1,4}$").unwrap());

/// Returns the kind of address `raw` looks like.
///
/// A bare dotted quad is reported as [`AddressKind::Ipv4`] even though the URL
/// pattern would also accept it; an IP with a scheme or path stays a URL.
pub fn classify(raw: &str) -> AddressKind {
    let value = raw.trim();
    if value.len() < MIN_ADDRESS_LEN {
        return AddressKind::Empty;
    }
    if RE_IPV4.is_match(value) {
        return AddressKind::Ipv4;
    }
    if RE_URL.is_match(value) {
        return AddressKind::Url;
    }
    if is_ipv6(value) {
        return AddressKind::Ipv6;
    }
    AddressKind::Invalid
}

/// Colon-separated hex groups, 1 to 8 of them, with at most one `::` compression.
fn is_ipv6(value: &str) -> bool {
    let value = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    if !value.contains(':') {
        return false;
    }

    let mut halves = value.split("::");
    let head = halves.next().unwrap_or_default();
    let tail = halves.next();
    if halves.next().is_some() {
        return false;
    }

    let groups = |part: &str| -> Option<usize> {
        if part.is_empty() {
            return Some(0);
        }
        part.split(':')
            .try_fold(0, |count, group| RE_HEX_GROUP.is_match(group).then_some(count + 1))
    };

    match (groups(head), tail.map(groups)) {
        (Some(n), None) => n == 8,
        (Some(n), Some(Some(m))) => (1..=7).contains(&(n + m)) || n + m == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_or_blank_input_is_empty() {
        assert_eq!(classify(""), AddressKind::Empty);
        assert_eq!(classify("   "), AddressKind::Empty);
        assert_eq!(classify("a.b"), AddressKind::Empty);
    }

    #[test]
    fn recognizes_urls() {
        assert_eq!(classify("example.com"), AddressKind::Url);
        assert_eq!(classify("https://www.example.co.uk/path/to?q=1#top"), AddressKind::Url);
        assert_eq!(classify("http://example.com:8080"), AddressKind::Url);
        assert_eq!(classify("https://10.0.0.1/status"), AddressKind::Url);
    }

    #[test]
    fn recognizes_ipv4() {
        assert_eq!(classify("192.168.1.1"), AddressKind::Ipv4);
        assert_eq!(classify("8.8.8.8"), AddressKind::Ipv4);
        assert_eq!(classify(" 255.255.255.255 "), AddressKind::Ipv4);
    }

    #[test]
    fn recognizes_ipv6() {
        assert_eq!(classify("2001:db8::1"), AddressKind::Ipv6);
        assert_eq!(classify("fe80::1ff:fe23:4567:890a"), AddressKind::Ipv6);
        assert_eq!(classify("2001:0db8:85a3:0000:0000:8a2e:0370:7334"), AddressKind::Ipv6);
        assert_eq!(classify("[2001:db8::1]"), AddressKind::Ipv6);
    }

    #[test]
    fn rejects_double_compression_and_garbage() {
        assert_eq!(classify("2001::db8::1"), AddressKind::Invalid);
        assert_eq!(classify("1:2:3:4:5:6:7:8:9"), AddressKind::Invalid);
        assert_eq!(classify("gggg::1"), AddressKind::Invalid);
        assert_eq!(classify("not a url"), AddressKind::Invalid);
        assert_eq!(classify("ftp://example.com"), AddressKind::Invalid);
    }
}
