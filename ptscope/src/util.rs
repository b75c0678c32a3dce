use crate::{DbgError, DbgResult};

/// Parses an integer the way the backend prints and users type them:
/// `0x`/`0o`/`0b` prefixes select the radix, anything else is decimal.
/// Underscore separators are tolerated.
pub fn parse_u64_auto(text: &str) -> DbgResult<u64> {
    let cleaned = text.trim().replace('_', "");
    let (radix, digits) = if let Some(hex) = strip_prefix_ci(&cleaned, "0x") {
        (16, hex)
    } else if let Some(oct) = strip_prefix_ci(&cleaned, "0o") {
        (8, oct)
    } else if let Some(bin) = strip_prefix_ci(&cleaned, "0b") {
        (2, bin)
    } else {
        (10, cleaned.as_str())
    };
    u64::from_str_radix(digits, radix)
        .map_err(|_| DbgError::InvalidArgument(format!("not a number: {text:?}")))
}

// Parses a hex value with or without `0x` prefix, tolerating underscores.
pub(crate) fn parse_hex_u64(text: &str) -> Option<u64> {
    let cleaned = text.trim().replace('_', "");
    let digits = strip_prefix_ci(&cleaned, "0x").unwrap_or(&cleaned);
    u64::from_str_radix(digits, 16).ok()
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_hex_u64, parse_u64_auto};

    #[test]
    fn radix_autodetection() {
        assert_eq!(parse_u64_auto("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_u64_auto("0XDEAD").unwrap(), 0xdead);
        assert_eq!(parse_u64_auto("0o777").unwrap(), 0o777);
        assert_eq!(parse_u64_auto("0b101").unwrap(), 0b101);
        assert_eq!(parse_u64_auto("4096").unwrap(), 4096);
        assert_eq!(parse_u64_auto(" 0xffff_8800_0000_0000 ").unwrap(), 0xffff_8800_0000_0000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_u64_auto("rip").is_err());
        assert!(parse_u64_auto("0x").is_err());
        assert!(parse_u64_auto("").is_err());
    }

    #[test]
    fn hex_with_optional_prefix() {
        assert_eq!(parse_hex_u64("deadbeef"), Some(0xdead_beef));
        assert_eq!(parse_hex_u64("0x1234_abcd"), Some(0x1234_abcd));
        assert_eq!(parse_hex_u64("xyz"), None);
    }
}
