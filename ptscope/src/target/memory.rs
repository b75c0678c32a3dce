/// Decodes the `contents` payload of a memory-read reply into bytes.
///
/// The payload is two hex nibbles per byte. The decoder truncates to at
/// most `size` bytes and stops at the first pair that is not clean hex, so
/// a garbled tail costs data but never fails the read.
#[must_use]
pub fn decode_contents(hex_str: &str, size: usize) -> Vec<u8> {
    let bytes = hex_str.as_bytes();
    let limit = bytes.len().min(size.saturating_mul(2));
    let mut valid = 0;
    while valid < limit && bytes[valid].is_ascii_hexdigit() {
        valid += 1;
    }
    hex::decode(&bytes[..valid & !1]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::decode_contents;

    #[test]
    fn round_trip() {
        let data: Vec<u8> = (0..=255).collect();
        let encoded = hex::encode(&data);
        assert_eq!(decode_contents(&encoded, data.len()), data);
    }

    #[test]
    fn truncates_to_requested_size() {
        assert_eq!(decode_contents("00112233", 2), vec![0x00, 0x11]);
    }

    #[test]
    fn odd_tail_yields_whole_pairs_only() {
        assert_eq!(decode_contents("00112", 16), vec![0x00, 0x11]);
    }

    #[test]
    fn stops_at_first_non_hex_pair() {
        assert_eq!(decode_contents("0011zz22", 16), vec![0x00, 0x11]);
        assert_eq!(decode_contents("", 16), Vec::<u8>::new());
    }
}
