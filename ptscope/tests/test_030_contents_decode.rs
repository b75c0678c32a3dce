mod test_utils;

use ptscope::target::decode_contents;

#[test]
fn round_trip_up_to_page_size() {
    let _logger = test_utils::init_logger();
    for len in [0_usize, 1, 2, 15, 16, 17, 255, 4096] {
        let data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
        let encoded = hex::encode(&data);
        assert_eq!(decode_contents(&encoded, len), data, "len {len}");
    }
}

#[test]
fn truncated_hex_yields_exactly_k_bytes() {
    let data: Vec<u8> = (0..32).collect();
    let encoded = hex::encode(&data);
    for k in [0_usize, 1, 7, 31, 32] {
        assert_eq!(decode_contents(&encoded, k), data[..k], "k {k}");
    }
}

#[test]
fn truncated_input_of_length_2k_decodes_to_k_bytes() {
    let data: Vec<u8> = (0..64).collect();
    let encoded = hex::encode(&data);
    for k in [0_usize, 3, 10, 64] {
        assert_eq!(decode_contents(&encoded[..2 * k], 4096), data[..k], "k {k}");
    }
}

#[test]
fn garbled_tail_is_dropped_not_fatal() {
    assert_eq!(decode_contents("00ffx2", 8), vec![0x00, 0xff]);
    assert_eq!(decode_contents("0", 8), Vec::<u8>::new());
    assert_eq!(decode_contents("zz", 8), Vec::<u8>::new());
}
