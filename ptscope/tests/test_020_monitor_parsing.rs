mod test_utils;

use ptscope::target::{parse_cr3_text, parse_xp_text, CR3_PATTERNS};
use ptscope::DbgError;

#[test]
fn cr3_from_monitor_text() {
    let _logger = test_utils::init_logger();
    assert_eq!(parse_cr3_text("CR3 = 0x1234abcd\n").unwrap(), 0x1234_abcd);
    // some backends print underscore separators
    assert_eq!(parse_cr3_text("CR3 = 0x1234_abcd\n").unwrap(), 0x1234_abcd);
    // unprefixed hex is still hex
    assert_eq!(parse_cr3_text("CR3 = 185000").unwrap(), 0x185000);
    assert_eq!(parse_cr3_text("PDBR = 0x42000").unwrap(), 0x42000);
    assert_eq!(parse_cr3_text("PDBR = deadbeef").unwrap(), 0xdead_beef);
}

#[test]
fn cr3_embedded_in_a_register_dump() {
    let dump = "RAX=0000000000000000 RBX=0000000000000001\n\
                CR0=80050033 CR2=00007f32a0000000 CR3=0000000000185000 CR4=00000000003706e0\n";
    assert_eq!(parse_cr3_text(dump).unwrap(), 0x185000);
}

#[test]
fn cr3_unavailable_keeps_the_raw_text() {
    match parse_cr3_text("no match here") {
        Err(DbgError::Cr3Unavailable { raw }) => assert_eq!(raw, "no match here"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        parse_cr3_text("   \n  "),
        Err(DbgError::Cr3Unavailable { .. })
    ));
}

#[test]
fn cr3_pattern_order_is_first_match_wins() {
    // CR3 and PDBR both present: CR3 patterns come first
    let both = "PDBR = 0x9999\nCR3 = 0x1111";
    assert_eq!(parse_cr3_text(both).unwrap(), 0x1111);
    assert_eq!(CR3_PATTERNS.len(), 4);
}

#[test]
fn xp_qword_from_monitor_text() {
    assert_eq!(
        parse_xp_text("0000000000001000: 0x0000000000002003\n").unwrap(),
        0x2003
    );
    // only the first line counts
    assert_eq!(
        parse_xp_text("00000000000017f8: 0x0000000000002003\njunk: 0xffff\n").unwrap(),
        0x2003
    );
}

#[test]
fn xp_parse_failure_keeps_the_line() {
    match parse_xp_text("Cannot access memory\n") {
        Err(DbgError::ParsePhys { raw }) => assert_eq!(raw, "Cannot access memory"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(parse_xp_text(""), Err(DbgError::ParsePhys { .. })));
}
