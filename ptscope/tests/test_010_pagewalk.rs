mod test_utils;

use ptscope::target::{walk_va, PageSize, PhysSource, VaIndices, WalkLevel};
use ptscope::{perm_from_flags, DbgResult};
use std::collections::HashMap;

// In-memory stand-in for guest-physical memory: unmapped addresses read as
// zero, like a zero-filled table page would.
#[derive(Default)]
struct PhysImage {
    qwords: HashMap<u64, u64>,
    reads: usize,
}

impl PhysImage {
    fn set(&mut self, addr: u64, value: u64) {
        self.qwords.insert(addr, value);
    }
}

impl PhysSource for PhysImage {
    fn read_qword(&mut self, phys_addr: u64) -> DbgResult<u64> {
        self.reads += 1;
        Ok(self.qwords.get(&phys_addr).copied().unwrap_or(0))
    }
}

#[test]
fn four_kib_translation() {
    let _logger = test_utils::init_logger();
    let va: u64 = 0x0000_7fff_ffff_f000;
    let mut phys = PhysImage::default();
    phys.set(0x1000 + 255 * 8, 0x2003); // PML4[255]
    phys.set(0x2000 + 511 * 8, 0x3003); // PDPT[511]
    phys.set(0x3000 + 511 * 8, 0x4003); // PD[511]
    phys.set(0x4000 + 511 * 8, 0x5067); // PT[511]

    let walk = walk_va(&mut phys, 0x1000, va).unwrap();
    assert_eq!(walk.level, WalkLevel::Page4K);
    assert!(walk.present);
    assert_eq!(walk.page_size, Some(PageSize::Size4K));
    assert_eq!(walk.page_phys, Some(0x5000));
    assert_eq!(walk.phys_addr, Some(0x5000));
    let flags = walk.flags.unwrap();
    assert!(flags.writable);
    assert!(flags.user);
    assert!(!flags.nx);
    assert_eq!(phys.reads, 4);
}

#[test]
fn one_gib_short_circuit() {
    let mut phys = PhysImage::default();
    phys.set(0x1000 + 272 * 8, 0x2003); // PML4[272]
    phys.set(0x2000, 0x4000_0083); // PDPT[0], page-size bit set

    let walk = walk_va(&mut phys, 0x1000, 0xffff_8800_0000_0000).unwrap();
    assert_eq!(walk.level, WalkLevel::Page1G);
    assert_eq!(walk.page_size, Some(PageSize::Size1G));
    assert_eq!(walk.page_phys, Some(0x4000_0000));
    assert_eq!(walk.phys_addr, Some(0x4000_0000));
    assert!(walk.flags.unwrap().page_size);
    // the PD level must not have been read through the huge-page frame
    assert_eq!(walk.pd_entry, None);
    assert_eq!(phys.reads, 2);
}

#[test]
fn two_mib_short_circuit() {
    let mut phys = PhysImage::default();
    phys.set(0x1000, 0x2003); // PML4[0]
    phys.set(0x2000, 0x3003); // PDPT[0]
    phys.set(0x3000, 0x40_0083); // PD[0], page-size bit set

    let walk = walk_va(&mut phys, 0x1000, 0x1000).unwrap();
    assert_eq!(walk.level, WalkLevel::Page2M);
    assert_eq!(walk.page_size, Some(PageSize::Size2M));
    assert_eq!(walk.page_phys, Some(0x40_0000));
    assert_eq!(walk.phys_addr, Some(0x40_1000));
    assert_eq!(walk.pt_entry, None);
}

#[test]
fn not_present_at_pml4() {
    let mut phys = PhysImage::default();
    let walk = walk_va(&mut phys, 0x1000, 0xdead_beef_0000).unwrap();
    assert_eq!(walk.level, WalkLevel::Pml4);
    assert!(!walk.present);
    assert_eq!(walk.indices.pml4, 0x1bd);
    assert_eq!(walk.pml4_entry, 0);
    assert_eq!(walk.pdpt_entry, None);
    assert_eq!(walk.pd_entry, None);
    assert_eq!(walk.pt_entry, None);
    assert_eq!(walk.page_phys, None);
    assert_eq!(walk.phys_addr, None);
    assert!(walk.flags.is_none());
    assert_eq!(phys.reads, 1);
}

#[test]
fn not_present_at_lower_levels() {
    let mut phys = PhysImage::default();
    phys.set(0x1000, 0x2003);
    let walk = walk_va(&mut phys, 0x1000, 0x1000).unwrap();
    assert_eq!(walk.level, WalkLevel::Pdpt);
    assert!(!walk.present);
    assert_eq!(walk.pdpt_entry, Some(0));

    phys.set(0x2000, 0x3003);
    let walk = walk_va(&mut phys, 0x1000, 0x1000).unwrap();
    assert_eq!(walk.level, WalkLevel::Pd);

    phys.set(0x3000, 0x4003);
    let walk = walk_va(&mut phys, 0x1000, 0x1000).unwrap();
    assert_eq!(walk.level, WalkLevel::Pt);
    assert_eq!(walk.pt_entry, Some(0));
    assert!(walk.phys_addr.is_none());
}

#[test]
fn kernel_read_only_page_permissions() {
    let mut phys = PhysImage::default();
    phys.set(0x1000, 0x2003);
    phys.set(0x2000, 0x3003);
    phys.set(0x3000, 0x4003);
    phys.set(0x4000 + 8, 0x8000_0000_0000_5061_u64); // PT[1]: nx, not writable, not user

    let walk = walk_va(&mut phys, 0x1000, 0x1234).unwrap();
    assert_eq!(walk.level, WalkLevel::Page4K);
    assert_eq!(walk.phys_addr, Some(0x5234));
    assert_eq!(perm_from_flags(&walk.flags.unwrap()), "R-- (kernel)");
}

#[test]
fn index_identities_hold_for_any_table_content() {
    let vas = [
        0_u64,
        0x1234,
        0x0000_7fff_ffff_f000,
        0xffff_8800_0000_0000,
        0xdead_beef_0000,
        0xffff_ffff_ffff_ffff,
    ];
    let mut phys = PhysImage::default();
    for va in vas {
        let walk = walk_va(&mut phys, 0x1000, va).unwrap();
        let expected = VaIndices::of(va);
        assert_eq!(walk.indices, expected);
        assert_eq!(walk.indices.pml4 as u64, (va >> 39) & 0x1ff);
        assert_eq!(walk.indices.pdpt as u64, (va >> 30) & 0x1ff);
        assert_eq!(walk.indices.pd as u64, (va >> 21) & 0x1ff);
        assert_eq!(walk.indices.pt as u64, (va >> 12) & 0x1ff);
        assert_eq!(walk.indices.offset, va & 0xfff);
    }
}

#[test]
fn translation_invariants() {
    // one mapping per granularity
    let mut phys = PhysImage::default();
    phys.set(0x1000, 0x2003); // PML4[0]
    phys.set(0x2000, 0x3003); // PDPT[0] -> PD
    phys.set(0x2000 + 8, 0x8000_0083_u64); // PDPT[1] -> 1G page at 0x8000_0000
    phys.set(0x3000, 0x20_0083); // PD[0] -> 2M page at 0x20_0000
    phys.set(0x3000 + 8, 0x4003); // PD[1] -> PT
    phys.set(0x4000, 0x5067); // PT[0] -> 4K page at 0x5000

    let cases = [
        0x0000_0000_0000_0123_u64, // 2M through PD[0]
        0x0000_0000_0020_0456,     // 4K through PD[1]/PT[0]
        0x0000_0000_4567_89ab,     // 1G through PDPT[1]
    ];
    for va in cases {
        let walk = walk_va(&mut phys, 0x1000, va).unwrap();
        assert!(walk.present, "va {va:#x}");
        let size = walk.page_size.unwrap().bytes();
        let page_phys = walk.page_phys.unwrap();
        let phys_addr = walk.phys_addr.unwrap();
        assert_eq!(page_phys & (size - 1), 0, "va {va:#x}");
        assert_eq!(phys_addr, page_phys | (va & (size - 1)), "va {va:#x}");
    }
}

#[test]
fn repeated_walks_are_identical_when_memory_is_quiescent() {
    let mut phys = PhysImage::default();
    phys.set(0x1000, 0x2003);
    phys.set(0x2000, 0x3003);
    phys.set(0x3000, 0x4003);
    phys.set(0x4000, 0x5067);

    let first = walk_va(&mut phys, 0x1000, 0x42).unwrap();
    let second = walk_va(&mut phys, 0x1000, 0x42).unwrap();
    assert_eq!(first, second);
}
