use crate::memory::{MemoryAddress, MMU};

#[test]
fn can_translate_segment_offset() {
    assert_eq!(0xC0000, MemoryAddress::RealSegmentOffset(0xC000, 0x0000).value());
    assert_eq!(0x0095F, MemoryAddress::RealSegmentOffset(0x085F, 0x0100).value());
    // wraps at 1 MiB like a 8086 without A20
    assert_eq!(0x0FFEF, MemoryAddress::RealSegmentOffset(0xFFFF, 0xFFFF).value());
    assert_eq!(0, MemoryAddress::Unset.value());
}

#[test]
fn multi_byte_values_are_little_endian() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x1000, 0x0010, 0x1234);
    assert_eq!(0x34, mmu.read_u8(0x1000, 0x0010));
    assert_eq!(0x12, mmu.read_u8(0x1000, 0x0011));
    // same physical byte through another segment:offset pair
    assert_eq!(0x1234, mmu.read_u16(0x1001, 0x0000));

    mmu.write_u32(0x2000, 0, 0xDEAD_BEEF);
    assert_eq!(vec![0xEF, 0xBE, 0xAD, 0xDE], mmu.read(0x2000, 0, 4));
    mmu.write_u64(0x2000, 8, 0x0102_0304_0506_0708);
    assert_eq!(0x0102_0304_0506_0708, mmu.read_u64(0x2000, 8));
    assert_eq!(0x0506_0708, mmu.read_u32(0x2000, 8));
}

#[test]
fn word_access_wraps_inside_segment() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x3000, 0xFFFF, 0xAABB);
    assert_eq!(0xBB, mmu.read_u8(0x3000, 0xFFFF));
    assert_eq!(0xAA, mmu.read_u8(0x3000, 0x0000));
    assert_eq!(0xAABB, mmu.read_u16(0x3000, 0xFFFF));
}

#[test]
fn can_fill_copy_and_mask() {
    let mut mmu = MMU::default();
    mmu.write(0x0100, 0, &[1, 2, 3, 4, 5, 6]);

    // overlapping copy forward
    mmu.copy(
        MemoryAddress::RealSegmentOffset(0x0100, 2),
        MemoryAddress::RealSegmentOffset(0x0100, 0),
        4,
    );
    assert_eq!(vec![1, 2, 1, 2, 3, 4], mmu.read(0x0100, 0, 6));

    mmu.fill(0x0100, 1, 3, 0xFF);
    assert_eq!(vec![1, 0xFF, 0xFF, 0xFF, 3, 4], mmu.read(0x0100, 0, 6));

    mmu.and_u8(0x0100, 1, 0x0F);
    mmu.or_u8(0x0100, 0, 0x80);
    assert_eq!(0x0F, mmu.read_u8(0x0100, 1));
    assert_eq!(0x81, mmu.read_u8(0x0100, 0));
}

#[test]
fn can_read_terminated_strings() {
    let mut mmu = MMU::default();
    mmu.write(0x0200, 0x10, b"hello\0");
    mmu.write(0x0200, 0x20, b"world$");
    assert_eq!(b"hello".to_vec(), mmu.readz(0x0200, 0x10));
    assert_eq!("hello", mmu.read_asciiz(0x0200, 0x10));
    assert_eq!("world", mmu.read_asciid(0x0200, 0x20));
}

#[test]
fn vectors_store_offset_then_segment() {
    let mut mmu = MMU::default();
    mmu.write_vec(0x21, MemoryAddress::RealSegmentOffset(0xF000, 0x0021));
    assert_eq!(0x0021, mmu.read_u16(0, 0x21 * 4));
    assert_eq!(0xF000, mmu.read_u16(0, 0x21 * 4 + 2));
    assert_eq!(MemoryAddress::RealSegmentOffset(0xF000, 0x0021), mmu.read_vec(0x21));
}

#[test]
fn set_flag_needs_an_interrupt_frame() {
    let mut mmu = MMU::default();
    mmu.set_flag(0x0001, true);
    assert_eq!(0, mmu.read_u16(0, 0));

    mmu.flags_address = MemoryAddress::RealSegmentOffset(0x0500, 0x00FE);
    mmu.write_u16(0x0500, 0x00FE, 0xF202);
    mmu.set_flag(0x0001, true);
    assert_eq!(0xF203, mmu.read_u16(0x0500, 0x00FE));
    mmu.set_flag(0x0200, false);
    assert_eq!(0xF003, mmu.read_u16(0x0500, 0x00FE));
}
