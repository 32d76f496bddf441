use crate::hex::hex_bytes_separated;
use crate::memory::{FlatMemory, MemoryAddress};

#[cfg(test)]
#[path = "./mmu_test.rs"]
mod mmu_test;

/// upper bound for terminated string reads, one full segment
const MAX_STRING_LEN: usize = 0x1_0000;

/// segmented view of the 1 MiB address space.
/// every access goes through segment:offset translation; multi-byte
/// values wrap inside the segment offset like on a 8086
#[derive(Clone)]
pub struct MMU {
    pub memory: FlatMemory,

    /// the FLAGS register offset on stack while in interrupt
    pub flags_address: MemoryAddress,
}

impl Default for MMU {
    fn default() -> Self {
        MMU {
            memory: FlatMemory::new(),
            flags_address: MemoryAddress::Unset,
        }
    }
}

impl MMU {
    /// manipulates the FLAGS register on stack while in a interrupt
    pub fn set_flag(&mut self, flag_mask: u16, flag_value: bool) {
        if !self.flags_address.is_set() {
            log::warn!("mmu: set_flag {:04X} outside of interrupt, ignored", flag_mask);
            return;
        }
        let (seg, off) = (self.flags_address.segment(), self.flags_address.offset());
        let mut flags = self.read_u16(seg, off);
        if flag_value {
            flags |= flag_mask;
        } else {
            flags &= !flag_mask;
        }
        self.write_u16(seg, off, flags);
    }

    fn addr(seg: u16, offset: u16) -> u32 {
        MemoryAddress::RealSegmentOffset(seg, offset).value()
    }

    /// reads a sequence of data from memory, wrapping inside the segment
    pub fn read(&self, seg: u16, offset: u16, length: usize) -> Vec<u8> {
        (0..length)
            .map(|i| self.read_u8(seg, offset.wrapping_add(i as u16)))
            .collect()
    }

    /// reads a sequence of data until a NULL byte is found
    pub fn readz(&self, seg: u16, offset: u16) -> Vec<u8> {
        self.read_terminated(seg, offset, 0)
    }

    /// reads a sequence of text until a NULL byte is found
    pub fn read_asciiz(&self, seg: u16, offset: u16) -> String {
        self.read_terminated(seg, offset, 0).iter().map(|b| *b as char).collect()
    }

    /// reads a sequence of text until a $ terminator is found
    pub fn read_asciid(&self, seg: u16, offset: u16) -> String {
        self.read_terminated(seg, offset, b'$').iter().map(|b| *b as char).collect()
    }

    fn read_terminated(&self, seg: u16, offset: u16, terminator: u8) -> Vec<u8> {
        let mut res = Vec::new();
        let mut addr = MemoryAddress::RealSegmentOffset(seg, offset);
        while res.len() < MAX_STRING_LEN {
            let b = self.read_u8_addr(addr);
            if b == terminator {
                break;
            }
            res.push(b);
            addr.inc_u8();
        }
        res
    }

    pub fn read_u8_addr(&self, addr: MemoryAddress) -> u8 {
        self.memory.read_u8(addr.value())
    }

    pub fn read_u8(&self, seg: u16, offset: u16) -> u8 {
        self.memory.read_u8(Self::addr(seg, offset))
    }

    pub fn read_u16(&self, seg: u16, offset: u16) -> u16 {
        u16::from(self.read_u8(seg, offset.wrapping_add(1))) << 8 | u16::from(self.read_u8(seg, offset))
    }

    pub fn read_u32(&self, seg: u16, offset: u16) -> u32 {
        u32::from(self.read_u16(seg, offset.wrapping_add(2))) << 16 | u32::from(self.read_u16(seg, offset))
    }

    pub fn read_u64(&self, seg: u16, offset: u16) -> u64 {
        u64::from(self.read_u32(seg, offset.wrapping_add(4))) << 32 | u64::from(self.read_u32(seg, offset))
    }

    pub fn write_u8(&mut self, seg: u16, offset: u16, data: u8) {
        self.memory.write_u8(Self::addr(seg, offset), data);
    }

    pub fn write_u16(&mut self, seg: u16, offset: u16, data: u16) {
        self.write_u8(seg, offset, data as u8);
        self.write_u8(seg, offset.wrapping_add(1), (data >> 8) as u8);
    }

    pub fn write_u32(&mut self, seg: u16, offset: u16, data: u32) {
        self.write_u16(seg, offset, data as u16);
        self.write_u16(seg, offset.wrapping_add(2), (data >> 16) as u16);
    }

    pub fn write_u64(&mut self, seg: u16, offset: u16, data: u64) {
        self.write_u32(seg, offset, data as u32);
        self.write_u32(seg, offset.wrapping_add(4), (data >> 32) as u32);
    }

    /// writes a sequence of data to memory, wrapping inside the segment
    pub fn write(&mut self, seg: u16, offset: u16, data: &[u8]) {
        log::trace!("write to {:04X}:{:04X} in {} bytes: {}", seg, offset, data.len(), hex_bytes_separated(data, ' '));
        for (i, b) in data.iter().enumerate() {
            self.write_u8(seg, offset.wrapping_add(i as u16), *b);
        }
    }

    pub fn fill(&mut self, seg: u16, offset: u16, length: usize, value: u8) {
        for i in 0..length {
            self.write_u8(seg, offset.wrapping_add(i as u16), value);
        }
    }

    /// copies `length` bytes between two segment:offset locations. overlapping ranges are safe
    pub fn copy(&mut self, dst: MemoryAddress, src: MemoryAddress, length: usize) {
        let data = self.read(src.segment(), src.offset(), length);
        self.write(dst.segment(), dst.offset(), &data);
    }

    pub fn and_u8(&mut self, seg: u16, offset: u16, mask: u8) {
        let v = self.read_u8(seg, offset);
        self.write_u8(seg, offset, v & mask);
    }

    pub fn or_u8(&mut self, seg: u16, offset: u16, mask: u8) {
        let v = self.read_u8(seg, offset);
        self.write_u8(seg, offset, v | mask);
    }

    /// read interrupt vector `v` from the IVT (offset word, then segment word)
    pub fn read_vec(&self, v: u8) -> MemoryAddress {
        let v_abs = u16::from(v) << 2;
        let off = self.read_u16(0, v_abs);
        let seg = self.read_u16(0, v_abs + 2);
        MemoryAddress::RealSegmentOffset(seg, off)
    }

    /// write interrupt vector
    pub fn write_vec(&mut self, v: u8, data: MemoryAddress) {
        let v_abs = u16::from(v) << 2;
        self.write_u16(0, v_abs, data.offset());
        self.write_u16(0, v_abs + 2, data.segment());
        log::debug!("mmu: int {:02X} vector set to {}", v, data);
    }
}
