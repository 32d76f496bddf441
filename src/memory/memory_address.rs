use std::fmt;

use crate::memory::ADDRESS_MASK;

/// represents a memory address inside the vm
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryAddress {
    /// a real mode segment:offset pair (0x0_0000 - 0xF_FFFF)
    RealSegmentOffset(u16, u16),

    /// a unknown value
    Unset,
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryAddress::RealSegmentOffset(seg, off) => write!(f, "{:04X}:{:04X}", seg, off),
            MemoryAddress::Unset => write!(f, "????:????"),
        }
    }
}

impl Default for MemoryAddress {
    fn default() -> Self {
        MemoryAddress::Unset
    }
}

impl MemoryAddress {

    /// translates a segment:offset pair to a physical (flat) address, truncated to 20 bits
    pub fn value(self) -> u32 {
        match self {
            MemoryAddress::RealSegmentOffset(seg, off) => {
                let addr = (u32::from(seg) << 4) + u32::from(off);
                if addr > ADDRESS_MASK {
                    log::debug!("{:04X}:{:04X} wraps past 1 MiB to {:05X}", seg, off, addr & ADDRESS_MASK);
                }
                addr & ADDRESS_MASK
            }
            MemoryAddress::Unset => 0,
        }
    }

    pub fn segment(self) -> u16 {
        match self {
            MemoryAddress::RealSegmentOffset(seg, _) => seg,
            MemoryAddress::Unset => 0,
        }
    }

    pub fn offset(self) -> u16 {
        match self {
            MemoryAddress::RealSegmentOffset(_, off) => off,
            MemoryAddress::Unset => 0,
        }
    }

    pub fn is_set(self) -> bool {
        self != MemoryAddress::Unset
    }

    /// add `n` to offset, wrapping inside the segment
    pub fn add_offset(&mut self, n: u16) {
        if let MemoryAddress::RealSegmentOffset(_, ref mut off) = *self {
            *off = off.wrapping_add(n);
        }
    }

    pub fn inc_u8(&mut self) {
        self.add_offset(1);
    }
}
