/// size of the real mode address space (1 MiB)
pub const MEMORY_SIZE: usize = 0x10_0000;

/// physical addresses are truncated to 20 bits
pub const ADDRESS_MASK: u32 = 0xF_FFFF;

#[derive(Clone)]
pub struct FlatMemory {
    pub memory: Vec<u8>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatMemory {
    pub fn new() -> Self {
        FlatMemory { memory: vec![0u8; MEMORY_SIZE] }
    }

    fn wrap(addr: u32) -> usize {
        if addr > ADDRESS_MASK {
            log::debug!("address {:06X} wraps to {:05X}", addr, addr & ADDRESS_MASK);
        }
        (addr & ADDRESS_MASK) as usize
    }

    pub fn read_u8(&self, addr: u32) -> u8 {
        self.memory[Self::wrap(addr)]
    }

    pub fn write_u8(&mut self, addr: u32, data: u8) {
        self.memory[Self::wrap(addr)] = data;
    }
}
