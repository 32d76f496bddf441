// these modules are re-exported as a single module

pub use self::flat_memory::*;
mod flat_memory;

pub use self::memory_address::*;
mod memory_address;

pub use self::mmu::*;
mod mmu;
