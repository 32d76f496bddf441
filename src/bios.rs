// https://wiki.osdev.org/BIOS

use chrono::Timelike;

use crate::cpu::{CPU, R};
use crate::machine::{Component, Interrupt};
use crate::memory::{MMU, MemoryAddress};

#[cfg(test)]
#[path = "./bios_test.rs"]
mod bios_test;

/// high level BIOS services. Every interrupt vector points at a IRET stub
/// in the ROM segment, at the offset of the vector number. The machine
/// offers the interrupt to the components and then to the BIOS when
/// execution reaches a stub
#[derive(Clone)]
pub struct BIOS {
    /// seed the tick counter from the wall clock
    pub deterministic: bool,
}

impl Default for BIOS {
    fn default() -> Self {
        BIOS {
            deterministic: false,
        }
    }
}

impl BIOS {
    pub const DATA_SEG: u16           = 0x0040; // bios data segment, 256 byte at 000400 to 0004FF
    pub const ROM_SEG: u16            = 0xF000; // bios rom segment, 64k at F_0000 to F_FFFF

    // offsets
    pub const DATA_TICK_COUNT: u16    = 0x006C; // dword, timer ticks since midnight
    pub const DATA_TICK_ROLLOVER: u16 = 0x0070; // byte, non-zero if midnight passed

    /// offset in ROM_SEG of the HLT instruction used as return address of a session
    pub const EXIT_STUB: u16          = 0x0100;

    /// number of INT 08 ticks in 24 hours, about 18.2 per second
    pub const TICKS_PER_DAY: u32      = 0x18_00B0;

    pub fn deterministic() -> Self {
        BIOS {
            deterministic: true,
        }
    }

    pub fn init(&mut self, mmu: &mut MMU) {
        self.init_ivt(mmu);
        self.init_tick_count(mmu);
    }

    fn init_ivt(&mut self, mmu: &mut MMU) {
        const IRET: u8 = 0xCF;
        const HLT: u8 = 0xF4;
        for irq in 0..=0xFF_u8 {
            mmu.write_vec(irq, MemoryAddress::RealSegmentOffset(BIOS::ROM_SEG, u16::from(irq)));
            mmu.write_u8(BIOS::ROM_SEG, u16::from(irq), IRET);
        }
        mmu.write_u8(BIOS::ROM_SEG, BIOS::EXIT_STUB, HLT);
    }

    fn init_tick_count(&self, mmu: &mut MMU) {
        let ticks = if self.deterministic {
            0
        } else {
            let seconds = chrono::Local::now().num_seconds_from_midnight();
            (u64::from(seconds) * u64::from(BIOS::TICKS_PER_DAY) / 86_400) as u32
        };
        mmu.write_u32(BIOS::DATA_SEG, BIOS::DATA_TICK_COUNT, ticks);
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_TICK_ROLLOVER, 0);
    }

    /// returns the timer ticks since midnight
    pub fn tick_count(&self, mmu: &MMU) -> u32 {
        mmu.read_u32(BIOS::DATA_SEG, BIOS::DATA_TICK_COUNT)
    }

    /// advances the tick counter, wrapping at midnight
    fn tick(&self, mmu: &mut MMU) {
        let mut ticks = self.tick_count(mmu) + 1;
        if ticks >= BIOS::TICKS_PER_DAY {
            ticks = 0;
            mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_TICK_ROLLOVER, 1);
        }
        mmu.write_u32(BIOS::DATA_SEG, BIOS::DATA_TICK_COUNT, ticks);
    }

    /// returns the interrupted CS:IP, stored on stack by the interrupt
    fn return_address(cpu: &CPU, mmu: &MMU) -> MemoryAddress {
        let (ss, sp) = (cpu.get_r16(R::SS), cpu.get_r16(R::SP));
        let ip = mmu.read_u16(ss, sp);
        let cs = mmu.read_u16(ss, sp.wrapping_add(2));
        MemoryAddress::RealSegmentOffset(cs, ip)
    }
}

impl Component for BIOS {
    fn int(&mut self, int: u8, cpu: &mut CPU, mmu: &mut MMU) -> Interrupt {
        match int {
            0x00 => {
                log::error!("divide error, returning to {}. {} instructions executed",
                            BIOS::return_address(cpu, mmu), cpu.instruction_count);
                Interrupt::Halt
            }
            0x03 => {
                // debugger interrupt
                // http://www.ctyme.com/intr/int-03.htm
                log::info!("INT 3 - breakpoint at {}, AX={:04X}", BIOS::return_address(cpu, mmu), cpu.get_r16(R::AX));
                Interrupt::Halt
            }
            0x06 => {
                log::error!("invalid opcode, returning to {}. {} instructions executed",
                            BIOS::return_address(cpu, mmu), cpu.instruction_count);
                Interrupt::Halt
            }
            0x08 => {
                // IRQ 0 - system timer
                self.tick(mmu);
                Interrupt::Handled
            }
            _ => Interrupt::Unhandled,
        }
    }
}
