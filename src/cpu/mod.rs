// these modules are re-exported as a single module

pub use self::code_buffer::*;
mod code_buffer;

pub use self::decoder::*;
mod decoder;

pub use self::instruction::*;
mod instruction;

pub use self::segment::*;
mod segment;

pub use self::register::*;
mod register;

pub use self::flag::*;
mod flag;

pub use self::parameter::*;
mod parameter;

pub use self::op::*;
mod op;

pub use self::encoder::*;
mod encoder;

use crate::memory::{MMU, MemoryAddress};

#[cfg(test)]
#[path = "./cpu_test.rs"]
mod cpu_test;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Exception {
    // http://wiki.osdev.org/Interrupt_Vector_Table
    DIV0 = 0,    // Divide by 0
    UD = 6,      // Invalid opcode
}

impl Exception {
    /// the interrupt vector raised by the exception
    pub fn vector(self) -> u8 {
        self as u8
    }
}

#[derive(Clone)]
pub struct CPU {
    pub instruction_count: usize,
    pub cycle_count: usize,

    /// general purpose registers, segment registers, ip
    pub regs: RegisterState,

    /// toggles non-deterministic behaviour (used by tests)
    pub deterministic: bool,

    pub decoder: Decoder,
}

impl Default for CPU {
    fn default() -> Self {
        CPU {
            instruction_count: 0,
            cycle_count: 0,
            regs: RegisterState::default(),
            deterministic: false,
            decoder: Decoder::default(),
        }
    }
}

impl CPU {
    pub fn deterministic() -> Self {
        let mut res = Self::default();
        res.deterministic = true;
        res
    }

    pub fn get_r8(&self, r: R) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.regs.set_r16(r, val);
    }

    /// returns the CS:IP pair
    pub fn get_address_pair(&self) -> (u16, u16) {
        (self.get_r16(R::CS), self.regs.ip)
    }

    /// returns the address of CS:IP as a MemoryAddress::RealSegmentOffset
    pub fn get_memory_address(&self) -> MemoryAddress {
        MemoryAddress::RealSegmentOffset(self.get_r16(R::CS), self.regs.ip)
    }

    pub fn push16(&mut self, mmu: &mut MMU, data: u16) {
        let sp = self.get_r16(R::SP).wrapping_sub(2);
        self.set_r16(R::SP, sp);
        let ss = self.get_r16(R::SS);
        log::trace!("[{}] push16 {:04X} to {:04X}:{:04X}", self.get_memory_address(), data, ss, sp);
        mmu.write_u16(ss, sp, data);
    }

    pub fn pop16(&mut self, mmu: &mut MMU) -> u16 {
        let ss = self.get_r16(R::SS);
        let sp = self.get_r16(R::SP);
        let data = mmu.read_u16(ss, sp);
        log::trace!("[{}] pop16 {:04X} from {:04X}:{:04X}", self.get_memory_address(), data, ss, sp);
        self.set_r16(R::SP, sp.wrapping_add(2));
        data
    }

    /// returns the value of the given segment register
    pub fn segment(&self, seg: Segment) -> u16 {
        self.get_r16(seg.as_register())
    }

    /// returns the offset of an addressing mode
    pub fn amode(&self, amode: AMode) -> u16 {
        match amode {
            AMode::BXSI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::SI)),
            AMode::BXDI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::DI)),
            AMode::BPSI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::SI)),
            AMode::BPDI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::DI)),
            AMode::SI => self.get_r16(R::SI),
            AMode::DI => self.get_r16(R::DI),
            AMode::BP => self.get_r16(R::BP),
            AMode::BX => self.get_r16(R::BX),
        }
    }

    /// resolves the segment of a memory operand, BP based addressing defaults to SS
    fn operand_segment(&self, seg: Segment, amode: Option<AMode>) -> u16 {
        match (seg, amode) {
            (Segment::Default, Some(a)) if a.uses_bp() => self.get_r16(R::SS),
            _ => self.segment(seg),
        }
    }

    /// returns the "segment, offset" pair of a memory operand
    pub fn effective_address(&self, p: &Parameter) -> Option<(u16, u16)> {
        match *p {
            Parameter::Ptr8(seg, imm) |
            Parameter::Ptr16(seg, imm) => Some((self.operand_segment(seg, None), imm)),
            Parameter::Ptr8Amode(seg, amode) |
            Parameter::Ptr16Amode(seg, amode) => {
                Some((self.operand_segment(seg, Some(amode)), self.amode(amode)))
            }
            Parameter::Ptr8AmodeS8(seg, amode, imm) |
            Parameter::Ptr16AmodeS8(seg, amode, imm) => {
                let offset = self.amode(amode).wrapping_add(imm as i16 as u16);
                Some((self.operand_segment(seg, Some(amode)), offset))
            }
            Parameter::Ptr8AmodeS16(seg, amode, imm) |
            Parameter::Ptr16AmodeS16(seg, amode, imm) => {
                let offset = self.amode(amode).wrapping_add(imm as u16);
                Some((self.operand_segment(seg, Some(amode)), offset))
            }
            _ => None,
        }
    }

    /// used by lds, les. returns the "segment, offset" pair stored at the memory operand
    pub fn read_segment_selector(&self, mmu: &MMU, p: &Parameter) -> Option<(u16, u16)> {
        let (segment, offset) = self.effective_address(p)?;
        let o_val = mmu.read_u16(segment, offset);
        let s_val = mmu.read_u16(segment, offset.wrapping_add(2));
        Some((s_val, o_val))
    }

    /// returns the offset of a memory operand, used by LEA
    pub fn read_parameter_address(&self, p: &Parameter) -> Option<u16> {
        self.effective_address(p).map(|(_, offset)| offset)
    }

    /// returns the value of the parameter, zero extended. ImmS8 is sign extended to 16 bits
    pub fn read_parameter_value(&self, mmu: &MMU, p: &Parameter) -> u16 {
        match *p {
            Parameter::Imm8(imm) => u16::from(imm),
            Parameter::Imm16(imm) => imm,
            Parameter::ImmS8(imm) => imm as i16 as u16,
            Parameter::Reg8(r) => u16::from(self.get_r8(r)),
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.get_r16(r),
            Parameter::Ptr8(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) => match self.effective_address(p) {
                Some((seg, off)) => u16::from(mmu.read_u8(seg, off)),
                None => 0,
            },
            Parameter::Ptr16(_, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => match self.effective_address(p) {
                Some((seg, off)) => mmu.read_u16(seg, off),
                None => 0,
            },
            Parameter::Ptr16Imm(_, _) | Parameter::None => {
                log::warn!("[{}] read of parameter without value: {:?}", self.get_memory_address(), p);
                0
            }
        }
    }

    pub fn write_parameter_u8(&mut self, mmu: &mut MMU, p: &Parameter, data: u8) {
        match *p {
            Parameter::Reg8(r) => self.set_r8(r, data),
            _ => match self.effective_address(p) {
                Some((seg, off)) => mmu.write_u8(seg, off, data),
                None => log::warn!("[{}] write_parameter_u8 to {:?} ignored", self.get_memory_address(), p),
            },
        }
    }

    pub fn write_parameter_u16(&mut self, mmu: &mut MMU, p: &Parameter, data: u16) {
        match *p {
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.set_r16(r, data),
            _ => match self.effective_address(p) {
                Some((seg, off)) => mmu.write_u16(seg, off, data),
                None => log::warn!("[{}] write_parameter_u16 to {:?} ignored", self.get_memory_address(), p),
            },
        }
    }

    /// writes the low `size` bits of `data` to the parameter
    pub fn write_parameter(&mut self, mmu: &mut MMU, p: &Parameter, size: OperandSize, data: u16) {
        match size {
            OperandSize::_8bit => self.write_parameter_u8(mmu, p, data as u8),
            OperandSize::_16bit => self.write_parameter_u16(mmu, p, data),
        }
    }

    /// used by aaa, aas
    pub fn adjb(&mut self, param1: i8, param2: i8) {
        if self.regs.flags.adjust() || (self.get_r8(R::AL) & 0xf) > 9 {
            let al = (i16::from(self.get_r8(R::AL)) + i16::from(param1)) as u8;
            let ah = (i16::from(self.get_r8(R::AH)) + i16::from(param2)) as u8;
            self.set_r8(R::AL, al);
            self.set_r8(R::AH, ah);
            self.regs.flags.set_adjust(true);
            self.regs.flags.set_carry(true);
        } else {
            self.regs.flags.set_adjust(false);
            self.regs.flags.set_carry(false);
        }
        let al = self.get_r8(R::AL);
        self.set_r8(R::AL, al & 0x0F);
    }

    /// used by daa, das
    pub fn adj4(&mut self, param1: i16, param2: i16) {
        let mut al = self.get_r8(R::AL);
        let carry = self.regs.flags.carry();
        if ((al & 0x0F) > 0x09) || self.regs.flags.adjust() {
            if (al > 0x99) || carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.set_carry(true);
            } else {
                self.regs.flags.set_carry(false);
            }
            al = (i16::from(al) + param1) as u8;
            self.regs.flags.set_adjust(true);
        } else {
            if (al > 0x99) || carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.set_carry(true);
            } else {
                self.regs.flags.set_carry(false);
            }
            self.regs.flags.set_adjust(false);
        }
        self.set_r8(R::AL, al);
        self.regs.flags.set_result_flags(u16::from(al), OperandSize::_8bit);
    }
}
