use std::fmt;

use crate::cpu::flag::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

/// a 16-bit register cell, with views of the high and low byte
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0xFF) | (u16::from(val) << 8);
    }

    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) | u16::from(val);
    }

    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }

    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum R {
    AL, CL, DL, BL, AH, CH, DH, BH,
    AX, CX, DX, BX, SP, BP, SI, DI,
    ES, CS, SS, DS,
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl R {
    /// the 3-bit ISA encoding of the register (2-bit for segment registers)
    pub fn index(self) -> u8 {
        match self {
            R::AL | R::AX | R::ES => 0,
            R::CL | R::CX | R::CS => 1,
            R::DL | R::DX | R::SS => 2,
            R::BL | R::BX | R::DS => 3,
            R::AH | R::SP => 4,
            R::CH | R::BP => 5,
            R::DH | R::SI => 6,
            R::BH | R::DI => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            R::AL => "al",
            R::CL => "cl",
            R::DL => "dl",
            R::BL => "bl",
            R::AH => "ah",
            R::CH => "ch",
            R::DH => "dh",
            R::BH => "bh",
            R::AX => "ax",
            R::CX => "cx",
            R::DX => "dx",
            R::BX => "bx",
            R::SP => "sp",
            R::BP => "bp",
            R::SI => "si",
            R::DI => "di",
            R::ES => "es",
            R::CS => "cs",
            R::SS => "ss",
            R::DS => "ds",
        }
    }

    /// parses a case-insensitive register name
    pub fn from_name(name: &str) -> Option<R> {
        let r = match name.to_lowercase().as_str() {
            "al" => R::AL,
            "cl" => R::CL,
            "dl" => R::DL,
            "bl" => R::BL,
            "ah" => R::AH,
            "ch" => R::CH,
            "dh" => R::DH,
            "bh" => R::BH,
            "ax" => R::AX,
            "cx" => R::CX,
            "dx" => R::DX,
            "bx" => R::BX,
            "sp" => R::SP,
            "bp" => R::BP,
            "si" => R::SI,
            "di" => R::DI,
            "es" => R::ES,
            "cs" => R::CS,
            "ss" => R::SS,
            "ds" => R::DS,
            _ => return None,
        };
        Some(r)
    }

    pub fn is_8bit(self) -> bool {
        match self {
            R::AL | R::CL | R::DL | R::BL | R::AH | R::CH | R::DH | R::BH => true,
            _ => false,
        }
    }

    pub fn is_16bit(self) -> bool {
        match self {
            R::AX | R::CX | R::DX | R::BX | R::SP | R::BP | R::SI | R::DI => true,
            _ => false,
        }
    }

    pub fn is_segment(self) -> bool {
        match self {
            R::ES | R::CS | R::SS | R::DS => true,
            _ => false,
        }
    }
}

/// maps the 3-bit reg field to a 8-bit register
pub fn r8(v: u8) -> R {
    match v & 7 {
        0 => R::AL,
        1 => R::CL,
        2 => R::DL,
        3 => R::BL,
        4 => R::AH,
        5 => R::CH,
        6 => R::DH,
        _ => R::BH,
    }
}

/// maps the 3-bit reg field to a 16-bit register
pub fn r16(v: u8) -> R {
    match v & 7 {
        0 => R::AX,
        1 => R::CX,
        2 => R::DX,
        3 => R::BX,
        4 => R::SP,
        5 => R::BP,
        6 => R::SI,
        _ => R::DI,
    }
}

/// maps the 2-bit reg field to a segment register
pub fn sr(v: u8) -> R {
    match v & 3 {
        0 => R::ES,
        1 => R::CS,
        2 => R::SS,
        _ => R::DS,
    }
}

/// addressing modes of the mod/rm byte, indexed by the rm field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AMode {
    BXSI, BXDI, BPSI, BPDI, SI, DI, BP, BX,
}

impl fmt::Display for AMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AMode {
    pub fn index(self) -> u8 {
        match self {
            AMode::BXSI => 0,
            AMode::BXDI => 1,
            AMode::BPSI => 2,
            AMode::BPDI => 3,
            AMode::SI => 4,
            AMode::DI => 5,
            AMode::BP => 6,
            AMode::BX => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AMode::BXSI => "bx+si",
            AMode::BXDI => "bx+di",
            AMode::BPSI => "bp+si",
            AMode::BPDI => "bp+di",
            AMode::SI => "si",
            AMode::DI => "di",
            AMode::BP => "bp",
            AMode::BX => "bx",
        }
    }

    /// BP based addressing defaults to the SS segment
    pub fn uses_bp(self) -> bool {
        match self {
            AMode::BPSI | AMode::BPDI | AMode::BP => true,
            _ => false,
        }
    }
}

pub fn amode(v: u8) -> AMode {
    match v & 7 {
        0 => AMode::BXSI,
        1 => AMode::BXDI,
        2 => AMode::BPSI,
        3 => AMode::BPDI,
        4 => AMode::SI,
        5 => AMode::DI,
        6 => AMode::BP,
        _ => AMode::BX,
    }
}

/// the complete register file of the cpu
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisterState {
    /// AX, CX, DX, BX, SP, BP, SI, DI in ISA order
    pub gpr: [Register16; 8],
    /// ES, CS, SS, DS in ISA order
    pub sreg16: [u16; 4],
    pub ip: u16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn get_r8(&self, r: R) -> u8 {
        let idx = r.index();
        if !r.is_8bit() {
            log::warn!("get_r8 on non 8-bit register {}", r);
            return 0;
        }
        if idx < 4 {
            self.gpr[idx as usize].lo_u8()
        } else {
            self.gpr[(idx & 3) as usize].hi_u8()
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        let idx = r.index();
        if !r.is_8bit() {
            log::warn!("set_r8 on non 8-bit register {}", r);
            return;
        }
        if idx < 4 {
            self.gpr[idx as usize].set_lo(val);
        } else {
            self.gpr[(idx & 3) as usize].set_hi(val);
        }
    }

    /// reads a 16-bit general purpose or segment register
    pub fn get_r16(&self, r: R) -> u16 {
        if r.is_segment() {
            self.sreg16[r.index() as usize]
        } else if r.is_16bit() {
            self.gpr[r.index() as usize].val
        } else {
            log::warn!("get_r16 on 8-bit register {}", r);
            u16::from(self.get_r8(r))
        }
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        if r.is_segment() {
            self.sreg16[r.index() as usize] = val;
        } else if r.is_16bit() {
            self.gpr[r.index() as usize].val = val;
        } else {
            log::warn!("set_r16 on 8-bit register {}", r);
        }
    }
}

impl fmt::Display for RegisterState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "AX:{:04X}  BX:{:04X}  CX:{:04X}  DX:{:04X}  SI:{:04X}  DI:{:04X}  BP:{:04X}  SP:{:04X}",
            self.get_r16(R::AX), self.get_r16(R::BX), self.get_r16(R::CX), self.get_r16(R::DX),
            self.get_r16(R::SI), self.get_r16(R::DI), self.get_r16(R::BP), self.get_r16(R::SP),
        )?;
        write!(
            f,
            "DS:{:04X}  ES:{:04X}  SS:{:04X}  CS:{:04X}  IP:{:04X}  FLAGS:{:04X} {}",
            self.get_r16(R::DS), self.get_r16(R::ES), self.get_r16(R::SS), self.get_r16(R::CS),
            self.ip, self.flags.u16(), self.flags,
        )
    }
}
