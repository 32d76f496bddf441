use std::fmt;

use crate::cpu::segment::Segment;
use crate::cpu::register::{AMode, R};

/// A set of Parameters for an Instruction
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    pub dst: Parameter,
    pub src: Parameter,
}

impl ParameterSet {
    // returns the number of parameters
    pub fn count(&self) -> usize {
        match self.dst {
            Parameter::None => 0,
            _ => match self.src {
                Parameter::None => 1,
                _ => 2,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandSize {
    _8bit,
    _16bit,
}

impl OperandSize {
    pub fn mask(self) -> u16 {
        match self {
            OperandSize::_8bit => 0xFF,
            OperandSize::_16bit => 0xFFFF,
        }
    }

    pub fn sign_bit(self) -> u16 {
        match self {
            OperandSize::_8bit => 0x80,
            OperandSize::_16bit => 0x8000,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            OperandSize::_8bit => 8,
            OperandSize::_16bit => 16,
        }
    }
}

/// classification of a operand
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    Register,
    Memory,
    Immediate,
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    /// 8-bit general purpose register
    Reg8(R),
    /// 16-bit general purpose register
    Reg16(R),
    /// 16-bit segment register
    SReg16(R),

    Imm8(u8),                           // byte 0x80
    ImmS8(i8),                          // byte +0x3f
    Imm16(u16),                         // word 0x8000
    Ptr16Imm(u16, u16),                 // jmp far u16:u16

    Ptr8(Segment, u16),                 // byte [u16], like "byte [0x4040]"
    Ptr8Amode(Segment, AMode),          // byte [amode], like "byte [bx]"
    Ptr8AmodeS8(Segment, AMode, i8),    // byte [amode+s8], like "byte [bp-0x20]"
    Ptr8AmodeS16(Segment, AMode, i16),  // byte [amode+s16], like "byte [bp-0x2020]"

    Ptr16(Segment, u16),                // word [u16], like "word [0x4040]"
    Ptr16Amode(Segment, AMode),         // word [amode], like "word [bx]"
    Ptr16AmodeS8(Segment, AMode, i8),   // word [amode+s8], like "word [bp-0x20]"
    Ptr16AmodeS16(Segment, AMode, i16), // word [amode+s16], like "word [bp-0x2020]"

    None,
}

fn signed_hex8(imm: i8) -> String {
    if imm < 0 {
        format!("-0x{:02X}", (0i8).wrapping_sub(imm) as u8)
    } else {
        format!("+0x{:02X}", imm)
    }
}

fn signed_hex16(imm: i16) -> String {
    if imm < 0 {
        format!("-0x{:04X}", (0i16).wrapping_sub(imm) as u16)
    } else {
        format!("+0x{:04X}", imm)
    }
}

/// the segment shown for a memory operand, resolving the default segment
fn seg_str(seg: Segment, amode: Option<AMode>) -> &'static str {
    match (seg, amode) {
        (Segment::Default, Some(a)) if a.uses_bp() => "ss",
        _ => seg.as_str(),
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Parameter::Reg8(r) |
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => write!(f, "{}", r),

            Parameter::Imm8(imm) => write!(f, "0x{:02X}", imm),
            Parameter::Imm16(imm) => write!(f, "0x{:04X}", imm),
            Parameter::ImmS8(imm) => write!(f, "byte {}", signed_hex8(imm)),
            Parameter::Ptr16Imm(seg, v) => write!(f, "{:04X}:{:04X}", seg, v),
            Parameter::Ptr8(seg, v) => write!(f, "byte [{}:0x{:04X}]", seg_str(seg, None), v),
            Parameter::Ptr8Amode(seg, amode) => write!(f, "byte [{}:{}]", seg_str(seg, Some(amode)), amode),
            Parameter::Ptr8AmodeS8(seg, amode, imm) => {
                write!(f, "byte [{}:{}{}]", seg_str(seg, Some(amode)), amode, signed_hex8(imm))
            }
            Parameter::Ptr8AmodeS16(seg, amode, imm) => {
                write!(f, "byte [{}:{}{}]", seg_str(seg, Some(amode)), amode, signed_hex16(imm))
            }
            Parameter::Ptr16(seg, v) => write!(f, "word [{}:0x{:04X}]", seg_str(seg, None), v),
            Parameter::Ptr16Amode(seg, amode) => write!(f, "word [{}:{}]", seg_str(seg, Some(amode)), amode),
            Parameter::Ptr16AmodeS8(seg, amode, imm) => {
                write!(f, "word [{}:{}{}]", seg_str(seg, Some(amode)), amode, signed_hex8(imm))
            }
            Parameter::Ptr16AmodeS16(seg, amode, imm) => {
                write!(f, "word [{}:{}{}]", seg_str(seg, Some(amode)), amode, signed_hex16(imm))
            }
            Parameter::None => write!(f, ""),
        }
    }
}

impl Parameter {
    pub fn is_imm(&self) -> bool {
        match *self {
            Parameter::Imm8(_) |
            Parameter::Imm16(_) |
            Parameter::ImmS8(_) => true,
            _ => false,
        }
    }

    /// true for memory operands
    pub fn is_ptr(&self) -> bool {
        match *self {
            Parameter::Ptr8(_, _) |
            Parameter::Ptr16(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => true,
            _ => false,
        }
    }

    pub fn is_reg(&self) -> bool {
        match *self {
            Parameter::Reg8(_) |
            Parameter::Reg16(_) |
            Parameter::SReg16(_) => true,
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Parameter::None
    }

    pub fn kind(&self) -> ParameterKind {
        if self.is_reg() {
            ParameterKind::Register
        } else if self.is_ptr() {
            ParameterKind::Memory
        } else if self.is_imm() || matches!(*self, Parameter::Ptr16Imm(_, _)) {
            ParameterKind::Immediate
        } else {
            ParameterKind::None
        }
    }

    /// operand width, selecting the ALU width. `ImmS8` is sign extended and has no fixed width
    pub fn size(&self) -> Option<OperandSize> {
        match *self {
            Parameter::Reg8(_) |
            Parameter::Imm8(_) |
            Parameter::Ptr8(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) => Some(OperandSize::_8bit),
            Parameter::Reg16(_) |
            Parameter::SReg16(_) |
            Parameter::Imm16(_) |
            Parameter::Ptr16(_, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => Some(OperandSize::_16bit),
            _ => None,
        }
    }

    /// the segment override of a memory operand
    pub fn segment(&self) -> Option<Segment> {
        match *self {
            Parameter::Ptr8(seg, _) |
            Parameter::Ptr16(seg, _) |
            Parameter::Ptr8Amode(seg, _) |
            Parameter::Ptr8AmodeS8(seg, _, _) |
            Parameter::Ptr8AmodeS16(seg, _, _) |
            Parameter::Ptr16Amode(seg, _) |
            Parameter::Ptr16AmodeS8(seg, _, _) |
            Parameter::Ptr16AmodeS16(seg, _, _) => Some(seg),
            _ => None,
        }
    }

    pub fn amode(&self) -> Option<AMode> {
        match *self {
            Parameter::Ptr8Amode(_, a) |
            Parameter::Ptr8AmodeS8(_, a, _) |
            Parameter::Ptr8AmodeS16(_, a, _) |
            Parameter::Ptr16Amode(_, a) |
            Parameter::Ptr16AmodeS8(_, a, _) |
            Parameter::Ptr16AmodeS16(_, a, _) => Some(a),
            _ => None,
        }
    }
}
