use std::fmt;

use crate::cpu::Segment;
use crate::cpu::Op;
use crate::cpu::{Parameter, ParameterSet};
use crate::hex::hex_bytes;
use crate::string::right_pad;

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub command: Op,
    pub params: ParameterSet,
    pub length: u8,
    // op prefixes
    pub segment_prefix: Segment,    // segment prefix opcode
    pub repeat: RepeatMode,         // REPcc prefix
    pub lock: bool,                 // LOCK prefix
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let instr = self.describe_instruction();
        if self.segment_prefix == Segment::Default || self.memory_operand().is_some() {
            write!(f, "{}", instr)
        } else {
            write!(f, "{} {}", self.segment_prefix.as_str(), instr)
        }
    }
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction::new2(op, Parameter::None, Parameter::None)
    }

    pub fn new1(op: Op, dst: Parameter) -> Self {
        Instruction::new2(op, dst, Parameter::None)
    }

    pub fn new2(op: Op, dst: Parameter, src: Parameter) -> Self {
        Instruction {
            command: op,
            segment_prefix: Segment::Default,
            params: ParameterSet {dst, src},
            lock: false,
            repeat: RepeatMode::None,
            length: 0,
        }
    }

    /// the memory operand of the instruction, if any
    pub fn memory_operand(&self) -> Option<&Parameter> {
        if self.params.dst.is_ptr() {
            Some(&self.params.dst)
        } else if self.params.src.is_ptr() {
            Some(&self.params.src)
        } else {
            None
        }
    }

    /// the segment override in effect, from the prefix or from a memory operand
    pub fn segment_override(&self) -> Segment {
        if self.segment_prefix != Segment::Default {
            return self.segment_prefix;
        }
        self.memory_operand()
            .and_then(|p| p.segment())
            .unwrap_or(Segment::Default)
    }

    fn describe_instruction(&self) -> String {
        let op_space = 9;
        let mut prefix = String::new();
        if self.lock {
            prefix.push_str(&right_pad("Lock", op_space));
        }
        if self.repeat != RepeatMode::None {
            prefix.push_str(&right_pad(self.repeat.as_str(), op_space));
        }

        match self.params.dst {
            Parameter::None => format!("{}{}", prefix, self.command),
            _ => {
                let cmd = format!("{}{}", prefix, right_pad(&self.command.to_string(), op_space));
                match self.params.src {
                    Parameter::None => format!("{}{}", cmd, self.params.dst),
                    _ => format!("{}{}, {}", cmd, self.params.dst, self.params.src),
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct InstructionInfo {
    pub segment: u16,
    pub offset: u16,
    pub bytes: Vec<u8>,
    pub instruction: Instruction,
}

impl fmt::Display for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{:04X}:{:04X}] {} {}",
            self.segment,
            self.offset,
            right_pad(&hex_bytes(&self.bytes), 16),
            self.instruction,
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RepeatMode {
    None,
    Rep,
    Repe, // alias repz
    Repne, // alias repnz
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "",
            RepeatMode::Rep => "Rep",
            RepeatMode::Repe => "Repe",
            RepeatMode::Repne => "Repne",
        }
    }

    pub fn prefix_byte(self) -> Option<u8> {
        match self {
            RepeatMode::None => None,
            RepeatMode::Rep | RepeatMode::Repe => Some(0xF3),
            RepeatMode::Repne => Some(0xF2),
        }
    }
}

/// Instruction encoding layout for Mod/Reg/RM byte
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModRegRm {
    /// "mod" is correct name, but is reserved keyword
    /// High 2 bits
    pub md: u8,

    /// mid 3 bits
    pub reg: u8,

    /// low 3 bits
    pub rm: u8,
}

impl ModRegRm {
    pub fn u8(self) -> u8 {
        (self.md << 6) |  // high 2 bits
        (self.reg << 3) | // mid 3 bits
        self.rm           // low 3 bits
    }

    pub fn from_u8(b: u8) -> Self {
        ModRegRm {
            md: b >> 6,
            reg: (b >> 3) & 7,
            rm: b & 7,
        }
    }

    /// register to register addressing (mod 3)
    pub fn rm_reg(rm: u8, reg: u8) -> u8 {
        ModRegRm{md: 3, rm, reg}.u8()
    }
}

/// The 16-bit instruction word of the dual operand forms:
/// opcode (6 bits) | direction (1 bit) | width (1 bit) in the high byte,
/// mod (2 bits) | reg (3 bits) | rm (3 bits) in the low byte.
///
/// In the instruction stream the high byte comes first. Opcode tables list
/// the word as a little-endian u16, so `ADD AL,[BX]` (0x0207) is listed as
/// `07 02` and fetched as `02 07`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InstructionWord {
    pub opcode: u8,
    /// set when `reg` is the destination
    pub direction: bool,
    /// set for 16-bit operands
    pub wide: bool,
    pub modrm: ModRegRm,
}

impl InstructionWord {
    pub fn opcode_byte(self) -> u8 {
        (self.opcode << 2) | ((self.direction as u8) << 1) | self.wide as u8
    }

    pub fn u16(self) -> u16 {
        u16::from(self.opcode_byte()) << 8 | u16::from(self.modrm.u8())
    }

    pub fn from_u16(v: u16) -> Self {
        Self::from_bytes((v >> 8) as u8, v as u8)
    }

    /// unpacks a opcode byte and mod/reg/rm byte, in stream order
    pub fn from_bytes(opcode: u8, modrm: u8) -> Self {
        InstructionWord {
            opcode: opcode >> 2,
            direction: opcode & 2 != 0,
            wide: opcode & 1 != 0,
            modrm: ModRegRm::from_u8(modrm),
        }
    }

    /// the bytes in instruction stream order
    pub fn isa_bytes(self) -> [u8; 2] {
        [self.opcode_byte(), self.modrm.u8()]
    }

    /// the bytes in opcode table listing order
    pub fn listing_bytes(self) -> [u8; 2] {
        self.u16().to_le_bytes()
    }
}
