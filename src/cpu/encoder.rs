use crate::cpu::code_buffer::CodeBuffer;
use crate::cpu::instruction::{Instruction, ModRegRm};
use crate::cpu::parameter::{OperandSize, Parameter, ParameterSet};
use crate::cpu::register::{AMode, R};
use crate::cpu::op::Op;

#[cfg(test)]
#[path = "./encoder_test.rs"]
mod encoder_test;

quick_error! {
    #[derive(Debug, PartialEq)]
    pub enum EncodeError {
        UnhandledOp(op: Op) {
            display("unhandled op: {:?}", op)
        }
        UnhandledParameter(p: Parameter) {
            display("unhandled param: {:?}", p)
        }
        Malformed(msg: String) {
            display("malformed instruction: {}", msg)
        }
        BranchOutOfRange(op: Op, distance: i32) {
            display("{:?} target is {} bytes away, out of range", op, distance)
        }
    }
}

/// A encoder rule handles a range of opcodes. It returns `Ok(None)` to
/// decline the instruction, `Ok(Some(bytes))` to commit an encoding,
/// or `Err` for malformed input. The u16 is the offset of the opcode byte,
/// used to compute relative branch displacements.
pub type EncodeRule = fn(&Instruction, u16) -> Result<Option<Vec<u8>>, EncodeError>;

pub struct Encoder {
    rules: Vec<EncodeRule>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            rules: vec![
                encode_implied,
                encode_bcd,
                encode_mov,
                encode_arith,
                encode_test,
                encode_xchg,
                encode_inc_dec,
                encode_math,
                encode_bitshift,
                encode_push_pop,
                encode_load,
                encode_branch,
                encode_ret_int,
                encode_io,
            ],
        }
    }

    /// appends a rule to the chain. rules are tried in registration order
    pub fn register(&mut self, rule: EncodeRule) {
        self.rules.push(rule);
    }

    /// encodes a sequence of instructions placed from `origin`
    pub fn encode_vec(&self, ops: &[Instruction], origin: u16) -> Result<Vec<u8>, EncodeError> {
        let mut buf = CodeBuffer::new(origin);
        for op in ops {
            self.encode_into(op, &mut buf)?;
        }
        Ok(buf.into_bytes())
    }

    /// encodes Instruction to a valid byte sequence, placed at offset 0
    pub fn encode(&self, op: &Instruction) -> Result<Vec<u8>, EncodeError> {
        self.encode_at(op, 0)
    }

    /// encodes Instruction placed at `offset`
    pub fn encode_at(&self, op: &Instruction, offset: u16) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec!();
        if op.lock {
            out.push(0xF0);
        }
        if let Some(b) = op.segment_override().prefix_byte() {
            out.push(b);
        }
        if let Some(b) = op.repeat.prefix_byte() {
            out.push(b);
        }

        let at = offset.wrapping_add(out.len() as u16);
        for rule in &self.rules {
            if let Some(bytes) = rule(op, at)? {
                out.extend(bytes);
                return Ok(out);
            }
        }
        Err(EncodeError::UnhandledOp(op.command.clone()))
    }

    /// encodes Instruction at the current offset of `buf`, returning the encoded length
    pub fn encode_into(&self, op: &Instruction, buf: &mut CodeBuffer) -> Result<usize, EncodeError> {
        let bytes = self.encode_at(op, buf.offset())?;
        buf.extend(&bytes);
        Ok(bytes.len())
    }
}

fn malformed(ins: &Instruction, msg: &str) -> EncodeError {
    EncodeError::Malformed(format!("{}: {}", ins.command, msg))
}

fn expect_params(ins: &Instruction, n: usize) -> Result<(), EncodeError> {
    if ins.params.count() != n {
        return Err(malformed(ins, &format!("expected {} operands, got {}", n, ins.params.count())));
    }
    Ok(())
}

/// checks that the sized operands of `ins` all have width `size`
fn expect_width(ins: &Instruction, size: OperandSize) -> Result<(), EncodeError> {
    for p in &[&ins.params.dst, &ins.params.src] {
        if let Some(s) = p.size() {
            if s != size {
                return Err(malformed(ins, &format!("operand {} is not {}-bit", p, size.bits())));
            }
        }
    }
    Ok(())
}

fn op_size(op: &Op) -> OperandSize {
    match *op {
        Op::Add8 | Op::Or8 | Op::Adc8 | Op::Sbb8 | Op::And8 | Op::Sub8 | Op::Xor8 | Op::Cmp8 |
        Op::Mov8 | Op::Test8 | Op::Xchg8 | Op::Inc8 | Op::Dec8 |
        Op::Not8 | Op::Neg8 | Op::Mul8 | Op::Imul8 | Op::Div8 | Op::Idiv8 |
        Op::Rol8 | Op::Ror8 | Op::Rcl8 | Op::Rcr8 | Op::Shl8 | Op::Shr8 | Op::Sar8 |
        Op::In8 | Op::Out8 => OperandSize::_8bit,
        _ => OperandSize::_16bit,
    }
}

/// width bit of the opcode
fn w(size: OperandSize) -> u8 {
    match size {
        OperandSize::_8bit => 0,
        OperandSize::_16bit => 1,
    }
}

fn imm16_value(p: &Parameter) -> Option<u16> {
    match *p {
        Parameter::Imm8(v) => Some(u16::from(v)),
        Parameter::ImmS8(v) => Some(v as i16 as u16),
        Parameter::Imm16(v) => Some(v),
        _ => None,
    }
}

fn imm8_value(p: &Parameter) -> Option<u8> {
    match *p {
        Parameter::Imm8(v) => Some(v),
        Parameter::ImmS8(v) => Some(v as u8),
        _ => None,
    }
}

fn is_rm(p: &Parameter) -> bool {
    match *p {
        Parameter::Reg8(_) | Parameter::Reg16(_) => true,
        _ => p.is_ptr(),
    }
}

fn encode_implied(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let b = match ins.command {
        Op::Daa => 0x27,
        Op::Das => 0x2F,
        Op::Aaa => 0x37,
        Op::Aas => 0x3F,
        Op::Nop => 0x90,
        Op::Cbw => 0x98,
        Op::Cwd => 0x99,
        Op::Wait => 0x9B,
        Op::Pushf => 0x9C,
        Op::Popf => 0x9D,
        Op::Sahf => 0x9E,
        Op::Lahf => 0x9F,
        Op::Movsb => 0xA4,
        Op::Movsw => 0xA5,
        Op::Cmpsb => 0xA6,
        Op::Cmpsw => 0xA7,
        Op::Stosb => 0xAA,
        Op::Stosw => 0xAB,
        Op::Lodsb => 0xAC,
        Op::Lodsw => 0xAD,
        Op::Scasb => 0xAE,
        Op::Scasw => 0xAF,
        Op::Into => 0xCE,
        Op::Iret => 0xCF,
        Op::Salc => 0xD6,
        Op::Xlatb => 0xD7,
        Op::Hlt => 0xF4,
        Op::Cmc => 0xF5,
        Op::Clc => 0xF8,
        Op::Stc => 0xF9,
        Op::Cli => 0xFA,
        Op::Sti => 0xFB,
        Op::Cld => 0xFC,
        Op::Std => 0xFD,
        _ => return Ok(None),
    };
    expect_params(ins, 0)?;
    Ok(Some(vec!(b)))
}

fn encode_bcd(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let b = match ins.command {
        Op::Aam => 0xD4,
        Op::Aad => 0xD5,
        _ => return Ok(None),
    };
    let base = match ins.params.dst {
        Parameter::None => 10,
        Parameter::Imm8(v) => v,
        ref p => return Err(EncodeError::UnhandledParameter(p.clone())),
    };
    Ok(Some(vec!(b, base)))
}

fn encode_mov(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let size = match ins.command {
        Op::Mov8 => OperandSize::_8bit,
        Op::Mov16 => OperandSize::_16bit,
        _ => return Ok(None),
    };
    expect_params(ins, 2)?;
    expect_width(ins, size)?;
    let mut out = vec!();
    let (dst, src) = (&ins.params.dst, &ins.params.src);
    match (dst, src) {
        (Parameter::SReg16(r), _) => {
            if *r == R::CS {
                return Err(malformed(ins, "cs can not be a destination"));
            }
            if !is_rm(src) {
                return Err(EncodeError::UnhandledParameter(src.clone()));
            }
            out.push(0x8E);
            out.extend(encode_rm(src, r.index())?);
        }
        (_, Parameter::SReg16(r)) => {
            if !is_rm(dst) {
                return Err(EncodeError::UnhandledParameter(dst.clone()));
            }
            out.push(0x8C);
            out.extend(encode_rm(dst, r.index())?);
        }
        (Parameter::Reg8(r), _) if src.is_imm() => {
            // mov r8, imm8
            out.push(0xB0 | r.index());
            out.push(imm8_value(src).ok_or_else(|| EncodeError::UnhandledParameter(src.clone()))?);
        }
        (Parameter::Reg16(r), _) if src.is_imm() => {
            // mov r16, imm16
            out.push(0xB8 | r.index());
            out.extend(&imm16_value(src).unwrap_or(0).to_le_bytes());
        }
        (Parameter::Reg8(R::AL), Parameter::Ptr8(_, v)) |
        (Parameter::Reg16(R::AX), Parameter::Ptr16(_, v)) => {
            // mov AL/AX, moffs
            out.push(0xA0 | w(size));
            out.extend(&v.to_le_bytes());
        }
        (Parameter::Ptr8(_, v), Parameter::Reg8(R::AL)) |
        (Parameter::Ptr16(_, v), Parameter::Reg16(R::AX)) => {
            // mov moffs, AL/AX
            out.push(0xA2 | w(size));
            out.extend(&v.to_le_bytes());
        }
        _ if dst.is_ptr() && src.is_imm() => {
            // mov r/m, imm
            out.push(0xC6 | w(size));
            out.extend(encode_rm(dst, 0)?);
            match size {
                OperandSize::_8bit => out.push(imm8_value(src).ok_or_else(|| EncodeError::UnhandledParameter(src.clone()))?),
                OperandSize::_16bit => out.extend(&imm16_value(src).unwrap_or(0).to_le_bytes()),
            }
        }
        _ if is_rm(dst) && src.is_reg() => {
            // mov r/m, reg
            out.push(0x88 | w(size));
            out.extend(encode_rm_r(&ins.params)?);
        }
        _ if dst.is_reg() && src.is_ptr() => {
            // mov reg, r/m
            out.push(0x8A | w(size));
            out.extend(encode_r_rm(&ins.params)?);
        }
        _ => return Err(malformed(ins, "unsupported operand combination")),
    }
    Ok(Some(out))
}

fn arith_index(op: &Op) -> Option<u8> {
    match *op {
        Op::Add8 | Op::Add16 => Some(0),
        Op::Or8  | Op::Or16  => Some(1),
        Op::Adc8 | Op::Adc16 => Some(2),
        Op::Sbb8 | Op::Sbb16 => Some(3),
        Op::And8 | Op::And16 => Some(4),
        Op::Sub8 | Op::Sub16 => Some(5),
        Op::Xor8 | Op::Xor16 => Some(6),
        Op::Cmp8 | Op::Cmp16 => Some(7),
        _ => None,
    }
}

fn encode_arith(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let idx = match arith_index(&ins.command) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let size = op_size(&ins.command);
    expect_params(ins, 2)?;
    expect_width(ins, size)?;
    let base = idx << 3;
    let mut out = vec!();
    let (dst, src) = (&ins.params.dst, &ins.params.src);
    match (size, dst, src) {
        (OperandSize::_8bit, Parameter::Reg8(R::AL), Parameter::Imm8(i)) => {
            // <arith> AL, imm8
            out.push(base | 4);
            out.push(*i);
        }
        (OperandSize::_16bit, Parameter::Reg16(R::AX), Parameter::Imm16(i)) => {
            // <arith> AX, imm16
            out.push(base | 5);
            out.extend(&i.to_le_bytes());
        }
        (OperandSize::_16bit, _, Parameter::ImmS8(i)) if is_rm(dst) => {
            // <arith> r/m16, imm8 (sign extended)
            out.push(0x83);
            out.extend(encode_rm(dst, idx)?);
            out.push(*i as u8);
        }
        (OperandSize::_8bit, _, _) if is_rm(dst) && src.is_imm() => {
            // <arith> r/m8, imm8
            out.push(0x80);
            out.extend(encode_rm(dst, idx)?);
            out.push(imm8_value(src).ok_or_else(|| EncodeError::UnhandledParameter(src.clone()))?);
        }
        (OperandSize::_16bit, _, _) if is_rm(dst) && src.is_imm() => {
            // <arith> r/m16, imm16
            out.push(0x81);
            out.extend(encode_rm(dst, idx)?);
            out.extend(&imm16_value(src).unwrap_or(0).to_le_bytes());
        }
        _ if is_rm(dst) && src.is_reg() => {
            // <arith> r/m, reg
            out.push(base | w(size));
            out.extend(encode_rm_r(&ins.params)?);
        }
        _ if dst.is_reg() && src.is_ptr() => {
            // <arith> reg, r/m
            out.push(base | 2 | w(size));
            out.extend(encode_r_rm(&ins.params)?);
        }
        _ => return Err(malformed(ins, "unsupported operand combination")),
    }
    Ok(Some(out))
}

fn encode_test(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let size = match ins.command {
        Op::Test8 => OperandSize::_8bit,
        Op::Test16 => OperandSize::_16bit,
        _ => return Ok(None),
    };
    expect_params(ins, 2)?;
    expect_width(ins, size)?;
    let mut out = vec!();
    let (dst, src) = (&ins.params.dst, &ins.params.src);
    match (dst, src) {
        (Parameter::Reg8(R::AL), Parameter::Imm8(i)) => {
            out.push(0xA8);
            out.push(*i);
        }
        (Parameter::Reg16(R::AX), _) if src.is_imm() => {
            out.push(0xA9);
            out.extend(&imm16_value(src).unwrap_or(0).to_le_bytes());
        }
        _ if is_rm(dst) && src.is_imm() => {
            // test r/m, imm
            out.push(0xF6 | w(size));
            out.extend(encode_rm(dst, 0)?);
            match size {
                OperandSize::_8bit => out.push(imm8_value(src).ok_or_else(|| EncodeError::UnhandledParameter(src.clone()))?),
                OperandSize::_16bit => out.extend(&imm16_value(src).unwrap_or(0).to_le_bytes()),
            }
        }
        _ if is_rm(dst) && src.is_reg() => {
            out.push(0x84 | w(size));
            out.extend(encode_rm_r(&ins.params)?);
        }
        _ if dst.is_reg() && src.is_ptr() => {
            // test is commutative, the memory operand goes in r/m
            out.push(0x84 | w(size));
            out.extend(encode_r_rm(&ins.params)?);
        }
        _ => return Err(malformed(ins, "unsupported operand combination")),
    }
    Ok(Some(out))
}

fn encode_xchg(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let size = match ins.command {
        Op::Xchg8 => OperandSize::_8bit,
        Op::Xchg16 => OperandSize::_16bit,
        _ => return Ok(None),
    };
    expect_params(ins, 2)?;
    expect_width(ins, size)?;
    let mut out = vec!();
    let (dst, src) = (&ins.params.dst, &ins.params.src);
    match (dst, src) {
        (Parameter::Reg16(R::AX), Parameter::Reg16(r)) if *r != R::AX => {
            // xchg ax, r16
            out.push(0x90 | r.index());
        }
        _ if is_rm(dst) && src.is_reg() => {
            out.push(0x86 | w(size));
            out.extend(encode_rm_r(&ins.params)?);
        }
        _ if dst.is_reg() && src.is_ptr() => {
            out.push(0x86 | w(size));
            out.extend(encode_r_rm(&ins.params)?);
        }
        _ => return Err(malformed(ins, "unsupported operand combination")),
    }
    Ok(Some(out))
}

fn feff_index(op: &Op) -> Option<u8> {
    match *op {
        Op::Inc8 | Op::Inc16 => Some(0),
        Op::Dec8 | Op::Dec16 => Some(1),
        Op::CallNear => Some(2),
        Op::CallFar => Some(3),
        Op::JmpNear => Some(4),
        Op::JmpFar => Some(5),
        Op::Push16 => Some(6),
        _ => None,
    }
}

fn encode_inc_dec(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let size = match ins.command {
        Op::Inc8 | Op::Dec8 => OperandSize::_8bit,
        Op::Inc16 | Op::Dec16 => OperandSize::_16bit,
        _ => return Ok(None),
    };
    let idx = feff_index(&ins.command).unwrap_or(0);
    expect_params(ins, 1)?;
    expect_width(ins, size)?;
    let mut out = vec!();
    match ins.params.dst {
        Parameter::Reg16(r) => {
            // 0x40...0x47: inc r16
            // 0x48...0x4F: dec r16
            out.push(0x40 | (idx << 3) | r.index());
        }
        ref dst if is_rm(dst) => {
            out.push(0xFE | w(size));
            out.extend(encode_rm(dst, idx)?);
        }
        ref dst => return Err(EncodeError::UnhandledParameter(dst.clone())),
    }
    Ok(Some(out))
}

fn math_index(op: &Op) -> Option<u8> {
    match *op {
        Op::Not8 | Op::Not16 => Some(2),
        Op::Neg8 | Op::Neg16 => Some(3),
        Op::Mul8 | Op::Mul16 => Some(4),
        Op::Imul8 | Op::Imul16 => Some(5),
        Op::Div8 | Op::Div16 => Some(6),
        Op::Idiv8 | Op::Idiv16 => Some(7),
        _ => None,
    }
}

fn encode_math(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let idx = match math_index(&ins.command) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let size = op_size(&ins.command);
    expect_params(ins, 1)?;
    expect_width(ins, size)?;
    if !is_rm(&ins.params.dst) {
        return Err(EncodeError::UnhandledParameter(ins.params.dst.clone()));
    }
    let mut out = vec!(0xF6 | w(size));
    out.extend(encode_rm(&ins.params.dst, idx)?);
    Ok(Some(out))
}

fn bitshift_index(op: &Op) -> Option<u8> {
    match *op {
        Op::Rol8 | Op::Rol16 => Some(0),
        Op::Ror8 | Op::Ror16 => Some(1),
        Op::Rcl8 | Op::Rcl16 => Some(2),
        Op::Rcr8 | Op::Rcr16 => Some(3),
        Op::Shl8 | Op::Shl16 => Some(4),
        Op::Shr8 | Op::Shr16 => Some(5),
        Op::Sar8 | Op::Sar16 => Some(7),
        _ => None,
    }
}

fn encode_bitshift(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let idx = match bitshift_index(&ins.command) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let size = op_size(&ins.command);
    expect_params(ins, 2)?;
    if ins.params.dst.size() != Some(size) || !is_rm(&ins.params.dst) {
        return Err(malformed(ins, &format!("operand {} is not a {}-bit register or memory", ins.params.dst, size.bits())));
    }
    let opcode = match ins.params.src {
        Parameter::Imm8(1) => 0xD0,
        Parameter::Reg8(R::CL) => 0xD2,
        _ => return Err(malformed(ins, "shift count must be 1 or cl")),
    };
    let mut out = vec!(opcode | w(size));
    out.extend(encode_rm(&ins.params.dst, idx)?);
    Ok(Some(out))
}

fn encode_push_pop(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let push = match ins.command {
        Op::Push16 => true,
        Op::Pop16 => false,
        _ => return Ok(None),
    };
    expect_params(ins, 1)?;
    let mut out = vec!();
    match ins.params.dst {
        Parameter::Reg16(r) => {
            let base = if push { 0x50 } else { 0x58 };
            out.push(base | r.index());
        }
        Parameter::SReg16(r) => {
            if !push && r == R::CS {
                return Err(malformed(ins, "cs can not be popped"));
            }
            let base = if push { 0x06 } else { 0x07 };
            out.push((r.index() << 3) | base);
        }
        ref dst if dst.is_ptr() && dst.size() == Some(OperandSize::_16bit) => {
            if push {
                out.push(0xFF);
                out.extend(encode_rm(dst, 6)?);
            } else {
                out.push(0x8F);
                out.extend(encode_rm(dst, 0)?);
            }
        }
        ref dst => return Err(malformed(ins, &format!("operand {} must be a 16-bit register or memory", dst))),
    }
    Ok(Some(out))
}

fn encode_load(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let opcode = match ins.command {
        Op::Lea16 => 0x8D,
        Op::Les => 0xC4,
        Op::Lds => 0xC5,
        _ => return Ok(None),
    };
    expect_params(ins, 2)?;
    if !ins.params.src.is_ptr() {
        return Err(malformed(ins, "source must be a memory operand"));
    }
    let mut out = vec!(opcode);
    match ins.params.dst {
        Parameter::Reg16(r) => out.extend(encode_rm(&ins.params.src, r.index())?),
        _ => return Err(malformed(ins, "destination must be a 16-bit register")),
    }
    Ok(Some(out))
}

fn short_branch_opcode(op: &Op) -> Option<u8> {
    match *op {
        Op::Jo => Some(0x70),
        Op::Jno => Some(0x71),
        Op::Jc => Some(0x72),
        Op::Jnc => Some(0x73),
        Op::Jz => Some(0x74),
        Op::Jnz => Some(0x75),
        Op::Jna => Some(0x76),
        Op::Ja => Some(0x77),
        Op::Js => Some(0x78),
        Op::Jns => Some(0x79),
        Op::Jpe => Some(0x7A),
        Op::Jpo => Some(0x7B),
        Op::Jl => Some(0x7C),
        Op::Jnl => Some(0x7D),
        Op::Jng => Some(0x7E),
        Op::Jg => Some(0x7F),
        Op::Loopne => Some(0xE0),
        Op::Loope => Some(0xE1),
        Op::Loop => Some(0xE2),
        Op::Jcxz => Some(0xE3),
        Op::JmpShort => Some(0xEB),
        _ => None,
    }
}

fn branch_target(ins: &Instruction) -> Result<u16, EncodeError> {
    match ins.params.dst {
        Parameter::Imm16(v) => Ok(v),
        Parameter::Imm8(v) => Ok(u16::from(v)),
        ref p => Err(EncodeError::UnhandledParameter(p.clone())),
    }
}

fn encode_branch(ins: &Instruction, at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    if let Some(opcode) = short_branch_opcode(&ins.command) {
        expect_params(ins, 1)?;
        let target = branch_target(ins)?;
        let rel = target.wrapping_sub(at.wrapping_add(2)) as i16;
        if rel < -128 || rel > 127 {
            return Err(EncodeError::BranchOutOfRange(ins.command.clone(), i32::from(rel)));
        }
        return Ok(Some(vec!(opcode, rel as i8 as u8)));
    }

    let (rel_opcode, far_opcode, near) = match ins.command {
        Op::CallNear => (0xE8, 0x9A, true),
        Op::JmpNear => (0xE9, 0xEA, true),
        Op::CallFar => (0xE8, 0x9A, false),
        Op::JmpFar => (0xE9, 0xEA, false),
        _ => return Ok(None),
    };
    expect_params(ins, 1)?;
    let idx = feff_index(&ins.command).unwrap_or(0);
    let mut out = vec!();
    match ins.params.dst {
        Parameter::Imm16(target) if near => {
            // rel16, relative to the next instruction
            out.push(rel_opcode);
            out.extend(&target.wrapping_sub(at.wrapping_add(3)).to_le_bytes());
        }
        Parameter::Reg16(_) if near => {
            out.push(0xFF);
            out.extend(encode_rm(&ins.params.dst, idx)?);
        }
        Parameter::Ptr16Imm(seg, off) if !near => {
            out.push(far_opcode);
            out.extend(&off.to_le_bytes());
            out.extend(&seg.to_le_bytes());
        }
        ref dst if dst.is_ptr() => {
            // indirect through memory, a word for near and a dword for far
            out.push(0xFF);
            out.extend(encode_rm(dst, idx)?);
        }
        ref dst => return Err(malformed(ins, &format!("unsupported target {}", dst))),
    }
    Ok(Some(out))
}

fn encode_ret_int(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let mut out = vec!();
    match (&ins.command, &ins.params.dst) {
        (Op::Retn, Parameter::None) => out.push(0xC3),
        (Op::Retn, Parameter::Imm16(n)) => {
            out.push(0xC2);
            out.extend(&n.to_le_bytes());
        }
        (Op::Retf, Parameter::None) => out.push(0xCB),
        (Op::Retf, Parameter::Imm16(n)) => {
            out.push(0xCA);
            out.extend(&n.to_le_bytes());
        }
        (Op::Int, Parameter::Imm8(3)) => out.push(0xCC),
        (Op::Int, Parameter::Imm8(n)) => {
            out.push(0xCD);
            out.push(*n);
        }
        (Op::Retn, p) | (Op::Retf, p) | (Op::Int, p) => return Err(EncodeError::UnhandledParameter(p.clone())),
        _ => return Ok(None),
    }
    Ok(Some(out))
}

fn encode_io(ins: &Instruction, _at: u16) -> Result<Option<Vec<u8>>, EncodeError> {
    let (input, size) = match ins.command {
        Op::In8 => (true, OperandSize::_8bit),
        Op::In16 => (true, OperandSize::_16bit),
        Op::Out8 => (false, OperandSize::_8bit),
        Op::Out16 => (false, OperandSize::_16bit),
        _ => return Ok(None),
    };
    expect_params(ins, 2)?;
    let (data, port) = if input {
        (&ins.params.dst, &ins.params.src)
    } else {
        (&ins.params.src, &ins.params.dst)
    };
    let accumulator = match (size, data) {
        (OperandSize::_8bit, Parameter::Reg8(R::AL)) | (OperandSize::_16bit, Parameter::Reg16(R::AX)) => true,
        _ => false,
    };
    if !accumulator {
        let which = if input { "destination" } else { "source" };
        return Err(malformed(ins, &format!("{} must be al or ax", which)));
    }
    let base = if input { 0xE4 } else { 0xE6 };
    let mut out = vec!();
    match *port {
        Parameter::Imm8(p) => {
            out.push(base | w(size));
            out.push(p);
        }
        Parameter::Reg16(R::DX) => out.push(base | 0x08 | w(size)),
        _ => return Err(malformed(ins, "port must be imm8 or dx")),
    }
    Ok(Some(out))
}

/// encodes `reg` as the reg field with the r/m destination `dst`
pub fn encode_rm(dst: &Parameter, reg: u8) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    match *dst {
        Parameter::Ptr8(_, imm16) |
        Parameter::Ptr16(_, imm16) => {
            out.push(ModRegRm{md: 0, rm: 6, reg}.u8());
            out.extend(&imm16.to_le_bytes());
        }
        Parameter::Ptr8Amode(_, amode) |
        Parameter::Ptr16Amode(_, amode) => {
            if amode == AMode::BP {
                // [bp] has no mod 0 form, use a zero displacement
                out.push(ModRegRm{md: 1, rm: 6, reg}.u8());
                out.push(0);
            } else {
                out.push(ModRegRm{md: 0, rm: amode.index(), reg}.u8());
            }
        }
        Parameter::Ptr8AmodeS8(_, amode, imm) |
        Parameter::Ptr16AmodeS8(_, amode, imm) => {
            out.push(ModRegRm{md: 1, rm: amode.index(), reg}.u8());
            out.push(imm as u8);
        }
        Parameter::Ptr8AmodeS16(_, amode, imm16) |
        Parameter::Ptr16AmodeS16(_, amode, imm16) => {
            out.push(ModRegRm{md: 2, rm: amode.index(), reg}.u8());
            out.extend(&imm16.to_le_bytes());
        }
        Parameter::Reg8(r) |
        Parameter::Reg16(r) => {
            out.push(ModRegRm::rm_reg(r.index(), reg));
        }
        _ => return Err(EncodeError::UnhandledParameter(dst.clone())),
    }
    Ok(out)
}

/// encodes "reg, r/m" operands
fn encode_r_rm(params: &ParameterSet) -> Result<Vec<u8>, EncodeError> {
    match params.dst {
        Parameter::Reg8(r) |
        Parameter::Reg16(r) => encode_rm(&params.src, r.index()),
        _ => Err(EncodeError::UnhandledParameter(params.dst.clone())),
    }
}

/// encodes "r/m, reg" operands
fn encode_rm_r(params: &ParameterSet) -> Result<Vec<u8>, EncodeError> {
    match params.src {
        Parameter::Reg8(r) |
        Parameter::Reg16(r) => encode_rm(&params.dst, r.index()),
        _ => Err(EncodeError::UnhandledParameter(params.src.clone())),
    }
}
