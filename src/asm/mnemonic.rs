use crate::asm::parser::{Expr, MemRef, Operand, Prefix};
use crate::cpu::{Instruction, Op, OperandSize, Parameter, RepeatMode, Segment, R};

#[cfg(test)]
#[path = "./mnemonic_test.rs"]
mod mnemonic_test;

/// resolves label references to offsets
pub trait Resolve {
    fn resolve(&self, name: &str) -> Result<u16, String>;
}

/// lowers a parsed mnemonic with operands to a Instruction for the encoder
pub fn lower(mnemonic: &str, operands: &[Operand], prefixes: &[Prefix], symbols: &dyn Resolve) -> Result<Instruction, String> {
    let mut ins = lower_op(mnemonic, operands, symbols)?;
    for prefix in prefixes {
        match *prefix {
            Prefix::Rep => ins.repeat = RepeatMode::Rep,
            Prefix::Repe => ins.repeat = RepeatMode::Repe,
            Prefix::Repne => ins.repeat = RepeatMode::Repne,
            Prefix::Lock => ins.lock = true,
            Prefix::Segment(seg) => ins.segment_prefix = seg,
        }
    }
    if ins.repeat != RepeatMode::None && !ins.command.is_string_op() {
        return Err(format!("{} can not be repeated", mnemonic));
    }

    // the override of a memory operand is emitted as prefix
    if let Some(seg) = ins.memory_operand().and_then(|p| p.segment()) {
        if seg != Segment::Default {
            if ins.segment_prefix != Segment::Default && ins.segment_prefix != seg {
                return Err("conflicting segment overrides".to_owned());
            }
            ins.segment_prefix = seg;
        }
    }
    Ok(ins)
}

fn implied(mnemonic: &str) -> Option<Op> {
    let op = match mnemonic {
        "aaa" => Op::Aaa,
        "aas" => Op::Aas,
        "daa" => Op::Daa,
        "das" => Op::Das,
        "nop" => Op::Nop,
        "cbw" => Op::Cbw,
        "cwd" => Op::Cwd,
        "wait" | "fwait" => Op::Wait,
        "pushf" => Op::Pushf,
        "popf" => Op::Popf,
        "sahf" => Op::Sahf,
        "lahf" => Op::Lahf,
        "movsb" => Op::Movsb,
        "movsw" => Op::Movsw,
        "cmpsb" => Op::Cmpsb,
        "cmpsw" => Op::Cmpsw,
        "stosb" => Op::Stosb,
        "stosw" => Op::Stosw,
        "lodsb" => Op::Lodsb,
        "lodsw" => Op::Lodsw,
        "scasb" => Op::Scasb,
        "scasw" => Op::Scasw,
        "into" => Op::Into,
        "iret" => Op::Iret,
        "salc" | "setalc" => Op::Salc,
        "xlat" | "xlatb" => Op::Xlatb,
        "hlt" => Op::Hlt,
        "cmc" => Op::Cmc,
        "clc" => Op::Clc,
        "stc" => Op::Stc,
        "cli" => Op::Cli,
        "sti" => Op::Sti,
        "cld" => Op::Cld,
        "std" => Op::Std,
        _ => return None,
    };
    Some(op)
}

/// two operand ops, as (8-bit, 16-bit) pair
fn dual(mnemonic: &str) -> Option<(Op, Op)> {
    let ops = match mnemonic {
        "mov" => (Op::Mov8, Op::Mov16),
        "add" => (Op::Add8, Op::Add16),
        "or" => (Op::Or8, Op::Or16),
        "adc" => (Op::Adc8, Op::Adc16),
        "sbb" => (Op::Sbb8, Op::Sbb16),
        "and" => (Op::And8, Op::And16),
        "sub" => (Op::Sub8, Op::Sub16),
        "xor" => (Op::Xor8, Op::Xor16),
        "cmp" => (Op::Cmp8, Op::Cmp16),
        "test" => (Op::Test8, Op::Test16),
        "xchg" => (Op::Xchg8, Op::Xchg16),
        _ => return None,
    };
    Some(ops)
}

/// single operand ops, as (8-bit, 16-bit) pair
fn single(mnemonic: &str) -> Option<(Op, Op)> {
    let ops = match mnemonic {
        "inc" => (Op::Inc8, Op::Inc16),
        "dec" => (Op::Dec8, Op::Dec16),
        "not" => (Op::Not8, Op::Not16),
        "neg" => (Op::Neg8, Op::Neg16),
        "mul" => (Op::Mul8, Op::Mul16),
        "imul" => (Op::Imul8, Op::Imul16),
        "div" => (Op::Div8, Op::Div16),
        "idiv" => (Op::Idiv8, Op::Idiv16),
        _ => return None,
    };
    Some(ops)
}

fn bitshift(mnemonic: &str) -> Option<(Op, Op)> {
    let ops = match mnemonic {
        "rol" => (Op::Rol8, Op::Rol16),
        "ror" => (Op::Ror8, Op::Ror16),
        "rcl" => (Op::Rcl8, Op::Rcl16),
        "rcr" => (Op::Rcr8, Op::Rcr16),
        "shl" | "sal" => (Op::Shl8, Op::Shl16),
        "shr" => (Op::Shr8, Op::Shr16),
        "sar" => (Op::Sar8, Op::Sar16),
        _ => return None,
    };
    Some(ops)
}

/// short relative branches
fn short_branch(mnemonic: &str) -> Option<Op> {
    let op = match mnemonic {
        "jo" => Op::Jo,
        "jno" => Op::Jno,
        "jc" | "jb" | "jnae" => Op::Jc,
        "jnc" | "jnb" | "jae" => Op::Jnc,
        "jz" | "je" => Op::Jz,
        "jnz" | "jne" => Op::Jnz,
        "jna" | "jbe" => Op::Jna,
        "ja" | "jnbe" => Op::Ja,
        "js" => Op::Js,
        "jns" => Op::Jns,
        "jpe" | "jp" => Op::Jpe,
        "jpo" | "jnp" => Op::Jpo,
        "jl" | "jnge" => Op::Jl,
        "jnl" | "jge" => Op::Jnl,
        "jng" | "jle" => Op::Jng,
        "jg" | "jnle" => Op::Jg,
        "loop" => Op::Loop,
        "loope" | "loopz" => Op::Loope,
        "loopne" | "loopnz" => Op::Loopne,
        "jcxz" => Op::Jcxz,
        _ => return None,
    };
    Some(op)
}

fn expect_count(mnemonic: &str, operands: &[Operand], n: usize) -> Result<(), String> {
    if operands.len() != n {
        return Err(format!("{} expects {} operand(s), got {}", mnemonic, n, operands.len()));
    }
    Ok(())
}

fn operand_size(op: &Operand) -> Option<OperandSize> {
    match *op {
        Operand::Reg8(_) => Some(OperandSize::_8bit),
        Operand::Reg16(_) | Operand::SReg(_) => Some(OperandSize::_16bit),
        Operand::Mem(ref m) => m.size,
        _ => None,
    }
}

/// infers the operation width from the sized operands
fn width(mnemonic: &str, operands: &[Operand]) -> Result<OperandSize, String> {
    let mut size = None;
    for op in operands {
        match (size, operand_size(op)) {
            (Some(a), Some(b)) if a != b => return Err(format!("{}: operand size mismatch", mnemonic)),
            (None, Some(b)) => size = Some(b),
            _ => {}
        }
    }
    size.ok_or_else(|| format!("{}: operation size not specified", mnemonic))
}

fn value(e: &Expr, symbols: &dyn Resolve) -> Result<i64, String> {
    match *e {
        Expr::Num(v) => Ok(v),
        Expr::Label(ref name) => symbols.resolve(name).map(i64::from),
    }
}

fn imm8(e: &Expr, symbols: &dyn Resolve) -> Result<u8, String> {
    if let Expr::Label(ref name) = *e {
        return Err(format!("label '{}' can not be used as 8-bit value", name));
    }
    let v = value(e, symbols)?;
    if v < -0x80 || v > 0xFF {
        return Err(format!("value {} does not fit in 8 bits", v));
    }
    Ok(v as u8)
}

fn imm16(e: &Expr, symbols: &dyn Resolve) -> Result<u16, String> {
    let v = value(e, symbols)?;
    if v < -0x8000 || v > 0xFFFF {
        return Err(format!("value {} does not fit in 16 bits", v));
    }
    Ok(v as u16)
}

/// builds the memory parameter, using the shortest displacement form.
/// label displacements always use 16 bits so the size does not depend on the label value
fn memory(m: &MemRef, size: OperandSize, symbols: &dyn Resolve) -> Result<Parameter, String> {
    let seg = m.seg;
    let wide = size == OperandSize::_16bit;
    let disp = match m.disp {
        Some(ref e) => Some((imm16(e, symbols)?, matches!(*e, Expr::Label(_)))),
        None => None,
    };
    let p = match (m.amode, disp) {
        (None, Some((v, _))) => if wide { Parameter::Ptr16(seg, v) } else { Parameter::Ptr8(seg, v) },
        (None, None) => return Err("empty memory reference".to_owned()),
        (Some(a), None) => if wide { Parameter::Ptr16Amode(seg, a) } else { Parameter::Ptr8Amode(seg, a) },
        (Some(a), Some((v, is_label))) => {
            let s = v as i16;
            if !is_label && s >= -0x80 && s <= 0x7F {
                if wide { Parameter::Ptr16AmodeS8(seg, a, s as i8) } else { Parameter::Ptr8AmodeS8(seg, a, s as i8) }
            } else if wide {
                Parameter::Ptr16AmodeS16(seg, a, s)
            } else {
                Parameter::Ptr8AmodeS16(seg, a, s)
            }
        }
    };
    Ok(p)
}

/// converts a operand to a parameter of width `size`
fn param(op: &Operand, size: OperandSize, symbols: &dyn Resolve) -> Result<Parameter, String> {
    match *op {
        Operand::Reg8(r) => Ok(Parameter::Reg8(r)),
        Operand::Reg16(r) => Ok(Parameter::Reg16(r)),
        Operand::SReg(r) => Ok(Parameter::SReg16(r)),
        Operand::Imm(ref e) => match size {
            OperandSize::_8bit => Ok(Parameter::Imm8(imm8(e, symbols)?)),
            OperandSize::_16bit => Ok(Parameter::Imm16(imm16(e, symbols)?)),
        },
        Operand::Mem(ref m) => memory(m, size, symbols),
        _ => Err(format!("unexpected operand {:?}", op)),
    }
}

/// a branch target as absolute offset
fn target(op: &Operand, symbols: &dyn Resolve) -> Result<Parameter, String> {
    match *op {
        Operand::Imm(ref e) | Operand::Short(ref e) => Ok(Parameter::Imm16(imm16(e, symbols)?)),
        _ => Err(format!("invalid branch target {:?}", op)),
    }
}

fn is_alu(op: &Op) -> bool {
    match *op {
        Op::Add16 | Op::Or16 | Op::Adc16 | Op::Sbb16 | Op::And16 | Op::Sub16 | Op::Xor16 | Op::Cmp16 => true,
        _ => false,
    }
}

fn lower_op(mnemonic: &str, operands: &[Operand], symbols: &dyn Resolve) -> Result<Instruction, String> {
    if let Some(op) = implied(mnemonic) {
        expect_count(mnemonic, operands, 0)?;
        return Ok(Instruction::new(op));
    }

    if let Some((op8, op16)) = dual(mnemonic) {
        expect_count(mnemonic, operands, 2)?;
        let size = width(mnemonic, operands)?;
        let op = if size == OperandSize::_8bit { op8 } else { op16 };
        let dst = param(&operands[0], size, symbols)?;
        let src = match operands[1] {
            // <arith> r/m16, imm8 is sign extended
            Operand::Imm(Expr::Num(v)) if is_alu(&op) && v >= -0x80 && v <= 0x7F => Parameter::ImmS8(v as i8),
            ref o => param(o, size, symbols)?,
        };
        return Ok(Instruction::new2(op, dst, src));
    }

    if let Some((op8, op16)) = single(mnemonic) {
        expect_count(mnemonic, operands, 1)?;
        let size = width(mnemonic, operands)?;
        let op = if size == OperandSize::_8bit { op8 } else { op16 };
        return Ok(Instruction::new1(op, param(&operands[0], size, symbols)?));
    }

    if let Some((op8, op16)) = bitshift(mnemonic) {
        expect_count(mnemonic, operands, 2)?;
        let size = width(mnemonic, &operands[..1])?;
        let op = if size == OperandSize::_8bit { op8 } else { op16 };
        let count = match operands[1] {
            Operand::Reg8(R::CL) => Parameter::Reg8(R::CL),
            Operand::Imm(ref e) => Parameter::Imm8(imm8(e, symbols)?),
            _ => return Err(format!("{}: shift count must be 1 or cl", mnemonic)),
        };
        return Ok(Instruction::new2(op, param(&operands[0], size, symbols)?, count));
    }

    if let Some(op) = short_branch(mnemonic) {
        expect_count(mnemonic, operands, 1)?;
        return Ok(Instruction::new1(op, target(&operands[0], symbols)?));
    }

    match mnemonic {
        "aam" | "aad" => {
            let op = if mnemonic == "aam" { Op::Aam } else { Op::Aad };
            match operands {
                [] => Ok(Instruction::new1(op, Parameter::Imm8(10))),
                [Operand::Imm(e)] => Ok(Instruction::new1(op, Parameter::Imm8(imm8(e, symbols)?))),
                _ => Err(format!("{} expects a optional imm8", mnemonic)),
            }
        }
        "push" | "pop" => {
            expect_count(mnemonic, operands, 1)?;
            let op = if mnemonic == "push" { Op::Push16 } else { Op::Pop16 };
            let dst = match operands[0] {
                Operand::Mem(ref m) => memory(m, OperandSize::_16bit, symbols)?,
                Operand::Reg16(_) | Operand::SReg(_) => param(&operands[0], OperandSize::_16bit, symbols)?,
                _ => return Err(format!("{}: operand must be a 16-bit register or memory", mnemonic)),
            };
            if let Operand::Mem(MemRef { size: Some(OperandSize::_8bit), .. }) = operands[0] {
                return Err(format!("{}: operand must be 16-bit", mnemonic));
            }
            Ok(Instruction::new1(op, dst))
        }
        "lea" | "lds" | "les" => {
            expect_count(mnemonic, operands, 2)?;
            let op = match mnemonic {
                "lea" => Op::Lea16,
                "lds" => Op::Lds,
                _ => Op::Les,
            };
            let dst = match operands[0] {
                Operand::Reg16(r) => Parameter::Reg16(r),
                _ => return Err(format!("{}: destination must be a 16-bit register", mnemonic)),
            };
            let src = match operands[1] {
                Operand::Mem(ref m) => memory(m, OperandSize::_16bit, symbols)?,
                _ => return Err(format!("{}: source must be a memory operand", mnemonic)),
            };
            Ok(Instruction::new2(op, dst, src))
        }
        "jmp" | "call" => {
            expect_count(mnemonic, operands, 1)?;
            let jmp = mnemonic == "jmp";
            let (near, far) = if jmp { (Op::JmpNear, Op::JmpFar) } else { (Op::CallNear, Op::CallFar) };
            match operands[0] {
                Operand::Short(_) if jmp => Ok(Instruction::new1(Op::JmpShort, target(&operands[0], symbols)?)),
                Operand::Imm(_) => Ok(Instruction::new1(near, target(&operands[0], symbols)?)),
                Operand::Reg16(r) => Ok(Instruction::new1(near, Parameter::Reg16(r))),
                Operand::Mem(ref m) => Ok(Instruction::new1(near, memory(m, OperandSize::_16bit, symbols)?)),
                Operand::FarPtr(seg, off) => Ok(Instruction::new1(far, Parameter::Ptr16Imm(seg, off))),
                Operand::FarMem(ref m) => Ok(Instruction::new1(far, memory(m, OperandSize::_16bit, symbols)?)),
                _ => Err(format!("{}: invalid target", mnemonic)),
            }
        }
        "ret" | "retn" | "retf" => {
            let op = if mnemonic == "retf" { Op::Retf } else { Op::Retn };
            match operands {
                [] => Ok(Instruction::new(op)),
                [Operand::Imm(e)] => Ok(Instruction::new1(op, Parameter::Imm16(imm16(e, symbols)?))),
                _ => Err(format!("{} expects a optional imm16", mnemonic)),
            }
        }
        "int" => match operands {
            [Operand::Imm(e)] => Ok(Instruction::new1(Op::Int, Parameter::Imm8(imm8(e, symbols)?))),
            _ => Err("int expects a imm8".to_owned()),
        },
        "int3" => {
            expect_count(mnemonic, operands, 0)?;
            Ok(Instruction::new1(Op::Int, Parameter::Imm8(3)))
        }
        "in" => {
            expect_count(mnemonic, operands, 2)?;
            let op = match operands[0] {
                Operand::Reg8(R::AL) => Op::In8,
                Operand::Reg16(R::AX) => Op::In16,
                _ => return Err("in: destination must be al or ax".to_owned()),
            };
            let port = port(&operands[1], symbols)?;
            Ok(Instruction::new2(op, param(&operands[0], OperandSize::_16bit, symbols)?, port))
        }
        "out" => {
            expect_count(mnemonic, operands, 2)?;
            let op = match operands[1] {
                Operand::Reg8(R::AL) => Op::Out8,
                Operand::Reg16(R::AX) => Op::Out16,
                _ => return Err("out: source must be al or ax".to_owned()),
            };
            let port = port(&operands[0], symbols)?;
            Ok(Instruction::new2(op, port, param(&operands[1], OperandSize::_16bit, symbols)?))
        }
        _ => Err(format!("unknown mnemonic '{}'", mnemonic)),
    }
}

fn port(op: &Operand, symbols: &dyn Resolve) -> Result<Parameter, String> {
    match *op {
        Operand::Reg16(R::DX) => Ok(Parameter::Reg16(R::DX)),
        Operand::Imm(ref e) => Ok(Parameter::Imm8(imm8(e, symbols)?)),
        _ => Err("port must be imm8 or dx".to_owned()),
    }
}
