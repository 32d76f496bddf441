use crate::cpu::instruction::{Instruction, InstructionInfo, ModRegRm, RepeatMode};
use crate::cpu::parameter::{Parameter, ParameterSet};
use crate::cpu::op::{Op, Invalid};
use crate::cpu::register::{R, r8, r16, sr, amode};
use crate::cpu::segment::Segment;
use crate::memory::{MMU, MemoryAddress};

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

/// a run of more prefix bytes than this is decoded as invalid
const MAX_PREFIXES: usize = 15;

#[derive(Clone, Default)]
pub struct Decoder {
    current_seg: u16,

    /// current decoding offset
    current_offset: u16,
}

impl Decoder {
    /// decodes given seg::offset into Vec with `n` InstructionInfo's
    pub fn decode_to_block(&mut self, mmu: &MMU, seg: u16, offset: u16, n: usize) -> Vec<InstructionInfo> {
        let mut ops: Vec<InstructionInfo> = Vec::new();
        let mut inst_offset = offset;
        for _ in 0..n {
            let op = self.get_instruction_info(mmu, seg, inst_offset);
            inst_offset = inst_offset.wrapping_add(op.bytes.len() as u16);
            ops.push(op);
        }
        ops
    }

    pub fn disassemble_block_to_str(&mut self, mmu: &MMU, seg: u16, offset: u16, n: usize) -> String {
        let ops = self.decode_to_block(mmu, seg, offset, n);
        instruction_info_to_str(&ops)
    }

    /// decodes op at seg:offset into a InstructionInfo
    pub fn get_instruction_info(&mut self, mmu: &MMU, seg: u16, offset: u16) -> InstructionInfo {
        let instr = self.get_instruction(mmu, seg, offset);
        log::trace!("decoded at {}: {}", MemoryAddress::RealSegmentOffset(seg, offset), instr);
        InstructionInfo {
            segment: seg,
            offset,
            bytes: mmu.read(seg, offset, instr.length as usize),
            instruction: instr,
        }
    }

    /// decodes op at seg:offset into a Instruction
    pub fn get_instruction(&mut self, mmu: &MMU, segment: u16, offset: u16) -> Instruction {
        self.current_seg = segment;
        self.current_offset = offset;
        let mut op = Instruction::new(Op::Uninitialized);
        self.decode(mmu, &mut op);
        op
    }

    /// decodes the next instruction
    fn decode(&mut self, mmu: &MMU, op: &mut Instruction) {
        let start_offset = self.current_offset;
        let mut prefixes = 0;
        let b = loop {
            let b = self.read_u8(mmu);
            match b {
                0x26 => op.segment_prefix = Segment::ES,
                0x2E => op.segment_prefix = Segment::CS,
                0x36 => op.segment_prefix = Segment::SS,
                0x3E => op.segment_prefix = Segment::DS,
                0xF0 => op.lock = true,
                0xF2 => op.repeat = RepeatMode::Repne,
                // rep (movs, lods, stos), repe (cmps, scas)
                0xF3 => op.repeat = RepeatMode::Rep,
                _ => break b,
            }
            prefixes += 1;
            if prefixes > MAX_PREFIXES {
                op.command = Op::Invalid(vec!(b), Invalid::Op);
                op.length = self.current_offset.wrapping_sub(start_offset) as u8;
                return;
            }
        };

        self.decode_opcode(mmu, op, b);

        if op.repeat == RepeatMode::Rep && op.command.is_compare_string_op() {
            op.repeat = RepeatMode::Repe;
        }

        // calculate instruction length
        op.length = self.current_offset.wrapping_sub(start_offset) as u8;
    }

    fn decode_opcode(&mut self, mmu: &MMU, op: &mut Instruction, b: u8) {
        match b {
            // dual operand alu forms: add, or, adc, sbb, and, sub, xor, cmp
            0x00..=0x3F if b & 7 < 6 => {
                let ops = [
                    (Op::Add8, Op::Add16), (Op::Or8, Op::Or16), (Op::Adc8, Op::Adc16), (Op::Sbb8, Op::Sbb16),
                    (Op::And8, Op::And16), (Op::Sub8, Op::Sub16), (Op::Xor8, Op::Xor16), (Op::Cmp8, Op::Cmp16),
                ];
                let (op8, op16) = ops[(b >> 3) as usize].clone();
                match b & 7 {
                    0 => {
                        // <arith> r/m8, r8
                        op.command = op8;
                        op.params = self.rm8_r8(mmu, op);
                    }
                    1 => {
                        // <arith> r/m16, r16
                        op.command = op16;
                        op.params = self.rm16_r16(mmu, op);
                    }
                    2 => {
                        // <arith> r8, r/m8
                        op.command = op8;
                        op.params = self.r8_rm8(mmu, op);
                    }
                    3 => {
                        // <arith> r16, r/m16
                        op.command = op16;
                        op.params = self.r16_rm16(mmu, op);
                    }
                    4 => {
                        // <arith> AL, imm8
                        op.command = op8;
                        op.params.dst = Parameter::Reg8(R::AL);
                        op.params.src = Parameter::Imm8(self.read_u8(mmu));
                    }
                    _ => {
                        // <arith> AX, imm16
                        op.command = op16;
                        op.params.dst = Parameter::Reg16(R::AX);
                        op.params.src = Parameter::Imm16(self.read_u16(mmu));
                    }
                }
            }
            0x06 | 0x0E | 0x16 | 0x1E => {
                // push sreg
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(sr(b >> 3));
            }
            0x07 | 0x17 | 0x1F => {
                // pop sreg
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(sr(b >> 3));
            }
            0x27 => op.command = Op::Daa,
            0x2F => op.command = Op::Das,
            0x37 => op.command = Op::Aaa,
            0x3F => op.command = Op::Aas,
            0x40..=0x47 => {
                // inc r16
                op.command = Op::Inc16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x48..=0x4F => {
                // dec r16
                op.command = Op::Dec16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x50..=0x57 => {
                // push r16
                op.command = Op::Push16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x58..=0x5F => {
                // pop r16
                op.command = Op::Pop16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x70..=0x7F => {
                op.command = match b {
                    0x70 => Op::Jo,
                    0x71 => Op::Jno,
                    0x72 => Op::Jc,
                    0x73 => Op::Jnc,
                    0x74 => Op::Jz,
                    0x75 => Op::Jnz,
                    0x76 => Op::Jna,
                    0x77 => Op::Ja,
                    0x78 => Op::Js,
                    0x79 => Op::Jns,
                    0x7A => Op::Jpe,
                    0x7B => Op::Jpo,
                    0x7C => Op::Jl,
                    0x7D => Op::Jnl,
                    0x7E => Op::Jng,
                    _ => Op::Jg,
                };
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x80 | 0x82 => {
                // <arith> r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.command = arith_op8(x.reg);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x81 => {
                // <arith> r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                op.command = arith_op16(x.reg);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x83 => {
                // <arith> r/m16, imm8 (sign extended)
                let x = self.read_mod_reg_rm(mmu);
                op.command = arith_op16(x.reg);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::ImmS8(self.read_s8(mmu));
            }
            0x84 => {
                // test r/m8, r8
                op.command = Op::Test8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x85 => {
                // test r/m16, r16
                op.command = Op::Test16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x86 => {
                // xchg r/m8, r8
                op.command = Op::Xchg8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x87 => {
                // xchg r/m16, r16
                op.command = Op::Xchg16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x88 => {
                // mov r/m8, r8
                op.command = Op::Mov8;
                op.params = self.rm8_r8(mmu, op);
            }
            0x89 => {
                // mov r/m16, r16
                op.command = Op::Mov16;
                op.params = self.rm16_r16(mmu, op);
            }
            0x8A => {
                // mov r8, r/m8
                op.command = Op::Mov8;
                op.params = self.r8_rm8(mmu, op);
            }
            0x8B => {
                // mov r16, r/m16
                op.command = Op::Mov16;
                op.params = self.r16_rm16(mmu, op);
            }
            0x8C => {
                // mov r/m16, sreg
                let x = self.read_mod_reg_rm(mmu);
                if x.reg > 3 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg));
                    return;
                }
                op.command = Op::Mov16;
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::SReg16(sr(x.reg));
            }
            0x8D => {
                // lea r16, m
                let x = self.read_mod_reg_rm(mmu);
                if x.md == 3 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Op);
                    return;
                }
                op.command = Op::Lea16;
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm16(mmu, op, x.rm, x.md);
            }
            0x8E => {
                // mov sreg, r/m16
                let x = self.read_mod_reg_rm(mmu);
                if x.reg > 3 || x.reg == 1 {
                    // mov cs is not allowed
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg));
                    return;
                }
                op.command = Op::Mov16;
                op.params.dst = Parameter::SReg16(sr(x.reg));
                op.params.src = self.rm16(mmu, op, x.rm, x.md);
            }
            0x8F => {
                // pop r/m16
                let x = self.read_mod_reg_rm(mmu);
                if x.reg != 0 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg));
                    return;
                }
                op.command = Op::Pop16;
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
            }
            0x90 => op.command = Op::Nop,
            0x91..=0x97 => {
                // xchg ax, r16
                op.command = Op::Xchg16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(r16(b & 7));
            }
            0x98 => op.command = Op::Cbw,
            0x99 => op.command = Op::Cwd,
            0x9A => {
                // call far ptr16:16
                op.command = Op::CallFar;
                let imm = self.read_u16(mmu);
                let seg = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(seg, imm);
            }
            0x9B => op.command = Op::Wait,
            0x9C => op.command = Op::Pushf,
            0x9D => op.command = Op::Popf,
            0x9E => op.command = Op::Sahf,
            0x9F => op.command = Op::Lahf,
            0xA0 => {
                // mov AL, moffs8
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Ptr8(op.segment_prefix, self.read_u16(mmu));
            }
            0xA1 => {
                // mov AX, moffs16
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Ptr16(op.segment_prefix, self.read_u16(mmu));
            }
            0xA2 => {
                // mov moffs8, AL
                op.command = Op::Mov8;
                op.params.dst = Parameter::Ptr8(op.segment_prefix, self.read_u16(mmu));
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xA3 => {
                // mov moffs16, AX
                op.command = Op::Mov16;
                op.params.dst = Parameter::Ptr16(op.segment_prefix, self.read_u16(mmu));
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xA4 => op.command = Op::Movsb,
            0xA5 => op.command = Op::Movsw,
            0xA6 => op.command = Op::Cmpsb,
            0xA7 => op.command = Op::Cmpsw,
            0xA8 => {
                // test AL, imm8
                op.command = Op::Test8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xA9 => {
                // test AX, imm16
                op.command = Op::Test16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xAA => op.command = Op::Stosb,
            0xAB => op.command = Op::Stosw,
            0xAC => op.command = Op::Lodsb,
            0xAD => op.command = Op::Lodsw,
            0xAE => op.command = Op::Scasb,
            0xAF => op.command = Op::Scasw,
            0xB0..=0xB7 => {
                // mov r8, u8
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(r8(b & 7));
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xB8..=0xBF => {
                // mov r16, u16
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC2 => {
                // ret [near] imm16
                op.command = Op::Retn;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC3 => op.command = Op::Retn,
            0xC4 | 0xC5 => {
                // les / lds r16, m16:16
                let x = self.read_mod_reg_rm(mmu);
                if x.md == 3 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Op);
                    return;
                }
                op.command = if b == 0xC4 { Op::Les } else { Op::Lds };
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm16(mmu, op, x.rm, x.md);
            }
            0xC6 => {
                // mov r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                if x.reg != 0 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg));
                    return;
                }
                op.command = Op::Mov8;
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xC7 => {
                // mov r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                if x.reg != 0 {
                    op.command = Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg));
                    return;
                }
                op.command = Op::Mov16;
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xCA => {
                // retf imm16
                op.command = Op::Retf;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xCB => op.command = Op::Retf,
            0xCC => {
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(3);
            }
            0xCD => {
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xCE => op.command = Op::Into,
            0xCF => op.command = Op::Iret,
            0xD0..=0xD3 => {
                // bit shift byte/word by 1 or CL
                let x = self.read_mod_reg_rm(mmu);
                let wide = b & 1 != 0;
                let command = match (x.reg, wide) {
                    (0, false) => Op::Rol8,
                    (1, false) => Op::Ror8,
                    (2, false) => Op::Rcl8,
                    (3, false) => Op::Rcr8,
                    (4, false) => Op::Shl8,
                    (5, false) => Op::Shr8,
                    (7, false) => Op::Sar8,
                    (0, true) => Op::Rol16,
                    (1, true) => Op::Ror16,
                    (2, true) => Op::Rcl16,
                    (3, true) => Op::Rcr16,
                    (4, true) => Op::Shl16,
                    (5, true) => Op::Shr16,
                    (7, true) => Op::Sar16,
                    _ => Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg)),
                };
                if !command.is_valid() {
                    op.command = command;
                    return;
                }
                op.command = command;
                op.params.dst = if wide {
                    self.rm16(mmu, op, x.rm, x.md)
                } else {
                    self.rm8(mmu, op, x.rm, x.md)
                };
                op.params.src = if b & 2 == 0 {
                    Parameter::Imm8(1)
                } else {
                    Parameter::Reg8(R::CL)
                };
            }
            0xD4 => {
                op.command = Op::Aam;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD5 => {
                op.command = Op::Aad;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD6 => op.command = Op::Salc,
            0xD7 => op.command = Op::Xlatb,
            0xE0 => {
                op.command = Op::Loopne;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE1 => {
                op.command = Op::Loope;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE2 => {
                op.command = Op::Loop;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE3 => {
                op.command = Op::Jcxz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE4 => {
                // in AL, imm8
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE5 => {
                // in AX, imm8
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE6 => {
                // out imm8, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xE7 => {
                // out imm8, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xE8 => {
                // call near rel16
                op.command = Op::CallNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xE9 => {
                // jmp near rel16
                op.command = Op::JmpNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xEA => {
                // jmp far ptr16:16
                op.command = Op::JmpFar;
                let imm = self.read_u16(mmu);
                let seg = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(seg, imm);
            }
            0xEB => {
                // jmp short rel8
                op.command = Op::JmpShort;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xEC => {
                // in AL, DX
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xED => {
                // in AX, DX
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xEE => {
                // out DX, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xEF => {
                // out DX, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xF4 => op.command = Op::Hlt,
            0xF5 => op.command = Op::Cmc,
            0xF6 => {
                // <math> r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                if x.reg < 2 {
                    op.params.src = Parameter::Imm8(self.read_u8(mmu));
                }
                op.command = match x.reg {
                    0 | 1 => Op::Test8,
                    2 => Op::Not8,
                    3 => Op::Neg8,
                    4 => Op::Mul8,
                    5 => Op::Imul8,
                    6 => Op::Div8,
                    _ => Op::Idiv8,
                };
            }
            0xF7 => {
                // <math> r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                if x.reg < 2 {
                    op.params.src = Parameter::Imm16(self.read_u16(mmu));
                }
                op.command = match x.reg {
                    0 | 1 => Op::Test16,
                    2 => Op::Not16,
                    3 => Op::Neg16,
                    4 => Op::Mul16,
                    5 => Op::Imul16,
                    6 => Op::Div16,
                    _ => Op::Idiv16,
                };
            }
            0xF8 => op.command = Op::Clc,
            0xF9 => op.command = Op::Stc,
            0xFA => op.command = Op::Cli,
            0xFB => op.command = Op::Sti,
            0xFC => op.command = Op::Cld,
            0xFD => op.command = Op::Std,
            0xFE => {
                // inc / dec r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Inc8,
                    1 => Op::Dec8,
                    _ => Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg)),
                };
                if op.command.is_valid() {
                    op.params.dst = self.rm8(mmu, op, x.rm, x.md);
                }
            }
            0xFF => {
                let x = self.read_mod_reg_rm(mmu);
                op.command = match x.reg {
                    0 => Op::Inc16,
                    1 => Op::Dec16,
                    2 => Op::CallNear,
                    3 if x.md != 3 => Op::CallFar,
                    4 => Op::JmpNear,
                    5 if x.md != 3 => Op::JmpFar,
                    6 => Op::Push16,
                    // far transfer through a register, or /7
                    _ => Op::Invalid(vec!(b, x.u8()), Invalid::Reg(x.reg)),
                };
                if op.command.is_valid() {
                    op.params.dst = self.rm16(mmu, op, x.rm, x.md);
                }
            }
            _ => {
                // 0F, 60-6F, C0, C1, C8, C9, D8-DF (esc), F1
                op.command = Op::Invalid(vec!(b), Invalid::Op);
            }
        }
    }

    /// decode rm8
    fn rm8(&mut self, mmu: &MMU, op: &Instruction, rm: u8, md: u8) -> Parameter {
        match md {
            0 => if rm == 6 { // [u16]
                Parameter::Ptr8(op.segment_prefix, self.read_u16(mmu))
            } else { // [amode]
                Parameter::Ptr8Amode(op.segment_prefix, amode(rm))
            }
            // [amode+s8]
            1 => Parameter::Ptr8AmodeS8(op.segment_prefix, amode(rm), self.read_s8(mmu)),
            // [amode+s16]
            2 => Parameter::Ptr8AmodeS16(op.segment_prefix, amode(rm), self.read_s16(mmu)),
            // reg
            _ => Parameter::Reg8(r8(rm)),
        }
    }

    /// decode rm16
    fn rm16(&mut self, mmu: &MMU, op: &Instruction, rm: u8, md: u8) -> Parameter {
        match md {
            0 => if rm == 6 { // [u16]
                Parameter::Ptr16(op.segment_prefix, self.read_u16(mmu))
            } else { // [amode]
                Parameter::Ptr16Amode(op.segment_prefix, amode(rm))
            }
            // [amode+s8]
            1 => Parameter::Ptr16AmodeS8(op.segment_prefix, amode(rm), self.read_s8(mmu)),
            // [amode+s16]
            2 => Parameter::Ptr16AmodeS16(op.segment_prefix, amode(rm), self.read_s16(mmu)),
            // reg
            _ => Parameter::Reg16(r16(rm)),
        }
    }

    /// decode r8, r/m8
    fn r8_rm8(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg8(r8(x.reg)),
            src: self.rm8(mmu, op, x.rm, x.md),
        }
    }

    /// decode r/m8, r8
    fn rm8_r8(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm8(mmu, op, x.rm, x.md),
            src: Parameter::Reg8(r8(x.reg)),
        }
    }

    /// decode r16, r/m16
    fn r16_rm16(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg16(r16(x.reg)),
            src: self.rm16(mmu, op, x.rm, x.md),
        }
    }

    /// decode r/m16, r16
    fn rm16_r16(&mut self, mmu: &MMU, op: &Instruction) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm16(mmu, op, x.rm, x.md),
            src: Parameter::Reg16(r16(x.reg)),
        }
    }

    fn read_mod_reg_rm(&mut self, mmu: &MMU) -> ModRegRm {
        ModRegRm::from_u8(self.read_u8(mmu))
    }

    /// reads a 8-bit displacement, returning the absolute target offset
    fn read_rel8(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_s8(mmu);
        self.current_offset.wrapping_add(val as i16 as u16)
    }

    /// reads a 16-bit displacement, returning the absolute target offset
    fn read_rel16(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_u16(mmu);
        self.current_offset.wrapping_add(val)
    }

    fn read_u8(&mut self, mmu: &MMU) -> u8 {
        let b = mmu.read_u8(self.current_seg, self.current_offset);
        self.current_offset = self.current_offset.wrapping_add(1);
        b
    }

    fn read_s8(&mut self, mmu: &MMU) -> i8 {
        self.read_u8(mmu) as i8
    }

    fn read_u16(&mut self, mmu: &MMU) -> u16 {
        let lo = self.read_u8(mmu);
        let hi = self.read_u8(mmu);
        u16::from(hi) << 8 | u16::from(lo)
    }

    fn read_s16(&mut self, mmu: &MMU) -> i16 {
        self.read_u16(mmu) as i16
    }
}

fn arith_op8(reg: u8) -> Op {
    match reg {
        0 => Op::Add8,
        1 => Op::Or8,
        2 => Op::Adc8,
        3 => Op::Sbb8,
        4 => Op::And8,
        5 => Op::Sub8,
        6 => Op::Xor8,
        _ => Op::Cmp8,
    }
}

fn arith_op16(reg: u8) -> Op {
    match reg {
        0 => Op::Add16,
        1 => Op::Or16,
        2 => Op::Adc16,
        3 => Op::Sbb16,
        4 => Op::And16,
        5 => Op::Sub16,
        6 => Op::Xor16,
        _ => Op::Cmp16,
    }
}

pub fn instruction_info_to_str(ops: &[InstructionInfo]) -> String {
    let lines: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
    lines.join("\n")
}
