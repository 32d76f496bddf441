use std::collections::HashMap;

use pretty_assertions::assert_eq;

use crate::asm::mnemonic::{lower, Resolve};
use crate::asm::parser::{parse_line, Body};
use crate::cpu::{AMode, Instruction, Op, Parameter, RepeatMode, Segment, R};

struct Labels(HashMap<String, u16>);

impl Resolve for Labels {
    fn resolve(&self, name: &str) -> Result<u16, String> {
        self.0.get(name).cloned().ok_or_else(|| format!("unknown label '{}'", name))
    }
}

fn lower_str(s: &str) -> Result<Instruction, String> {
    let mut labels = HashMap::new();
    labels.insert("target".to_owned(), 0x0180);
    labels.insert("table".to_owned(), 0x0040);
    match parse_line(s)? {
        Some((_, Some(Body::Instruction { prefixes, mnemonic, operands }))) => {
            lower(&mnemonic, &operands, &prefixes, &Labels(labels))
        }
        other => panic!("not a instruction: {:?}", other),
    }
}

#[test]
fn lowers_by_operand_width() {
    assert_eq!(Ok(Instruction::new2(Op::Mov16, Parameter::Reg16(R::AX), Parameter::Imm16(0x1234))), lower_str("mov ax, 0x1234"));
    assert_eq!(Ok(Instruction::new2(Op::Mov8, Parameter::Reg8(R::AL), Parameter::Imm8(0x41))), lower_str("mov al, 'A'"));
    assert_eq!(Ok(Instruction::new2(Op::Mov16, Parameter::SReg16(R::DS), Parameter::Reg16(R::AX))), lower_str("mov ds, ax"));
    assert_eq!(Ok(Instruction::new1(Op::Inc8, Parameter::Ptr8Amode(Segment::Default, AMode::BX))), lower_str("inc byte [bx]"));
    assert_eq!(Ok(Instruction::new2(Op::Shl16, Parameter::Reg16(R::DX), Parameter::Reg8(R::CL))), lower_str("sal dx, cl"));
}

#[test]
fn sign_extends_small_alu_immediates() {
    assert_eq!(Ok(Instruction::new2(Op::Add16, Parameter::Reg16(R::BX), Parameter::ImmS8(-1))), lower_str("add bx, -1"));
    assert_eq!(Ok(Instruction::new2(Op::Cmp16, Parameter::Reg16(R::AX), Parameter::Imm16(0x0200))), lower_str("cmp ax, 0x200"));
    assert_eq!(Ok(Instruction::new2(Op::Add8, Parameter::Reg8(R::AL), Parameter::Imm8(0xFF))), lower_str("add al, 0xFF"));
    // labels always use the full width
    assert_eq!(Ok(Instruction::new2(Op::Sub16, Parameter::Reg16(R::SI), Parameter::Imm16(0x0040))), lower_str("sub si, table"));
    // test has no sign extended form
    assert_eq!(Ok(Instruction::new2(Op::Test16, Parameter::Reg16(R::CX), Parameter::Imm16(1))), lower_str("test cx, 1"));
}

#[test]
fn selects_shortest_displacement() {
    assert_eq!(Ok(Instruction::new2(Op::Mov8, Parameter::Ptr8AmodeS8(Segment::Default, AMode::BX, 4), Parameter::Reg8(R::AL))),
               lower_str("mov [bx+4], al"));
    assert_eq!(Ok(Instruction::new2(Op::Mov16, Parameter::Reg16(R::AX), Parameter::Ptr16AmodeS16(Segment::Default, AMode::BP, 0x0200))),
               lower_str("mov ax, [bp+0x200]"));
    assert_eq!(Ok(Instruction::new2(Op::Mov16, Parameter::Reg16(R::AX), Parameter::Ptr16AmodeS16(Segment::Default, AMode::DI, 0x0040))),
               lower_str("mov ax, [di+table]"));
    assert_eq!(Ok(Instruction::new2(Op::Mov16, Parameter::Reg16(R::AX), Parameter::Ptr16(Segment::Default, 0x0040))),
               lower_str("mov ax, [table]"));
}

#[test]
fn applies_prefixes() {
    let mut ins = Instruction::new(Op::Movsw);
    ins.repeat = RepeatMode::Rep;
    assert_eq!(Ok(ins), lower_str("rep movsw"));

    let mut ins = Instruction::new2(Op::Mov8, Parameter::Reg8(R::AL), Parameter::Ptr8Amode(Segment::ES, AMode::DI));
    ins.segment_prefix = Segment::ES;
    assert_eq!(Ok(ins), lower_str("mov al, es:[di]"));

    assert!(lower_str("rep add ax, bx").is_err());
    assert!(lower_str("cs mov al, es:[di]").is_err());
}

#[test]
fn lowers_control_transfer() {
    assert_eq!(Ok(Instruction::new1(Op::Jz, Parameter::Imm16(0x0180))), lower_str("je target"));
    assert_eq!(Ok(Instruction::new1(Op::JmpShort, Parameter::Imm16(0x0180))), lower_str("jmp short target"));
    assert_eq!(Ok(Instruction::new1(Op::JmpNear, Parameter::Imm16(0x0180))), lower_str("jmp target"));
    assert_eq!(Ok(Instruction::new1(Op::CallFar, Parameter::Ptr16Imm(0xF000, 0x0100))), lower_str("call 0xF000:0x0100"));
    assert_eq!(Ok(Instruction::new1(Op::JmpFar, Parameter::Ptr16(Segment::Default, 0x0040))), lower_str("jmp far [table]"));
    assert_eq!(Ok(Instruction::new1(Op::CallNear, Parameter::Reg16(R::BX))), lower_str("call bx"));
    assert_eq!(Ok(Instruction::new1(Op::Retn, Parameter::Imm16(4))), lower_str("ret 4"));
    assert_eq!(Ok(Instruction::new(Op::Retf)), lower_str("retf"));
    assert_eq!(Ok(Instruction::new1(Op::Int, Parameter::Imm8(0x21))), lower_str("int 0x21"));
    assert_eq!(Ok(Instruction::new1(Op::Int, Parameter::Imm8(3))), lower_str("int3"));
}

#[test]
fn lowers_io() {
    assert_eq!(Ok(Instruction::new2(Op::In8, Parameter::Reg8(R::AL), Parameter::Reg16(R::DX))), lower_str("in al, dx"));
    assert_eq!(Ok(Instruction::new2(Op::Out16, Parameter::Imm8(0x40), Parameter::Reg16(R::AX))), lower_str("out 0x40, ax"));
    assert!(lower_str("in bl, dx").is_err());
    assert!(lower_str("out dx, bl").is_err());
    assert!(lower_str("in al, cx").is_err());
}

#[test]
fn rejects_malformed() {
    assert_eq!(Err("mov: operation size not specified".to_owned()), lower_str("mov [bx], 1"));
    assert_eq!(Err("mov: operand size mismatch".to_owned()), lower_str("mov al, bx"));
    assert_eq!(Err("unknown mnemonic 'frob'".to_owned()), lower_str("frob ax"));
    assert_eq!(Err("unknown label 'nowhere'".to_owned()), lower_str("jmp nowhere"));
    assert!(lower_str("mov al, 0x100").is_err());
    assert!(lower_str("push al").is_err());
    assert!(lower_str("nop ax").is_err());
    assert!(lower_str("lea ax, bx").is_err());
}
