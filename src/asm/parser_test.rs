use pretty_assertions::assert_eq;

use crate::asm::parser::{parse_line, parse_operand, parse_source, Body, DataItem, Expr, MemRef, Operand, Prefix};
use crate::cpu::{AMode, OperandSize, R, Segment};

#[test]
fn parses_registers_and_immediates() {
    assert_eq!(Ok(Operand::Reg16(R::AX)), parse_operand("ax"));
    assert_eq!(Ok(Operand::Reg8(R::BH)), parse_operand("BH"));
    assert_eq!(Ok(Operand::SReg(R::ES)), parse_operand("es"));
    assert_eq!(Ok(Operand::Imm(Expr::Num(0x1234))), parse_operand("0x1234"));
    assert_eq!(Ok(Operand::Imm(Expr::Num(0xF0))), parse_operand("0F0h"));
    assert_eq!(Ok(Operand::Imm(Expr::Num(-5))), parse_operand("-5"));
    assert_eq!(Ok(Operand::Imm(Expr::Num(0x41))), parse_operand("'A'"));
    assert_eq!(Ok(Operand::Imm(Expr::Label("msg".to_owned()))), parse_operand("msg"));
    assert_eq!(Ok(Operand::Short(Expr::Label("again".to_owned()))), parse_operand("short again"));
    assert_eq!(Ok(Operand::FarPtr(0xF000, 0x0100)), parse_operand("0xF000:0x0100"));
}

#[test]
fn parses_memory_references() {
    assert_eq!(Ok(Operand::Mem(MemRef {
        size: Some(OperandSize::_16bit),
        seg: Segment::ES,
        amode: Some(AMode::BPSI),
        disp: Some(Expr::Num(-0x10)),
    })), parse_operand("word es:[bp+si-0x10]"));

    assert_eq!(Ok(Operand::Mem(MemRef {
        size: None,
        seg: Segment::CS,
        amode: Some(AMode::BX),
        disp: None,
    })), parse_operand("[cs:bx]"));

    assert_eq!(Ok(Operand::Mem(MemRef {
        size: Some(OperandSize::_8bit),
        seg: Segment::Default,
        amode: None,
        disp: Some(Expr::Num(0x200)),
    })), parse_operand("byte ptr [0x200]"));

    assert_eq!(Ok(Operand::Mem(MemRef {
        size: None,
        seg: Segment::Default,
        amode: Some(AMode::DI),
        disp: Some(Expr::Label("table".to_owned())),
    })), parse_operand("[di+table]"));

    assert_eq!(Ok(Operand::FarMem(MemRef {
        size: None,
        seg: Segment::Default,
        amode: Some(AMode::BX),
        disp: Some(Expr::Num(4)),
    })), parse_operand("far [bx+4]"));
}

#[test]
fn rejects_bad_operands() {
    assert!(parse_operand("[bx+bp]").is_err());
    assert!(parse_operand("[ax]").is_err());
    assert!(parse_operand("[bx-si]").is_err());
    assert!(parse_operand("byte al").is_err());
    assert!(parse_operand("es:[ds:bx]").is_err());
    assert!(parse_operand("1x").is_err());
}

#[test]
fn parses_lines() {
    assert_eq!(Ok(None), parse_line("   ; just a comment"));
    assert_eq!(Ok(Some((Some("start".to_owned()), None))), parse_line("start:"));

    assert_eq!(Ok(Some((Some("start".to_owned()), Some(Body::Instruction {
        prefixes: vec![],
        mnemonic: "mov".to_owned(),
        operands: vec![Operand::Reg16(R::AX), Operand::Imm(Expr::Num(1))],
    })))), parse_line("start: MOV ax, 1 ; set ax"));

    assert_eq!(Ok(Some((None, Some(Body::Instruction {
        prefixes: vec![Prefix::Repne],
        mnemonic: "scasb".to_owned(),
        operands: vec![],
    })))), parse_line("repnz scasb"));

    assert_eq!(Ok(Some((None, Some(Body::Instruction {
        prefixes: vec![Prefix::Segment(Segment::ES)],
        mnemonic: "lodsb".to_owned(),
        operands: vec![],
    })))), parse_line("es lodsb"));

    assert_eq!(Ok(Some((Some("msg".to_owned()), Some(Body::Db(vec![
        DataItem::Bytes(b"a;b".to_vec()),
        DataItem::Value(Expr::Num(13)),
        DataItem::Value(Expr::Num(0x24)),
    ]))))), parse_line("msg: db \"a;b\", 13, '$' ; text"));

    assert_eq!(Ok(Some((None, Some(Body::Org(0x7C00))))), parse_line("org 0x7C00"));
}

#[test]
fn errors_carry_line_numbers() {
    assert_eq!(Err((2, "missing operand after ','".to_owned())), parse_source("nop\nmov ax,\n"));
    assert!(parse_source("1abc: nop").is_err());
    assert!(parse_source("db \"open").is_err());
}
