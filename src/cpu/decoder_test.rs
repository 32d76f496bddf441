use pretty_assertions::assert_eq;

use crate::cpu::{Decoder, Invalid, Op, Parameter, RepeatMode, Segment, R, AMode};
use crate::machine::Machine;
use crate::memory::MMU;

fn decode_bytes(code: &[u8]) -> crate::cpu::Instruction {
    let mut mmu = MMU::default();
    mmu.write(0x085F, 0x0100, code);
    let mut decoder = Decoder::default();
    decoder.get_instruction(&mmu, 0x085F, 0x0100)
}

#[test]
fn can_disassemble_basic() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0xE8, 0x05, 0x00, // call l_0x108   ; call a later offset
        0xBA, 0x0B, 0x01, // mov dx,0x10b
        0xB4, 0x09,       // mov ah,0x9
        0xCD, 0x21,       // l_0x108: int 0x21
        0xE8, 0xFB, 0xFF, // call l_0x108   ; call an earlier offset
        0xFF, 0x18,       // call far [bx+si]
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 6);
    assert_eq!("[085F:0100] E80500           CallNear 0x0108
[085F:0103] BA0B01           Mov16    dx, 0x010B
[085F:0106] B409             Mov8     ah, 0x09
[085F:0108] CD21             Int      0x21
[085F:010A] E8FBFF           CallNear 0x0108
[085F:010D] FF18             CallFar  word [ds:bx+si]",
               res);
}

#[test]
fn can_disassemble_lea() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0x8D, 0x47, 0x80, // lea ax,[bx-0x80]
        0x8D, 0x46, 0x02, // lea ax,[bp+0x2]
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 2);
    assert_eq!("[085F:0100] 8D4780           Lea16    ax, word [ds:bx-0x80]
[085F:0103] 8D4602           Lea16    ax, word [ss:bp+0x02]",
               res);
}

#[test]
fn can_disassemble_segment_prefixed() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0x26, 0x88, 0x25, // mov [es:di],ah
        0x26, 0x8A, 0x25, // mov ah,[es:di]
        0x2E, 0xA4,       // cs movsb
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 3);
    assert_eq!("[085F:0100] 268825           Mov8     byte [es:di], ah
[085F:0103] 268A25           Mov8     ah, byte [es:di]
[085F:0106] 2EA4             cs Movsb",
               res);
}

#[test]
fn can_disassemble_values() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0x80, 0x3E, 0x31, 0x10, 0x00, // cmp byte [0x1031],0x0
        0x81, 0xC7, 0xC0, 0x00,       // add di,0xc0
        0x83, 0xC7, 0x3A,             // add di,byte +0x3a
        0x83, 0xC7, 0xC6,             // add di,byte -0x3a
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 4);
    assert_eq!("[085F:0100] 803E311000       Cmp8     byte [ds:0x1031], 0x00
[085F:0105] 81C7C000         Add16    di, 0x00C0
[085F:0109] 83C73A           Add16    di, byte +0x3A
[085F:010C] 83C7C6           Add16    di, byte -0x3A",
               res);
}

#[test]
fn can_disassemble_relative_short_jumps() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0x74, 0x04, // jz 0x106
        0x74, 0xFE, // jz 0x102
        0x74, 0x00, // jz 0x106
        0x74, 0xFA, // jz 0x102
        0xE2, 0xF8, // loop 0x102
        0xEB, 0xFE, // jmp short 0x10A
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 6);
    assert_eq!("[085F:0100] 7404             Jz       0x0106
[085F:0102] 74FE             Jz       0x0102
[085F:0104] 7400             Jz       0x0106
[085F:0106] 74FA             Jz       0x0102
[085F:0108] E2F8             Loop     0x0102
[085F:010A] EBFE             JmpShort 0x010A",
               res);
}

#[test]
fn can_disassemble_rep_prefixes() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0xF3, 0xA4, // rep movsb
        0xF3, 0xA6, // repe cmpsb
        0xF2, 0xAE, // repne scasb
        0xF0, 0x86, 0x07, // lock xchg [bx],al
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 4);
    assert_eq!("[085F:0100] F3A4             Rep      Movsb
[085F:0102] F3A6             Repe     Cmpsb
[085F:0104] F2AE             Repne    Scasb
[085F:0106] F08607           Lock     Xchg8    byte [ds:bx], al",
               res);
}

#[test]
fn can_disassemble_far_transfers_and_ports() {
    let mut machine = Machine::deterministic();
    let code: Vec<u8> = vec![
        0x9A, 0x34, 0x12, 0x00, 0xF0, // call 0xF000:0x1234
        0xEA, 0x00, 0x01, 0x5F, 0x08, // jmp 0x085F:0x0100
        0xE4, 0x60,                   // in al,0x60
        0xEF,                         // out dx,ax
        0xD1, 0xE0,                   // shl ax,1
        0xD2, 0x0F,                   // ror byte [bx],cl
    ];
    machine.load_executable(&code, 0x085F);

    let res = machine.cpu.decoder.disassemble_block_to_str(&machine.mmu, 0x85F, 0x100, 6);
    assert_eq!("[085F:0100] 9A341200F0       CallFar  F000:1234
[085F:0105] EA00015F08       JmpFar   085F:0100
[085F:010A] E460             In8      al, 0x60
[085F:010C] EF               Out16    dx, ax
[085F:010D] D1E0             Shl16    ax, 0x01
[085F:010F] D20F             Ror8     byte [ds:bx], cl",
               res);
}

#[test]
fn decodes_instruction_word_fixtures() {
    // ADD AL,[BX], instruction word 0x0207
    let op = decode_bytes(&[0x02, 0x07]);
    assert_eq!(Op::Add8, op.command);
    assert_eq!(Parameter::Reg8(R::AL), op.params.dst);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BX), op.params.src);
    assert_eq!(2, op.length);

    // OR [BX],AL, instruction word 0x0807
    let op = decode_bytes(&[0x08, 0x07]);
    assert_eq!(Op::Or8, op.command);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BX), op.params.dst);
    assert_eq!(Parameter::Reg8(R::AL), op.params.src);

    let op = decode_bytes(&[0xB8, 0x34, 0x12]);
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Imm16(0x1234), op.params.src);
    assert_eq!(3, op.length);
}

#[test]
fn decodes_displacements() {
    let op = decode_bytes(&[0x8B, 0x86, 0x00, 0xFF]); // mov ax,[bp-0x100]
    assert_eq!(Parameter::Ptr16AmodeS16(Segment::Default, AMode::BP, -0x100), op.params.src);
    assert_eq!(4, op.length);

    let op = decode_bytes(&[0x36, 0x8A, 0x46, 0x10]); // mov al,[ss:bp+0x10]
    assert_eq!(Parameter::Ptr8AmodeS8(Segment::SS, AMode::BP, 0x10), op.params.src);
    assert_eq!(Segment::SS, op.segment_prefix);
    assert_eq!(4, op.length);

    let op = decode_bytes(&[0xC7, 0x06, 0x00, 0x02, 0xCD, 0xAB]); // mov word [0x200],0xabcd
    assert_eq!(Parameter::Ptr16(Segment::Default, 0x0200), op.params.dst);
    assert_eq!(Parameter::Imm16(0xABCD), op.params.src);
    assert_eq!(6, op.length);
}

#[test]
fn rejects_invalid_encodings() {
    let invalid = [
        vec![0x0F, 0x00],       // two byte opcode map
        vec![0x60],             // pusha (80186)
        vec![0xC0, 0xE0, 0x02], // shl al,imm8 (80186)
        vec![0xD8, 0xC0],       // esc
        vec![0xF1],
        vec![0x8D, 0xC0],       // lea ax,ax
        vec![0x8F, 0xC8],       // 8F /1
        vec![0xFE, 0xD0],       // FE /2
        vec![0xFF, 0xF8],       // FF /7
        vec![0xFF, 0xD8],       // call far through a register
        vec![0xFF, 0xE8],       // jmp far through a register
        vec![0x8E, 0xC8],       // mov cs,ax
        vec![0x8C, 0xE0],       // mov ax,sreg 4
        vec![0xC4, 0xC0],       // les ax,ax
        vec![0xD0, 0xF0],       // D0 /6
    ];
    for code in &invalid {
        let op = decode_bytes(code);
        assert_eq!(false, op.command.is_valid(), "{:02X?} decoded as {}", code, op);
    }

    match decode_bytes(&[0xFE, 0xD0]).command {
        Op::Invalid(bytes, Invalid::Reg(2)) => assert_eq!(vec![0xFE, 0xD0], bytes),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn decodes_aliases() {
    // 82 is the same as 80
    let op = decode_bytes(&[0x82, 0xC0, 0x05]);
    assert_eq!(Op::Add8, op.command);
    assert_eq!(Parameter::Imm8(5), op.params.src);

    // F6 /1 is test
    let op = decode_bytes(&[0xF6, 0xC8, 0x01]);
    assert_eq!(Op::Test8, op.command);
    assert_eq!(3, op.length);

    // CC is int 3
    let op = decode_bytes(&[0xCC]);
    assert_eq!(Op::Int, op.command);
    assert_eq!(Parameter::Imm8(3), op.params.dst);
}

#[test]
fn rep_on_compare_string_ops_is_repe() {
    assert_eq!(RepeatMode::Repe, decode_bytes(&[0xF3, 0xAF]).repeat);
    assert_eq!(RepeatMode::Rep, decode_bytes(&[0xF3, 0xAB]).repeat);
    assert_eq!(RepeatMode::Repne, decode_bytes(&[0xF2, 0xA7]).repeat);
}

#[test]
fn endless_prefixes_are_invalid() {
    let op = decode_bytes(&[0x26; 32]);
    assert_eq!(false, op.command.is_valid());
    assert_eq!(16, op.length);
}
