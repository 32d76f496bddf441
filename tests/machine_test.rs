use pretty_assertions::assert_eq;

use realmode86::asm::Assembler;
use realmode86::bios::BIOS;
use realmode86::config::MachineConfig;
use realmode86::cpu::{AMode, Decoder, InstructionWord, Op, Parameter, R, Segment};
use realmode86::machine::{Machine, ProgramContext};
use realmode86::memory::{MMU, MemoryAddress};

const SEG: u16 = 0x085F;

fn assemble(src: &str) -> Vec<u8> {
    match Assembler::new().assemble(src) {
        Ok(code) => code,
        Err(e) => panic!("{}", e),
    }
}

fn run_source(src: &str) -> Machine {
    let code = assemble(src);
    let mut machine = Machine::deterministic();
    machine.load_executable(&code, SEG);
    machine.run();
    machine
}

#[test]
fn assembled_mov_decodes_back() {
    let code = assemble("mov ax, 0x1234");
    assert_eq!(vec![0xB8, 0x34, 0x12], code);

    let mut mmu = MMU::default();
    mmu.write(SEG, 0x0100, &code);
    let op = Decoder::default().get_instruction(&mmu, SEG, 0x0100);
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Imm16(0x1234), op.params.src);
}

#[test]
fn assembled_add_lists_instruction_word() {
    let code = assemble("ADD AL,[BX]");
    assert_eq!(vec![0x02, 0x07], code);
    assert_eq!([0x07, 0x02], InstructionWord::from_bytes(code[0], code[1]).listing_bytes());

    let mut mmu = MMU::default();
    mmu.write(SEG, 0x0100, &code);
    let op = Decoder::default().get_instruction(&mmu, SEG, 0x0100);
    assert_eq!(Op::Add8, op.command);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BX), op.params.src);
}

#[test]
fn push_pop_through_stack() {
    let machine = run_source("
        mov ax, 0x1234
        push ax
        pop bx
        hlt
    ");
    assert_eq!(0x1234, machine.cpu.get_r16(R::BX));
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
}

#[test]
fn guest_installed_interrupt_handler_returns() {
    let machine = run_source("
                xor ax, ax
                mov es, ax
                mov word es:[0x180], handler
                mov ax, cs
                mov es:[0x182], ax
                stc
                int 0x60
                hlt
        handler:
                mov bx, 0x5555
                clc
                iret
    ");
    assert_eq!(0x5555, machine.cpu.get_r16(R::BX));
    // flags are restored from the stack, not taken from the handler
    assert_eq!(true, machine.cpu.regs.flags.carry());
    assert_eq!(true, machine.cpu.regs.flags.interrupt());
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
    assert_eq!(SEG, machine.cpu.get_r16(R::CS));
}

#[test]
fn divide_error_without_handler_halts() {
    let machine = run_source("
        mov ax, 0x10
        xor bl, bl
        div bl
        mov ax, 1
        hlt
    ");
    assert_eq!(false, machine.is_active());
    assert_eq!(0x0010, machine.cpu.get_r16(R::AX));
    assert_eq!(BIOS::ROM_SEG, machine.cpu.get_r16(R::CS));
}

#[test]
fn divide_error_with_guest_handler_continues() {
    let machine = run_source("
                xor ax, ax
                mov es, ax
                mov word es:[0], on_div
                mov es:[2], cs
                mov ax, 0x10
                xor bl, bl
                div bl
                mov cx, 7
                hlt
        on_div: mov ax, 0xFFFF
                iret
    ");
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::AX));
    assert_eq!(7, machine.cpu.get_r16(R::CX));
    assert_eq!(SEG, machine.cpu.get_r16(R::CS));
}

#[test]
fn copies_and_scans_strings() {
    let machine = run_source("
                mov si, msg
                mov di, 0x300
                mov cx, 5
                cld
                rep movsb
                mov di, 0x300
                mov cx, 5
                mov al, 'l'
                repne scasb
                hlt
        msg:    db \"hello\"
    ");
    assert_eq!(b"hello".to_vec(), machine.mmu.read(SEG, 0x0300, 5));
    // stops after the first 'l'
    assert_eq!(0x0303, machine.cpu.get_r16(R::DI));
    assert_eq!(2, machine.cpu.get_r16(R::CX));
    assert_eq!(true, machine.cpu.regs.flags.zero());
}

#[test]
fn calls_guest_subroutine() {
    let code = Assembler::new().with_origin(0).assemble("
        sum:    push bp
                mov bp, sp
                mov ax, [bp+6]
                add ax, [bp+8]
                pop bp
                retf
    ").unwrap();

    let mut machine = Machine::deterministic();
    machine.load_code(0x2000, 0x0000, &code);
    machine.call(&ProgramContext {
        code: MemoryAddress::RealSegmentOffset(0x2000, 0x0000),
        data_segment: 0x3000,
        args: vec![40, 2],
    });

    assert_eq!(42, machine.cpu.get_r16(R::AX));
    assert_eq!(0x3000, machine.cpu.get_r16(R::DS));
    assert_eq!((BIOS::ROM_SEG, BIOS::EXIT_STUB + 1), machine.cpu.get_address_pair());
}

#[test]
fn runs_with_config_from_toml() {
    let config = MachineConfig::from_toml_str("
        deterministic = true
        stack_segment = 0x4000
        stack_top = 0x1000
    ").unwrap();
    let mut machine = Machine::with_config(config);
    assert_eq!(0x4000, machine.cpu.get_r16(R::SS));
    assert_eq!(0x1000, machine.cpu.get_r16(R::SP));

    let code = assemble("mov dx, 0x200\nhlt");
    machine.load_executable(&code, 0x1000);
    machine.run();
    assert_eq!(0x0200, machine.cpu.get_r16(R::DX));
    assert_eq!(2, machine.cpu.instruction_count);
}

#[test]
fn disassembles_assembled_program() {
    let code = assemble("
        start:  mov cx, 3
        again:  dec cx
                jnz again
                int 0x21
    ");
    let mut mmu = MMU::default();
    mmu.write(SEG, 0x0100, &code);
    let ops: Vec<Op> = Decoder::default()
        .decode_to_block(&mmu, SEG, 0x0100, 4)
        .into_iter()
        .map(|info| info.instruction.command)
        .collect();
    assert_eq!(vec![Op::Mov16, Op::Dec16, Op::Jnz, Op::Int], ops);
}
