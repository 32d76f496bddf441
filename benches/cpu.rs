#[macro_use]
extern crate criterion;

use criterion::Criterion;

use realmode86::asm::Assembler;
use realmode86::cpu::{Decoder, Encoder};
use realmode86::machine::Machine;

const SEG: u16 = 0x085F;

const LOOP_PROGRAM: &str = "
    start:  mov cx, 0xFFFF
    again:  dec cx
            jmp short again
";

const MIXED_PROGRAM: &str = "
            cmp byte [0x1031], 0
            mov cx, 0xFFFF
            dec cx
            jmp short 0x100
            add di, 0x3A
            mov bx, 0x798F
            jmp short 0x100
            mov cx, 0xFFFF
";

fn exec_simple_loop(c: &mut Criterion) {
    let code = Assembler::new().assemble(LOOP_PROGRAM).unwrap();
    let mut machine = Machine::deterministic();
    machine.load_executable(&code, SEG);

    c.bench_function("execute small jmp short loop", move |b| b.iter(|| machine.execute_instruction()));
}

fn disasm_small_prog(c: &mut Criterion) {
    let code = Assembler::new().assemble(MIXED_PROGRAM).unwrap();
    let mut machine = Machine::deterministic();
    machine.load_executable(&code, SEG);
    let mut decoder = Decoder::default();

    c.bench_function("disasm small prog", move |b| b.iter(|| decoder.disassemble_block_to_str(&machine.mmu, SEG, 0x100, 8)));
}

fn encode_small_prog(c: &mut Criterion) {
    let code = Assembler::new().assemble(MIXED_PROGRAM).unwrap();
    let mut machine = Machine::deterministic();
    machine.load_executable(&code, SEG);
    let ops: Vec<_> = Decoder::default()
        .decode_to_block(&machine.mmu, SEG, 0x100, 8)
        .into_iter()
        .map(|info| info.instruction)
        .collect();
    let encoder = Encoder::new();

    c.bench_function("encode small prog", move |b| b.iter(|| encoder.encode_vec(&ops, 0x100)));
}

fn assemble_small_prog(c: &mut Criterion) {
    let asm = Assembler::new();
    c.bench_function("assemble small prog", move |b| b.iter(|| asm.assemble(MIXED_PROGRAM)));
}

criterion_group!(benches, exec_simple_loop, disasm_small_prog, encode_small_prog, assemble_small_prog);
criterion_main!(benches);
