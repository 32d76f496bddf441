use pretty_assertions::assert_eq;

use crate::cpu::{CPU, AMode, OperandSize, Parameter, R, Segment};
use crate::memory::MMU;

fn cpu_with_segments() -> CPU {
    let mut cpu = CPU::deterministic();
    cpu.set_r16(R::DS, 0x1000);
    cpu.set_r16(R::SS, 0x2000);
    cpu.set_r16(R::ES, 0x3000);
    cpu.set_r16(R::CS, 0x4000);
    cpu
}

#[test]
fn push_and_pop_use_ss_sp() {
    let mut mmu = MMU::default();
    let mut cpu = cpu_with_segments();
    cpu.set_r16(R::SP, 0x0100);

    cpu.push16(&mut mmu, 0x1234);
    cpu.push16(&mut mmu, 0xBEEF);
    assert_eq!(0x00FC, cpu.get_r16(R::SP));
    assert_eq!(0xBEEF, mmu.read_u16(0x2000, 0x00FC));
    assert_eq!(0x1234, mmu.read_u16(0x2000, 0x00FE));

    assert_eq!(0xBEEF, cpu.pop16(&mut mmu));
    assert_eq!(0x1234, cpu.pop16(&mut mmu));
    assert_eq!(0x0100, cpu.get_r16(R::SP));
}

#[test]
fn push_wraps_within_stack_segment() {
    let mut mmu = MMU::default();
    let mut cpu = cpu_with_segments();
    cpu.set_r16(R::SP, 0x0000);
    cpu.push16(&mut mmu, 0xCAFE);
    assert_eq!(0xFFFE, cpu.get_r16(R::SP));
    assert_eq!(0xCAFE, mmu.read_u16(0x2000, 0xFFFE));
}

#[test]
fn effective_address_defaults() {
    let mut cpu = cpu_with_segments();
    cpu.set_r16(R::BX, 0x0010);
    cpu.set_r16(R::BP, 0x0020);
    cpu.set_r16(R::SI, 0x0001);
    cpu.set_r16(R::DI, 0x0002);

    assert_eq!(Some((0x1000, 0x0011)), cpu.effective_address(&Parameter::Ptr8Amode(Segment::Default, AMode::BXSI)));
    assert_eq!(Some((0x2000, 0x0022)), cpu.effective_address(&Parameter::Ptr8Amode(Segment::Default, AMode::BPDI)));
    assert_eq!(Some((0x2000, 0x001E)), cpu.effective_address(&Parameter::Ptr16AmodeS8(Segment::Default, AMode::BP, -2)));
    assert_eq!(Some((0x3000, 0x0020)), cpu.effective_address(&Parameter::Ptr16Amode(Segment::ES, AMode::BP)));
    assert_eq!(Some((0x1000, 0x1010)), cpu.effective_address(&Parameter::Ptr16AmodeS16(Segment::Default, AMode::BX, 0x1000)));
    assert_eq!(Some((0x4000, 0x0200)), cpu.effective_address(&Parameter::Ptr16(Segment::CS, 0x0200)));
    assert_eq!(None, cpu.effective_address(&Parameter::Reg16(R::AX)));

    // offsets wrap within the segment
    cpu.set_r16(R::BX, 0xFFFF);
    assert_eq!(Some((0x1000, 0x0000)), cpu.effective_address(&Parameter::Ptr8AmodeS8(Segment::Default, AMode::BX, 1)));
}

#[test]
fn read_and_write_parameters() {
    let mut mmu = MMU::default();
    let mut cpu = cpu_with_segments();
    cpu.set_r16(R::BX, 0x0100);

    let mem8 = Parameter::Ptr8Amode(Segment::Default, AMode::BX);
    let mem16 = Parameter::Ptr16(Segment::Default, 0x0100);

    cpu.write_parameter_u16(&mut mmu, &mem16, 0xABCD);
    assert_eq!(0xCD, cpu.read_parameter_value(&mmu, &mem8));
    assert_eq!(0xABCD, cpu.read_parameter_value(&mmu, &mem16));

    cpu.write_parameter(&mut mmu, &mem8, OperandSize::_8bit, 0x1234);
    assert_eq!(0xAB34, cpu.read_parameter_value(&mmu, &mem16));

    cpu.write_parameter(&mut mmu, &Parameter::Reg8(R::AH), OperandSize::_8bit, 0x77);
    assert_eq!(0x7700, cpu.get_r16(R::AX));

    assert_eq!(0xFFC6, cpu.read_parameter_value(&mmu, &Parameter::ImmS8(-0x3A)));
    assert_eq!(0x0080, cpu.read_parameter_value(&mmu, &Parameter::Imm8(0x80)));

    // writes to immediates are ignored
    cpu.write_parameter_u16(&mut mmu, &Parameter::Imm16(0x0100), 0x5555);
    assert_eq!(0xAB34, cpu.read_parameter_value(&mmu, &mem16));
}

#[test]
fn segment_selector_and_lea() {
    let mut mmu = MMU::default();
    let mut cpu = cpu_with_segments();
    cpu.set_r16(R::SI, 0x0040);
    mmu.write_u16(0x1000, 0x0044, 0x1234);
    mmu.write_u16(0x1000, 0x0046, 0xF000);

    let p = Parameter::Ptr16AmodeS8(Segment::Default, AMode::SI, 4);
    assert_eq!(Some((0xF000, 0x1234)), cpu.read_segment_selector(&mmu, &p));
    assert_eq!(Some(0x0044), cpu.read_parameter_address(&p));
    assert_eq!(None, cpu.read_parameter_address(&Parameter::Reg16(R::SI)));
}

#[test]
fn decimal_adjust() {
    let mut cpu = CPU::deterministic();

    // 0x19 + 0x28 = 0x41, daa makes it 0x47
    cpu.set_r8(R::AL, 0x41);
    cpu.regs.flags.set_adjust(true);
    cpu.adj4(6, 0x60);
    assert_eq!(0x47, cpu.get_r8(R::AL));
    assert_eq!(false, cpu.regs.flags.carry());

    // 0x99 + 0x01 = 0x9A, daa makes it 0x00 with carry
    cpu.set_r8(R::AL, 0x9A);
    cpu.regs.flags.set_adjust(false);
    cpu.regs.flags.set_carry(false);
    cpu.adj4(6, 0x60);
    assert_eq!(0x00, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry());
    assert_eq!(true, cpu.regs.flags.zero());

    // aaa: AL=0x0B becomes AH+1, AL=1
    cpu.set_r16(R::AX, 0x000B);
    cpu.regs.flags.set_adjust(false);
    cpu.adjb(6, 1);
    assert_eq!(0x0101, cpu.get_r16(R::AX));
    assert_eq!(true, cpu.regs.flags.carry());
}
