use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::bios::BIOS;
use crate::config::MachineConfig;
use crate::cpu::{CPU, Decoder, Exception, Flags, Instruction, Invalid, Op, OperandSize, Parameter, R, RegisterState, RepeatMode};
use crate::hex::hex_bytes;
use crate::memory::{MMU, MemoryAddress};

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// result of a interrupt service request
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Interrupt {
    Handled,
    Unhandled,
    /// stops execution
    Halt,
}

/// control flow result of a executed instruction
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Step {
    /// continue with the next instruction
    Next,
    /// near transfer to offset in CS
    Jump(u16),
    /// far transfer to CS:IP
    Far(u16, u16),
    Halt,
}

/// service object injected into the machine, handling i/o ports and interrupts
pub trait Component {
    /// returns Some<u8> if read was handled
    fn in_u8(&mut self, _port: u16) -> Option<u8> {
        None
    }

    /// returns Some<u16> if read was handled
    fn in_u16(&mut self, _port: u16) -> Option<u16> {
        None
    }

    /// returns true if write was handled
    fn out_u8(&mut self, _port: u16, _data: u8) -> bool {
        false
    }

    /// returns true if write was handled
    fn out_u16(&mut self, _port: u16, _data: u16) -> bool {
        false
    }

    fn int(&mut self, _int: u8, _cpu: &mut CPU, _mmu: &mut MMU) -> Interrupt {
        Interrupt::Unhandled
    }
}

/// one-shot invocation of guest code by the surrounding system
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramContext {
    pub code: MemoryAddress,
    pub data_segment: u16,
    /// pushed in order before the return frame
    pub args: Vec<u16>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
}

pub struct Machine {
    pub mmu: MMU,
    pub bios: BIOS,
    pub cpu: CPU,
    pub config: MachineConfig,

    /// handlers for i/o ports and interrupts
    components: Vec<Box<dyn Component>>,

    active: Arc<AtomicBool>,
    /// SS:SP of the current session. a return that would pop past it halts
    /// SS:SP of the current session. a return with SP at or above it halts
    stack_base: MemoryAddress,

    /// FLAGS addresses of the interrupted handlers, innermost last
    interrupt_frames: Vec<MemoryAddress>,

    last_tick: Instant,
}

impl Default for Machine {
    /// returns a non-deterministic Machine instance
    fn default() -> Self {
        Self::with_config(MachineConfig::default())
    }
}

impl Machine {
    pub fn deterministic() -> Self {
        Self::with_config(MachineConfig::deterministic())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        let mut mmu = MMU::default();
        let mut bios = if config.deterministic {
            BIOS::deterministic()
        } else {
            BIOS::default()
        };
        bios.init(&mut mmu);

        let mut cpu = if config.deterministic {
            CPU::deterministic()
        } else {
            CPU::default()
        };
        cpu.set_r16(R::SS, config.stack_segment);
        cpu.set_r16(R::SP, config.stack_top);

        Machine {
            stack_base: MemoryAddress::RealSegmentOffset(config.stack_segment, config.stack_top),
            interrupt_frames: Vec::new(),
            cpu,
            mmu,
            bios,
            config,
            components: Vec::new(),
            active: Arc::new(AtomicBool::new(true)),
            last_tick: Instant::now(),
        }
    }

    pub fn with_components(config: MachineConfig, components: Vec<Box<dyn Component>>) -> Self {
        let mut m = Self::with_config(config);
        m.components = components;
        m
    }

    /// components are asked in registration order
    pub fn add_component(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    /// returns a handle that stops execution when set to false
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// stops execution, observed at the top of the fetch loop
    pub fn halt(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// load .com style program into seg:code_offset (0100 by default) and set IP to program start
    pub fn load_executable(&mut self, data: &[u8], seg: u16) {
        let offset = self.config.code_offset;
        self.cpu.set_r16(R::CS, seg);
        self.cpu.set_r16(R::DS, seg);
        self.cpu.set_r16(R::ES, seg);
        self.cpu.set_r16(R::SS, seg);

        // offset of last word available in first 64k segment
        self.cpu.set_r16(R::SP, 0xFFFE);
        self.stack_base = MemoryAddress::RealSegmentOffset(seg, 0xFFFE);

        self.cpu.regs.flags.set_interrupt(true);
        self.cpu.regs.ip = offset;
        self.cpu.decoder = Decoder::default();
        self.reset_interrupt_frames();
        self.mmu.write(seg, offset, data);
        self.active.store(true, Ordering::SeqCst);
        log::debug!("loaded {} bytes to {:04X}:{:04X}", data.len(), seg, offset);
    }

    /// writes code to seg:offset, leaving the registers untouched
    pub fn load_code(&mut self, seg: u16, offset: u16, data: &[u8]) {
        self.mmu.write(seg, offset, data);
    }

    /// points interrupt vector `number` at `handler`
    pub fn register_vector(&mut self, number: u8, handler: MemoryAddress) {
        self.mmu.write_vec(number, handler);
    }

    /// returns a copy of register values at a given time
    pub fn register_snapshot(&self) -> RegisterState {
        self.cpu.regs.clone()
    }

    /// transfers control to guest code and runs until it returns or halts
    pub fn call(&mut self, ctx: &ProgramContext) {
        self.cpu.set_r16(R::DS, ctx.data_segment);
        self.cpu.set_r16(R::ES, ctx.data_segment);

        let (ss, sp) = (self.config.stack_segment, self.config.stack_top);
        self.cpu.set_r16(R::SS, ss);
        self.cpu.set_r16(R::SP, sp);
        self.stack_base = MemoryAddress::RealSegmentOffset(ss, sp);
        self.reset_interrupt_frames();

        for arg in &ctx.args {
            self.cpu.push16(&mut self.mmu, *arg);
        }
        // return frame to the exit stub
        self.cpu.push16(&mut self.mmu, BIOS::ROM_SEG);
        self.cpu.push16(&mut self.mmu, BIOS::EXIT_STUB);

        self.cpu.set_r16(R::CS, ctx.code.segment());
        self.cpu.regs.ip = ctx.code.offset();
        self.cpu.decoder = Decoder::default();
        log::info!("call {} with {} args, DS={:04X}", ctx.code, ctx.args.len(), ctx.data_segment);
        self.run();
    }

    fn reset_interrupt_frames(&mut self) {
        self.interrupt_frames.clear();
        self.mmu.flags_address = MemoryAddress::Unset;
    }

    /// executes instructions until the machine is halted
    pub fn run(&mut self) {
        self.active.store(true, Ordering::SeqCst);
        self.last_tick = Instant::now();
        log::info!("running from {}", self.cpu.get_memory_address());
        while self.is_active() {
            self.check_timer();
            self.execute_instruction();
        }
        log::info!("stopped at {} after {} instructions", self.cpu.get_memory_address(), self.cpu.instruction_count);
    }

    /// executes n instructions of the cpu
    pub fn execute_instructions(&mut self, count: usize) {
        for _ in 0..count {
            if !self.is_active() {
                break;
            }
            self.execute_instruction();
        }
    }

    /// fires INT 08 once the timer interval passed and interrupts are enabled
    fn check_timer(&mut self) {
        if self.cpu.deterministic || !self.cpu.regs.flags.interrupt() {
            return;
        }
        if self.last_tick.elapsed() >= self.config.timer_interval() {
            self.last_tick = Instant::now();
            self.execute_interrupt(0x08);
        }
    }

    fn handle_interrupt(&mut self, int: u8) -> Interrupt {
        // ask subsystems if they can handle the interrupt
        for component in &mut self.components {
            match component.int(int, &mut self.cpu, &mut self.mmu) {
                Interrupt::Unhandled => {}
                res => return res,
            }
        }

        let res = self.bios.int(int, &mut self.cpu, &mut self.mmu);
        if res == Interrupt::Unhandled {
            log::warn!("unhandled interrupt {:02X}, AX={:04X}, BX={:04X}",
                       int, self.cpu.get_r16(R::AX), self.cpu.get_r16(R::BX));
        }
        res
    }

    /// pushes FLAGS, CS, IP and returns the handler address of interrupt `int`
    fn enter_interrupt(&mut self, int: u8) -> (u16, u16) {
        let flags = self.cpu.regs.flags.u16();
        self.cpu.push16(&mut self.mmu, flags);
        let frame = MemoryAddress::RealSegmentOffset(self.cpu.get_r16(R::SS), self.cpu.get_r16(R::SP));
        self.interrupt_frames.push(self.mmu.flags_address);
        self.mmu.flags_address = frame;

        self.cpu.regs.flags.set_interrupt(false);
        self.cpu.regs.flags.set_trap(false);
        let (cs, ip) = self.cpu.get_address_pair();
        self.cpu.push16(&mut self.mmu, cs);
        self.cpu.push16(&mut self.mmu, ip);
        let handler = self.mmu.read_vec(int);
        log::trace!("int {:02X} from {:04X}:{:04X} to {}", int, cs, ip, handler);
        (handler.segment(), handler.offset())
    }

    /// invokes interrupt `int` with the current CS:IP as return address
    pub fn execute_interrupt(&mut self, int: u8) {
        let (cs, ip) = self.enter_interrupt(int);
        self.cpu.set_r16(R::CS, cs);
        self.cpu.regs.ip = ip;
    }

    fn interrupt_step(&mut self, int: u8) -> Step {
        let (cs, ip) = self.enter_interrupt(int);
        Step::Far(cs, ip)
    }

    fn exception(&mut self, which: Exception) -> Step {
        log::debug!("[{}] exception {:?}", self.cpu.get_memory_address(), which);
        self.interrupt_step(which.vector())
    }

    /// true when the session stack holds less than `frame` bytes.
    /// the depth is measured with wrapping arithmetic, so a top of 0000 is a full 64k stack
    fn stack_is_empty(&self, frame: u16) -> bool {
        if !self.stack_base.is_set() || self.cpu.get_r16(R::SS) != self.stack_base.segment() {
            return false;
        }
        let depth = self.stack_base.offset().wrapping_sub(self.cpu.get_r16(R::SP));
        depth < frame
    }

    pub fn execute_instruction(&mut self) {
        let (cs, ip) = self.cpu.get_address_pair();
        if cs == BIOS::ROM_SEG && ip < 0x100 {
            // we are in interrupt vector code, execute high-level interrupt.
            // the default interrupt vector table has a IRET
            if self.handle_interrupt(ip as u8) == Interrupt::Halt {
                self.halt();
                return;
            }
        }

        let op = self.cpu.decoder.get_instruction(&self.mmu, cs, ip);
        if self.config.trace {
            log::trace!("[{:04X}:{:04X}] {:<30} {}", cs, ip, op.to_string(), self.cpu.regs.flags);
        }

        self.cpu.regs.ip = ip.wrapping_add(u16::from(op.length));
        self.cpu.instruction_count += 1;
        self.cpu.cycle_count += 1;

        let step = match op.command {
            Op::Uninitialized => {
                log::error!("[{:04X}:{:04X}] uninitialized op", cs, ip);
                self.exception(Exception::UD)
            }
            Op::Invalid(ref bytes, ref reason) => {
                let hex = hex_bytes(bytes);
                match reason {
                    Invalid::Op => log::error!("[{:04X}:{:04X}] {} unhandled opcode", cs, ip, hex),
                    Invalid::Reg(reg) => log::error!("[{:04X}:{:04X}] {} unhandled reg value {:02X}", cs, ip, hex, reg),
                }
                self.exception(Exception::UD)
            }
            _ => self.execute(&op),
        };

        match step {
            Step::Next => {}
            Step::Jump(ip) => self.cpu.regs.ip = ip,
            Step::Far(cs, ip) => {
                self.cpu.set_r16(R::CS, cs);
                self.cpu.regs.ip = ip;
            }
            Step::Halt => {
                log::info!("[{:04X}:{:04X}] halted", cs, ip);
                self.halt();
            }
        }
    }

    /// read byte from I/O port
    pub fn in_u8(&mut self, port: u16) -> u8 {
        for component in &mut self.components {
            if let Some(v) = component.in_u8(port) {
                return v;
            }
        }
        log::warn!("in_u8: unhandled port {:04X}", port);
        0
    }

    /// read word from I/O port
    pub fn in_u16(&mut self, port: u16) -> u16 {
        for component in &mut self.components {
            if let Some(v) = component.in_u16(port) {
                return v;
            }
        }
        log::warn!("in_u16: unhandled port {:04X}", port);
        0
    }

    /// write byte to I/O port
    pub fn out_u8(&mut self, port: u16, data: u8) {
        for component in &mut self.components {
            if component.out_u8(port, data) {
                return;
            }
        }
        log::warn!("out_u8: unhandled port {:04X} = {:02X}", port, data);
    }

    /// write word to I/O port
    pub fn out_u16(&mut self, port: u16, data: u16) {
        for component in &mut self.components {
            if component.out_u16(port, data) {
                return;
            }
        }
        log::warn!("out_u16: unhandled port {:04X} = {:04X}", port, data);
    }

    fn read(&self, p: &Parameter) -> u16 {
        self.cpu.read_parameter_value(&self.mmu, p)
    }

    fn write(&mut self, p: &Parameter, size: OperandSize, data: u16) {
        self.cpu.write_parameter(&mut self.mmu, p, size, data);
    }

    /// applies a flag updating operation to dst and src, storing the result in dst if `store`
    fn alu(&mut self, op: &Instruction, size: OperandSize, f: fn(&mut Flags, u16, u16, OperandSize) -> u16, store: bool) {
        let dst = self.read(&op.params.dst);
        let src = self.read(&op.params.src);
        let res = f(&mut self.cpu.regs.flags, dst, src, size);
        if store {
            self.write(&op.params.dst, size, res);
        }
    }

    fn jump_if(&self, op: &Instruction, cond: bool) -> Step {
        if cond {
            Step::Jump(self.read(&op.params.dst))
        } else {
            Step::Next
        }
    }

    fn execute(&mut self, op: &Instruction) -> Step {
        use crate::cpu::OperandSize::{_8bit, _16bit};
        let flags = self.cpu.regs.flags;
        match op.command {
            Op::Aaa => {
                let v = if self.cpu.get_r8(R::AL) > 0xF9 {
                    2
                } else {
                    1
                };
                self.cpu.adjb(6, v);
            }
            Op::Aad => {
                let imm8 = self.read(&op.params.dst) as u8;
                let ah = self.cpu.get_r8(R::AH);
                let al = self.cpu.get_r8(R::AL).wrapping_add(ah.wrapping_mul(imm8));
                self.cpu.set_r16(R::AX, u16::from(al));
                // modification of flags A,C,O is undocumented
                self.cpu.regs.flags.set_carry(false);
                self.cpu.regs.flags.set_overflow(false);
                self.cpu.regs.flags.set_adjust(false);
                self.cpu.regs.flags.set_result_flags(u16::from(al), _8bit);
            }
            Op::Aam => {
                // AH ← tempAL / imm8; AL ← tempAL MOD imm8
                let imm8 = self.read(&op.params.dst) as u8;
                if imm8 == 0 {
                    return self.exception(Exception::DIV0);
                }
                let al = self.cpu.get_r8(R::AL);
                self.cpu.set_r8(R::AH, al / imm8);
                self.cpu.set_r8(R::AL, al % imm8);
                self.cpu.regs.flags.set_carry(false);
                self.cpu.regs.flags.set_overflow(false);
                self.cpu.regs.flags.set_adjust(false);
                self.cpu.regs.flags.set_result_flags(u16::from(al % imm8), _8bit);
            }
            Op::Aas => {
                let v = if self.cpu.get_r8(R::AL) < 6 {
                    -2
                } else {
                    -1
                };
                self.cpu.adjb(-6, v);
            }
            Op::Daa => self.cpu.adj4(6, 0x60),
            Op::Das => self.cpu.adj4(-6, -0x60),

            Op::Add8 => self.alu(op, _8bit, Flags::update_add, true),
            Op::Add16 => self.alu(op, _16bit, Flags::update_add, true),
            Op::Adc8 => self.alu(op, _8bit, Flags::update_adc, true),
            Op::Adc16 => self.alu(op, _16bit, Flags::update_adc, true),
            Op::Sub8 => self.alu(op, _8bit, Flags::update_sub, true),
            Op::Sub16 => self.alu(op, _16bit, Flags::update_sub, true),
            Op::Sbb8 => self.alu(op, _8bit, Flags::update_sbb, true),
            Op::Sbb16 => self.alu(op, _16bit, Flags::update_sbb, true),
            Op::Cmp8 => self.alu(op, _8bit, Flags::update_sub, false),
            Op::Cmp16 => self.alu(op, _16bit, Flags::update_sub, false),
            Op::And8 => self.alu(op, _8bit, Flags::update_and, true),
            Op::And16 => self.alu(op, _16bit, Flags::update_and, true),
            Op::Or8 => self.alu(op, _8bit, Flags::update_or, true),
            Op::Or16 => self.alu(op, _16bit, Flags::update_or, true),
            Op::Xor8 => self.alu(op, _8bit, Flags::update_xor, true),
            Op::Xor16 => self.alu(op, _16bit, Flags::update_xor, true),
            Op::Test8 => self.alu(op, _8bit, Flags::update_and, false),
            Op::Test16 => self.alu(op, _16bit, Flags::update_and, false),

            Op::Inc8 | Op::Inc16 | Op::Dec8 | Op::Dec16 | Op::Neg8 | Op::Neg16 => {
                let size = op.params.dst.size().unwrap_or(_16bit);
                let dst = self.read(&op.params.dst);
                let res = match op.command {
                    Op::Inc8 | Op::Inc16 => self.cpu.regs.flags.update_inc(dst, size),
                    Op::Dec8 | Op::Dec16 => self.cpu.regs.flags.update_dec(dst, size),
                    _ => self.cpu.regs.flags.update_neg(dst, size),
                };
                self.write(&op.params.dst, size, res);
            }
            Op::Not8 | Op::Not16 => {
                // flags are not affected
                let size = op.params.dst.size().unwrap_or(_16bit);
                let dst = self.read(&op.params.dst);
                self.write(&op.params.dst, size, !dst);
            }

            Op::Mul8 => {
                // AX ← AL ∗ r/m8
                let res = u16::from(self.cpu.get_r8(R::AL)) * (self.read(&op.params.dst) & 0xFF);
                self.cpu.set_r16(R::AX, res);
                let upper = res & 0xFF00 != 0;
                self.cpu.regs.flags.set_carry(upper);
                self.cpu.regs.flags.set_overflow(upper);
            }
            Op::Mul16 => {
                // DX:AX ← AX ∗ r/m16
                let res = u32::from(self.cpu.get_r16(R::AX)) * u32::from(self.read(&op.params.dst));
                self.cpu.set_r16(R::AX, res as u16);
                self.cpu.set_r16(R::DX, (res >> 16) as u16);
                let upper = res & 0xFFFF_0000 != 0;
                self.cpu.regs.flags.set_carry(upper);
                self.cpu.regs.flags.set_overflow(upper);
            }
            Op::Imul8 => {
                // AX ← AL ∗ r/m8 (signed)
                let al = i16::from(self.cpu.get_r8(R::AL) as i8);
                let src = i16::from(self.read(&op.params.dst) as u8 as i8);
                let res = al * src;
                self.cpu.set_r16(R::AX, res as u16);
                let overflow = i16::from(res as i8) != res;
                self.cpu.regs.flags.set_carry(overflow);
                self.cpu.regs.flags.set_overflow(overflow);
            }
            Op::Imul16 => {
                // DX:AX ← AX ∗ r/m16 (signed)
                let ax = i32::from(self.cpu.get_r16(R::AX) as i16);
                let src = i32::from(self.read(&op.params.dst) as i16);
                let res = ax * src;
                self.cpu.set_r16(R::AX, res as u16);
                self.cpu.set_r16(R::DX, (res >> 16) as u16);
                let overflow = i32::from(res as i16) != res;
                self.cpu.regs.flags.set_carry(overflow);
                self.cpu.regs.flags.set_overflow(overflow);
            }
            Op::Div8 => {
                // AL ← AX / r/m8, AH ← remainder
                let ax = self.cpu.get_r16(R::AX);
                let div = self.read(&op.params.dst) & 0xFF;
                if div == 0 || ax / div > 0xFF {
                    return self.exception(Exception::DIV0);
                }
                self.cpu.set_r8(R::AL, (ax / div) as u8);
                self.cpu.set_r8(R::AH, (ax % div) as u8);
            }
            Op::Div16 => {
                // AX ← DX:AX / r/m16, DX ← remainder
                let num = (u32::from(self.cpu.get_r16(R::DX)) << 16) | u32::from(self.cpu.get_r16(R::AX));
                let div = u32::from(self.read(&op.params.dst));
                if div == 0 || num / div > 0xFFFF {
                    return self.exception(Exception::DIV0);
                }
                self.cpu.set_r16(R::AX, (num / div) as u16);
                self.cpu.set_r16(R::DX, (num % div) as u16);
            }
            Op::Idiv8 => {
                let num = i32::from(self.cpu.get_r16(R::AX) as i16);
                let div = i32::from(self.read(&op.params.dst) as u8 as i8);
                if div == 0 {
                    return self.exception(Exception::DIV0);
                }
                let quo = num / div;
                if quo > i32::from(i8::max_value()) || quo < i32::from(i8::min_value()) {
                    return self.exception(Exception::DIV0);
                }
                self.cpu.set_r8(R::AL, quo as u8);
                self.cpu.set_r8(R::AH, (num % div) as u8);
            }
            Op::Idiv16 => {
                let num = i64::from(((u32::from(self.cpu.get_r16(R::DX)) << 16) | u32::from(self.cpu.get_r16(R::AX))) as i32);
                let div = i64::from(self.read(&op.params.dst) as i16);
                if div == 0 {
                    return self.exception(Exception::DIV0);
                }
                let quo = num / div;
                if quo > i64::from(i16::max_value()) || quo < i64::from(i16::min_value()) {
                    return self.exception(Exception::DIV0);
                }
                self.cpu.set_r16(R::AX, quo as u16);
                self.cpu.set_r16(R::DX, (num % div) as u16);
            }

            Op::Rol8 => self.shift(op, _8bit, ShiftOp::Rol),
            Op::Rol16 => self.shift(op, _16bit, ShiftOp::Rol),
            Op::Ror8 => self.shift(op, _8bit, ShiftOp::Ror),
            Op::Ror16 => self.shift(op, _16bit, ShiftOp::Ror),
            Op::Rcl8 => self.shift(op, _8bit, ShiftOp::Rcl),
            Op::Rcl16 => self.shift(op, _16bit, ShiftOp::Rcl),
            Op::Rcr8 => self.shift(op, _8bit, ShiftOp::Rcr),
            Op::Rcr16 => self.shift(op, _16bit, ShiftOp::Rcr),
            Op::Shl8 => self.shift(op, _8bit, ShiftOp::Shl),
            Op::Shl16 => self.shift(op, _16bit, ShiftOp::Shl),
            Op::Shr8 => self.shift(op, _8bit, ShiftOp::Shr),
            Op::Shr16 => self.shift(op, _16bit, ShiftOp::Shr),
            Op::Sar8 => self.shift(op, _8bit, ShiftOp::Sar),
            Op::Sar16 => self.shift(op, _16bit, ShiftOp::Sar),

            Op::Mov8 => {
                let data = self.read(&op.params.src);
                self.write(&op.params.dst, _8bit, data);
            }
            Op::Mov16 => {
                let data = self.read(&op.params.src);
                self.write(&op.params.dst, _16bit, data);
            }
            Op::Xchg8 | Op::Xchg16 => {
                let size = op.params.dst.size().unwrap_or(_16bit);
                let dst = self.read(&op.params.dst);
                let src = self.read(&op.params.src);
                self.write(&op.params.dst, size, src);
                self.write(&op.params.src, size, dst);
            }
            Op::Lea16 => match self.cpu.read_parameter_address(&op.params.src) {
                Some(offset) => self.write(&op.params.dst, _16bit, offset),
                None => log::warn!("[{}] lea without memory operand: {}", self.cpu.get_memory_address(), op),
            },
            Op::Lds | Op::Les => match self.cpu.read_segment_selector(&self.mmu, &op.params.src) {
                Some((segment, offset)) => {
                    self.write(&op.params.dst, _16bit, offset);
                    let sreg = if op.command == Op::Lds { R::DS } else { R::ES };
                    self.cpu.set_r16(sreg, segment);
                }
                None => log::warn!("[{}] far pointer load without memory operand: {}", self.cpu.get_memory_address(), op),
            },
            Op::Xlatb => {
                // AL ← [seg:BX + unsigned AL]
                let seg = self.cpu.segment(op.segment_prefix);
                let offset = self.cpu.get_r16(R::BX).wrapping_add(u16::from(self.cpu.get_r8(R::AL)));
                let al = self.mmu.read_u8(seg, offset);
                self.cpu.set_r8(R::AL, al);
            }
            Op::Lahf => {
                // AH ← EFLAGS(SF:ZF:0:AF:0:PF:1:CF);
                let val = self.cpu.regs.flags.u16() as u8;
                self.cpu.set_r8(R::AH, val);
            }
            Op::Sahf => {
                // EFLAGS(SF:ZF:0:AF:0:PF:1:CF) ← AH;
                let ah = u16::from(self.cpu.get_r8(R::AH));
                let val = (self.cpu.regs.flags.u16() & 0xFF00) | ah;
                self.cpu.regs.flags.set_u16(val);
            }
            Op::Cbw => {
                let ax = i16::from(self.cpu.get_r8(R::AL) as i8) as u16;
                self.cpu.set_r16(R::AX, ax);
            }
            Op::Cwd => {
                let dx = if self.cpu.get_r16(R::AX) & 0x8000 != 0 {
                    0xFFFF
                } else {
                    0
                };
                self.cpu.set_r16(R::DX, dx);
            }
            Op::Salc => {
                let al = if flags.carry() { 0xFF } else { 0 };
                self.cpu.set_r8(R::AL, al);
            }

            Op::Push16 => {
                // the 8086 pushes the decremented value of SP
                let data = match op.params.dst {
                    Parameter::Reg16(R::SP) => self.cpu.get_r16(R::SP).wrapping_sub(2),
                    ref p => self.read(p),
                };
                self.cpu.push16(&mut self.mmu, data);
            }
            Op::Pop16 => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.write(&op.params.dst, _16bit, data);
            }
            Op::Pushf => {
                let data = flags.u16();
                self.cpu.push16(&mut self.mmu, data);
            }
            Op::Popf => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(data);
            }

            Op::In8 => {
                let port = self.read(&op.params.src);
                let data = self.in_u8(port);
                self.cpu.set_r8(R::AL, data);
            }
            Op::In16 => {
                let port = self.read(&op.params.src);
                let data = self.in_u16(port);
                self.cpu.set_r16(R::AX, data);
            }
            Op::Out8 => {
                let port = self.read(&op.params.dst);
                let data = self.cpu.get_r8(R::AL);
                self.out_u8(port, data);
            }
            Op::Out16 => {
                let port = self.read(&op.params.dst);
                let data = self.cpu.get_r16(R::AX);
                self.out_u16(port, data);
            }

            Op::Movsb | Op::Movsw | Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw |
            Op::Lodsb | Op::Lodsw | Op::Stosb | Op::Stosw => return self.string_op(op),

            Op::JmpShort | Op::JmpNear => return Step::Jump(self.read(&op.params.dst)),
            Op::JmpFar => return self.far_target(op),
            Op::CallNear => {
                let target = self.read(&op.params.dst);
                let ip = self.cpu.regs.ip;
                self.cpu.push16(&mut self.mmu, ip);
                return Step::Jump(target);
            }
            Op::CallFar => {
                let target = self.far_target(op);
                if target == Step::Next {
                    return target;
                }
                let (cs, ip) = self.cpu.get_address_pair();
                self.cpu.push16(&mut self.mmu, cs);
                self.cpu.push16(&mut self.mmu, ip);
                return target;
            }
            Op::Retn => {
                if self.stack_is_empty(2) {
                    log::info!("[{}] return with empty stack", self.cpu.get_memory_address());
                    return Step::Halt;
                }
                let ip = self.cpu.pop16(&mut self.mmu);
                self.release_stack(op);
                return Step::Jump(ip);
            }
            Op::Retf => {
                if self.stack_is_empty(4) {
                    log::info!("[{}] far return with empty stack", self.cpu.get_memory_address());
                    return Step::Halt;
                }
                let ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.release_stack(op);
                return Step::Far(cs, ip);
            }
            Op::Iret => {
                if self.stack_is_empty(6) {
                    log::info!("[{}] iret with empty stack", self.cpu.get_memory_address());
                    return Step::Halt;
                }
                let ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                let flags = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(flags);
                // the enclosing handler's frame becomes current again
                self.mmu.flags_address = self.interrupt_frames.pop().unwrap_or(MemoryAddress::Unset);
                return Step::Far(cs, ip);
            }
            Op::Int => {
                let int = self.read(&op.params.dst) as u8;
                return self.interrupt_step(int);
            }
            Op::Into => {
                if flags.overflow() {
                    return self.interrupt_step(4);
                }
            }

            Op::Jo => return self.jump_if(op, flags.overflow()),
            Op::Jno => return self.jump_if(op, !flags.overflow()),
            Op::Jc => return self.jump_if(op, flags.carry()),
            Op::Jnc => return self.jump_if(op, !flags.carry()),
            Op::Jz => return self.jump_if(op, flags.zero()),
            Op::Jnz => return self.jump_if(op, !flags.zero()),
            Op::Jna => return self.jump_if(op, flags.carry() || flags.zero()),
            Op::Ja => return self.jump_if(op, !flags.carry() && !flags.zero()),
            Op::Js => return self.jump_if(op, flags.sign()),
            Op::Jns => return self.jump_if(op, !flags.sign()),
            Op::Jpe => return self.jump_if(op, flags.parity()),
            Op::Jpo => return self.jump_if(op, !flags.parity()),
            Op::Jl => return self.jump_if(op, flags.sign() != flags.overflow()),
            Op::Jnl => return self.jump_if(op, flags.sign() == flags.overflow()),
            Op::Jng => return self.jump_if(op, flags.zero() || flags.sign() != flags.overflow()),
            Op::Jg => return self.jump_if(op, !flags.zero() && flags.sign() == flags.overflow()),
            Op::Jcxz => return self.jump_if(op, self.cpu.get_r16(R::CX) == 0),
            Op::Loop | Op::Loope | Op::Loopne => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                let cond = match op.command {
                    Op::Loope => flags.zero(),
                    Op::Loopne => !flags.zero(),
                    _ => true,
                };
                return self.jump_if(op, cx != 0 && cond);
            }

            Op::Clc => self.cpu.regs.flags.set_carry(false),
            Op::Stc => self.cpu.regs.flags.set_carry(true),
            Op::Cmc => self.cpu.regs.flags.set_carry(!flags.carry()),
            Op::Cld => self.cpu.regs.flags.set_direction(false),
            Op::Std => self.cpu.regs.flags.set_direction(true),
            Op::Cli => self.cpu.regs.flags.set_interrupt(false),
            Op::Sti => self.cpu.regs.flags.set_interrupt(true),

            Op::Hlt => return Step::Halt,
            Op::Nop | Op::Wait => {}

            Op::Uninitialized | Op::Invalid(_, _) => return self.exception(Exception::UD),
        }
        Step::Next
    }

    /// resolves the target of a far jump or call
    fn far_target(&mut self, op: &Instruction) -> Step {
        match op.params.dst {
            Parameter::Ptr16Imm(seg, off) => Step::Far(seg, off),
            ref p => match self.cpu.read_segment_selector(&self.mmu, p) {
                Some((seg, off)) => Step::Far(seg, off),
                None => {
                    log::warn!("[{}] far transfer without target: {}", self.cpu.get_memory_address(), op);
                    Step::Next
                }
            },
        }
    }

    /// releases the optional imm16 bytes of RET n
    fn release_stack(&mut self, op: &Instruction) {
        if let Parameter::Imm16(n) = op.params.dst {
            let sp = self.cpu.get_r16(R::SP).wrapping_add(n);
            self.cpu.set_r16(R::SP, sp);
        }
    }

    fn shift(&mut self, op: &Instruction, size: OperandSize, kind: ShiftOp) {
        // the 8086 does not mask the count
        let count = self.read(&op.params.src) & 0xFF;
        if count == 0 {
            return;
        }
        let sign = size.sign_bit();
        let mask = size.mask();
        let original = self.read(&op.params.dst) & mask;
        let mut v = original;
        let mut cf = self.cpu.regs.flags.carry();
        for _ in 0..count {
            match kind {
                ShiftOp::Rol => {
                    cf = v & sign != 0;
                    v = ((v << 1) | cf as u16) & mask;
                }
                ShiftOp::Ror => {
                    cf = v & 1 != 0;
                    v = (v >> 1) | if cf { sign } else { 0 };
                }
                ShiftOp::Rcl => {
                    let out = v & sign != 0;
                    v = ((v << 1) | cf as u16) & mask;
                    cf = out;
                }
                ShiftOp::Rcr => {
                    let out = v & 1 != 0;
                    v = (v >> 1) | if cf { sign } else { 0 };
                    cf = out;
                }
                ShiftOp::Shl => {
                    cf = v & sign != 0;
                    v = (v << 1) & mask;
                }
                ShiftOp::Shr => {
                    cf = v & 1 != 0;
                    v >>= 1;
                }
                ShiftOp::Sar => {
                    cf = v & 1 != 0;
                    v = (v >> 1) | (v & sign);
                }
            }
        }

        let msb = v & sign != 0;
        let overflow = match kind {
            ShiftOp::Rol | ShiftOp::Rcl | ShiftOp::Shl => msb != cf,
            ShiftOp::Ror | ShiftOp::Rcr => msb != (v & (sign >> 1) != 0),
            ShiftOp::Shr => original & sign != 0,
            ShiftOp::Sar => false,
        };
        let flags = &mut self.cpu.regs.flags;
        flags.set_carry(cf);
        flags.set_overflow(overflow);
        match kind {
            ShiftOp::Shl | ShiftOp::Shr | ShiftOp::Sar => {
                flags.set_adjust(false);
                flags.set_result_flags(v, size);
            }
            _ => {}
        }
        self.write(&op.params.dst, size, v);
    }

    /// executes one iteration of a string instruction, repeating by jumping back to it
    fn string_op(&mut self, op: &Instruction) -> Step {
        if op.repeat != RepeatMode::None && self.cpu.get_r16(R::CX) == 0 {
            return Step::Next;
        }

        let size = match op.command {
            Op::Movsb | Op::Cmpsb | Op::Scasb | Op::Lodsb | Op::Stosb => OperandSize::_8bit,
            _ => OperandSize::_16bit,
        };
        let step = if size == OperandSize::_8bit { 1 } else { 2 };
        let delta: u16 = if self.cpu.regs.flags.direction() {
            0u16.wrapping_sub(step)
        } else {
            step
        };
        let src_seg = self.cpu.segment(op.segment_prefix);
        let es = self.cpu.get_r16(R::ES);
        let si = self.cpu.get_r16(R::SI);
        let di = self.cpu.get_r16(R::DI);

        let read = |mmu: &MMU, seg: u16, off: u16| match size {
            OperandSize::_8bit => u16::from(mmu.read_u8(seg, off)),
            OperandSize::_16bit => mmu.read_u16(seg, off),
        };

        match op.command {
            Op::Movsb | Op::Movsw => {
                // ES:DI ← seg:SI
                let data = read(&self.mmu, src_seg, si);
                self.write_string(es, di, size, data);
                self.cpu.set_r16(R::SI, si.wrapping_add(delta));
                self.cpu.set_r16(R::DI, di.wrapping_add(delta));
            }
            Op::Cmpsb | Op::Cmpsw => {
                // compare seg:SI with ES:DI
                let src = read(&self.mmu, src_seg, si);
                let dst = read(&self.mmu, es, di);
                self.cpu.regs.flags.update_sub(src, dst, size);
                self.cpu.set_r16(R::SI, si.wrapping_add(delta));
                self.cpu.set_r16(R::DI, di.wrapping_add(delta));
            }
            Op::Scasb | Op::Scasw => {
                // compare AL/AX with ES:DI
                let acc = self.cpu.get_r16(R::AX) & size.mask();
                let dst = read(&self.mmu, es, di);
                self.cpu.regs.flags.update_sub(acc, dst, size);
                self.cpu.set_r16(R::DI, di.wrapping_add(delta));
            }
            Op::Lodsb | Op::Lodsw => {
                let data = read(&self.mmu, src_seg, si);
                match size {
                    OperandSize::_8bit => self.cpu.set_r8(R::AL, data as u8),
                    OperandSize::_16bit => self.cpu.set_r16(R::AX, data),
                }
                self.cpu.set_r16(R::SI, si.wrapping_add(delta));
            }
            _ => {
                // stos: ES:DI ← AL/AX
                let data = self.cpu.get_r16(R::AX);
                self.write_string(es, di, size, data);
                self.cpu.set_r16(R::DI, di.wrapping_add(delta));
            }
        }

        if op.repeat == RepeatMode::None {
            return Step::Next;
        }
        let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
        self.cpu.set_r16(R::CX, cx);
        if cx == 0 {
            return Step::Next;
        }
        if op.command.is_compare_string_op() {
            let zf = self.cpu.regs.flags.zero();
            match op.repeat {
                RepeatMode::Repne if zf => return Step::Next,
                RepeatMode::Rep | RepeatMode::Repe if !zf => return Step::Next,
                _ => {}
            }
        }
        Step::Jump(self.cpu.regs.ip.wrapping_sub(u16::from(op.length)))
    }

    fn write_string(&mut self, seg: u16, off: u16, size: OperandSize, data: u16) {
        match size {
            OperandSize::_8bit => self.mmu.write_u8(seg, off, data as u8),
            OperandSize::_16bit => self.mmu.write_u16(seg, off, data),
        }
    }
}
