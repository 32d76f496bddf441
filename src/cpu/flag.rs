use std::fmt;

use crate::cpu::OperandSize;

#[cfg(test)]
#[path = "./flag_test.rs"]
mod flag_test;

pub const FLAG_CF: u16 = 0x0001;
pub const FLAG_PF: u16 = 0x0004;
pub const FLAG_AF: u16 = 0x0010;
pub const FLAG_ZF: u16 = 0x0040;
pub const FLAG_SF: u16 = 0x0080;
pub const FLAG_TF: u16 = 0x0100;
pub const FLAG_IF: u16 = 0x0200;
pub const FLAG_DF: u16 = 0x0400;
pub const FLAG_OF: u16 = 0x0800;

/// bits that software can change on a 8086
pub const FLAG_MUTABLE: u16 = FLAG_CF | FLAG_PF | FLAG_AF | FLAG_ZF | FLAG_SF | FLAG_TF | FLAG_IF | FLAG_DF | FLAG_OF;

/// bit 1 and bits 12-15 always read as 1 on a 8086
pub const FLAG_FIXED: u16 = 0xF002;

static PARITY_LOOKUP: [u16; 256] = [
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF
];

/// https://en.wikipedia.org/wiki/FLAGS_register
///
/// ____ O DIT SZ_A _P_C
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Flags {
    val: u16,
}

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (FLAG_OF, "OF"), (FLAG_DF, "DF"), (FLAG_IF, "IF"), (FLAG_TF, "TF"),
            (FLAG_SF, "SF"), (FLAG_ZF, "ZF"), (FLAG_AF, "AF"), (FLAG_PF, "PF"), (FLAG_CF, "CF"),
        ];
        let set: Vec<&str> = names.iter().filter(|(m, _)| self.val & m != 0).map(|(_, n)| *n).collect();
        write!(f, "[{}]", set.join(" "))
    }
}

impl Flags {
    pub fn new() -> Self {
        Flags { val: FLAG_FIXED }
    }

    pub fn new_from_u16(val: u16) -> Self {
        let mut f = Flags::new();
        f.set_u16(val);
        f
    }

    /// returns the FLAGS register
    pub fn u16(&self) -> u16 {
        self.val
    }

    /// loads the FLAGS register. reserved bits keep their fixed values
    pub fn set_u16(&mut self, val: u16) {
        self.val = (val & FLAG_MUTABLE) | FLAG_FIXED;
    }

    fn get(&self, mask: u16) -> bool {
        self.val & mask != 0
    }

    fn set(&mut self, mask: u16, b: bool) {
        if b {
            self.val |= mask;
        } else {
            self.val &= !mask;
        }
    }

    pub fn carry(&self) -> bool { self.get(FLAG_CF) }
    pub fn parity(&self) -> bool { self.get(FLAG_PF) }
    pub fn adjust(&self) -> bool { self.get(FLAG_AF) }
    pub fn zero(&self) -> bool { self.get(FLAG_ZF) }
    pub fn sign(&self) -> bool { self.get(FLAG_SF) }
    pub fn trap(&self) -> bool { self.get(FLAG_TF) }
    pub fn interrupt(&self) -> bool { self.get(FLAG_IF) }
    pub fn direction(&self) -> bool { self.get(FLAG_DF) }
    pub fn overflow(&self) -> bool { self.get(FLAG_OF) }

    pub fn set_carry(&mut self, b: bool) { self.set(FLAG_CF, b) }
    pub fn set_adjust(&mut self, b: bool) { self.set(FLAG_AF, b) }
    pub fn set_zero(&mut self, b: bool) { self.set(FLAG_ZF, b) }
    pub fn set_sign(&mut self, b: bool) { self.set(FLAG_SF, b) }
    pub fn set_trap(&mut self, b: bool) { self.set(FLAG_TF, b) }
    pub fn set_interrupt(&mut self, b: bool) { self.set(FLAG_IF, b) }
    pub fn set_direction(&mut self, b: bool) { self.set(FLAG_DF, b) }
    pub fn set_overflow(&mut self, b: bool) { self.set(FLAG_OF, b) }

    pub fn carry_val(&self) -> u16 {
        self.val & FLAG_CF
    }

    /// Set if the least-significant byte of the result contains an
    /// even number of 1 bits; cleared otherwise.
    pub fn set_parity(&mut self, v: u16) {
        self.val = (self.val & !FLAG_PF) | PARITY_LOOKUP[(v & 0xFF) as usize];
    }

    /// sets sign, zero and parity according to the result `res` of width `size`
    pub fn set_result_flags(&mut self, res: u16, size: OperandSize) {
        let res = res & size.mask();
        self.set_zero(res == 0);
        self.set_sign(res & size.sign_bit() != 0);
        self.set_parity(res);
    }

    fn set_arith(&mut self, res: u32, dst: u16, src: u16, size: OperandSize, carry: bool, overflow: bool) -> u16 {
        let out = (res as u16) & size.mask();
        self.set_carry(carry);
        self.set_overflow(overflow);
        // carry or borrow out of bit 3
        self.set_adjust((res ^ u32::from(dst) ^ u32::from(src)) & 0x10 != 0);
        self.set_result_flags(out, size);
        out
    }

    pub fn update_add(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        self.add_with_carry(dst, src, 0, size)
    }

    pub fn update_adc(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        let cf = u32::from(self.carry_val());
        self.add_with_carry(dst, src, cf, size)
    }

    fn add_with_carry(&mut self, dst: u16, src: u16, cf: u32, size: OperandSize) -> u16 {
        let (dst, src) = (dst & size.mask(), src & size.mask());
        let res = u32::from(dst) + u32::from(src) + cf;
        let sign = u32::from(size.sign_bit());
        let carry = res > u32::from(size.mask());
        let overflow = (res ^ u32::from(dst)) & (res ^ u32::from(src)) & sign != 0;
        self.set_arith(res, dst, src, size, carry, overflow)
    }

    pub fn update_sub(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        self.sub_with_borrow(dst, src, 0, size)
    }

    pub fn update_sbb(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        let cf = u32::from(self.carry_val());
        self.sub_with_borrow(dst, src, cf, size)
    }

    fn sub_with_borrow(&mut self, dst: u16, src: u16, cf: u32, size: OperandSize) -> u16 {
        let (dst, src) = (dst & size.mask(), src & size.mask());
        let res = u32::from(dst).wrapping_sub(u32::from(src)).wrapping_sub(cf);
        let sign = u32::from(size.sign_bit());
        let carry = u32::from(dst) < u32::from(src) + cf;
        let overflow = (u32::from(dst) ^ u32::from(src)) & (u32::from(dst) ^ res) & sign != 0;
        self.set_arith(res, dst, src, size, carry, overflow)
    }

    /// logic operations clear CF, OF and AF
    fn logic(&mut self, res: u16, size: OperandSize) -> u16 {
        let res = res & size.mask();
        self.set_carry(false);
        self.set_overflow(false);
        self.set_adjust(false);
        self.set_result_flags(res, size);
        res
    }

    pub fn update_and(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        self.logic(dst & src, size)
    }

    pub fn update_or(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        self.logic(dst | src, size)
    }

    pub fn update_xor(&mut self, dst: u16, src: u16, size: OperandSize) -> u16 {
        self.logic(dst ^ src, size)
    }

    /// INC leaves CF untouched
    pub fn update_inc(&mut self, dst: u16, size: OperandSize) -> u16 {
        let cf = self.carry();
        let res = self.update_add(dst, 1, size);
        self.set_carry(cf);
        res
    }

    /// DEC leaves CF untouched
    pub fn update_dec(&mut self, dst: u16, size: OperandSize) -> u16 {
        let cf = self.carry();
        let res = self.update_sub(dst, 1, size);
        self.set_carry(cf);
        res
    }

    /// NEG sets CF unless the operand was zero
    pub fn update_neg(&mut self, dst: u16, size: OperandSize) -> u16 {
        self.update_sub(0, dst, size)
    }
}
