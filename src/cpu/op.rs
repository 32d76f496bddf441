use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// ASCII Adjust After Addition
    Aaa,

    /// ASCII Adjust AX Before Division
    Aad,

    /// ASCII Adjust AX After Multiply
    Aam,

    /// ASCII Adjust AL After Subtraction
    Aas,

    Adc8, Adc16,
    Add8, Add16,
    And8, And16,
    CallNear, CallFar,

    /// Convert Byte to Word
    Cbw,

    /// Clear Carry Flag
    Clc,

    /// Clear Direction Flag
    Cld,

    /// Clear Interrupt Flag
    Cli,

    /// Complement Carry Flag
    Cmc,

    Cmp8, Cmp16,

    /// Compare String Operands
    Cmpsb, Cmpsw,

    /// Convert Word to Doubleword
    Cwd,

    /// Decimal Adjust AL after Addition
    Daa,

    /// Decimal Adjust AL after Subtraction
    Das,

    Dec8, Dec16,
    Div8, Div16,
    Hlt,
    Idiv8, Idiv16,
    Imul8, Imul16,

    /// Input from Port
    In8, In16,

    Inc8, Inc16,
    Int,
    Into,
    Iret,

    /// Jump if above (CF=0 and ZF=0).    (alias: jnbe)
    Ja,

    /// Jump if carry (CF=1).    (alias: jb, jnae)
    Jc,

    /// Jump if CX register is 0.
    Jcxz,

    /// Jump if greater (ZF=0 and SF=OF).    (alias: jnle)
    Jg,

    /// Jump if less (SF ≠ OF).    (alias: jnge)
    Jl,

    JmpShort, JmpNear, JmpFar,

    /// Jump if not above (CF=1 or ZF=1).    (alias: jbe)
    Jna,

    /// Jump if not carry (CF=0).    (alias: jae, jnb)
    Jnc,

    /// Jump if not greater (ZF=1 or SF ≠ OF).    (alias: jle)
    Jng,

    /// Jump if not less (SF=OF).    (alias: jge)
    Jnl,

    /// Jump if not overflow (OF=0).
    Jno,

    /// Jump if not sign (SF=0).
    Jns,

    /// Jump if not zero (ZF=0).    (alias: jne)
    Jnz,

    /// Jump if overflow (OF=1).
    Jo,

    /// Jump short if parity even (PF=1)
    Jpe,

    /// Jump short if parity odd (PF=0).
    Jpo,

    /// Jump if sign (SF=1).
    Js,

    /// Jump if zero (ZF ← 1).    (alias: je)
    Jz,

    /// Load Status Flags into AH Register
    Lahf,

    /// Load DS:r16 with far pointer from memory.
    Lds,

    /// Load Effective Address
    Lea16,

    /// Load ES:r16 with far pointer from memory.
    Les,

    /// Load byte at address DS:SI into AL.
    Lodsb,

    /// Load word at address DS:SI into AX.
    Lodsw,

    /// Decrement CX; jump short if CX ≠ 0.
    Loop,

    /// Decrement CX; jump short if CX ≠ 0 and ZF = 1.
    Loope,

    /// Decrement CX; jump short if CX ≠ 0 and ZF = 0.
    Loopne,

    Mov8, Mov16,
    Movsb, Movsw,
    Mul8, Mul16,
    Neg8, Neg16,
    Nop,
    Not8, Not16,
    Or8, Or16,
    Out8, Out16,
    Pop16,

    /// Pop top of stack into FLAGS.
    Popf,

    Push16,

    /// push 16 bit FLAGS register onto stack
    Pushf,

    /// Rotate 9 bits (CF, r/m8) left
    Rcl8,
    /// Rotate 17 bits (CF, r/m16) left
    Rcl16,
    Rcr8, Rcr16,

    /// Near return, with optional imm16 bytes to release
    Retn,

    /// Far return, with optional imm16 bytes to release
    Retf,

    Rol8, Rol16,
    Ror8, Ror16,

    /// Store AH into Flags
    Sahf,

    /// "salc", or "setalc" is a undocumented Intel instruction
    /// http://ref.x86asm.net/coder32.html#gen_note_u_SALC_D6
    Salc,

    Sar8, Sar16,

    /// Integer Subtraction with Borrow
    Sbb8, Sbb16,

    Scasb, Scasw,

    /// Multiply `dst` by 2, `src` times (alias sal)
    Shl8, Shl16,

    Shr8, Shr16,

    // Set Carry Flag
    Stc,

    /// Set Direction Flag
    Std,

    /// Set Interrupt Flag
    Sti,

    Stosb, Stosw,
    Sub8, Sub16,
    Test8, Test16,

    /// Wait for the co-processor
    Wait,

    /// Exchange Register/Memory with Register
    Xchg8, Xchg16,

    Xlatb,

    Xor8, Xor16,

    /// Initial state
    Uninitialized,

    /// Invalid or unhandled encoding
    Invalid(Vec<u8>, Invalid),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::Invalid(bytes, _) => {
                let x: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                write!(f, "INVALID {}", x.join(", "))
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Op {
    pub fn is_valid(&self) -> bool {
        match *self {
            Op::Uninitialized | Op::Invalid(_, _) => false,
            _ => true,
        }
    }

    /// string instructions, which may carry a REP prefix
    pub fn is_string_op(&self) -> bool {
        match *self {
            Op::Movsb | Op::Movsw | Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw |
            Op::Lodsb | Op::Lodsw | Op::Stosb | Op::Stosw => true,
            _ => false,
        }
    }

    /// string instructions that stop a REPE / REPNE loop on the zero flag
    pub fn is_compare_string_op(&self) -> bool {
        match *self {
            Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw => true,
            _ => false,
        }
    }
}

/// the class of instruction decode error that occured
#[derive(Clone, Debug, PartialEq)]
pub enum Invalid {
    /// a reg value was unhandled / invalid
    Reg(u8),

    /// unimplemented / invalid CPU instr
    Op,
}
