use num_derive::{FromPrimitive, ToPrimitive};

/// General purpose registers.
///
/// The numeric value is the hardware encoding; registers 8 and up require
/// a REX prefix and are only available in 64-bit mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum Gp {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gp {
    #[inline]
    pub fn num(self) -> u8 {
        self as u8
    }

    /// Low three bits that go into a ModR/M or SIB field.
    #[inline]
    pub fn low3(self) -> u8 {
        self.num() & 7
    }

    /// True if addressing this register as a base requires a SIB byte
    /// even when no index is present.
    #[inline]
    pub fn needs_sib(self) -> bool {
        self.low3() == 4
    }

    /// True if addressing this register as a base with mod 00 would be
    /// misread as a displacement-only form.
    #[inline]
    pub fn needs_disp(self) -> bool {
        self.low3() == 5
    }
}

/// SSE registers used for scalar float operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
    Xmm4 = 4,
    Xmm5 = 5,
    Xmm6 = 6,
    Xmm7 = 7,
    Xmm8 = 8,
    Xmm9 = 9,
    Xmm10 = 10,
    Xmm11 = 11,
    Xmm12 = 12,
    Xmm13 = 13,
    Xmm14 = 14,
    Xmm15 = 15,
}

impl Xmm {
    #[inline]
    pub fn num(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn low3(self) -> u8 {
        self.num() & 7
    }
}

/// Condition codes as used in the low nibble of `Jcc` opcodes.
///
/// Only the unsigned conditions are listed since `comiss`/`ucomiss` set
/// the flags like an unsigned compare.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum Cond {
    /// Below (CF=1).
    B = 2,
    /// Above or equal (CF=0).
    Ae = 3,
    /// Equal (ZF=1).
    E = 4,
    /// Not equal (ZF=0).
    Ne = 5,
    /// Below or equal (CF=1 or ZF=1).
    Be = 6,
    /// Above (CF=0 and ZF=0).
    A = 7,
}

impl Cond {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}
