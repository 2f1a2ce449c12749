use std::fmt;

use crate::Value;

/// Highest argument count a user callback may take.
pub const MAX_ARITY: usize = 10;

pub type Fun0 = extern "C" fn() -> Value;
pub type Fun1 = extern "C" fn(Value) -> Value;
pub type Fun2 = extern "C" fn(Value, Value) -> Value;
pub type Fun3 = extern "C" fn(Value, Value, Value) -> Value;
pub type Fun4 = extern "C" fn(Value, Value, Value, Value) -> Value;
pub type Fun5 = extern "C" fn(Value, Value, Value, Value, Value) -> Value;
pub type Fun6 = extern "C" fn(Value, Value, Value, Value, Value, Value) -> Value;
pub type Fun7 = extern "C" fn(Value, Value, Value, Value, Value, Value, Value) -> Value;
pub type Fun8 = extern "C" fn(Value, Value, Value, Value, Value, Value, Value, Value) -> Value;
pub type Fun9 =
    extern "C" fn(Value, Value, Value, Value, Value, Value, Value, Value, Value) -> Value;
pub type Fun10 =
    extern "C" fn(Value, Value, Value, Value, Value, Value, Value, Value, Value, Value) -> Value;

/// A user supplied scalar function of fixed arity.
///
/// The variants wrap plain `extern "C"` function pointers so the same
/// callback can be invoked from the bytecode interpreter and called
/// directly from machine code emitted by the expression compiler.
#[derive(Clone, Copy)]
pub enum Callback {
    F0(Fun0),
    F1(Fun1),
    F2(Fun2),
    F3(Fun3),
    F4(Fun4),
    F5(Fun5),
    F6(Fun6),
    F7(Fun7),
    F8(Fun8),
    F9(Fun9),
    F10(Fun10),
}

impl Callback {
    pub fn arity(&self) -> usize {
        match *self {
            Callback::F0(_) => 0,
            Callback::F1(_) => 1,
            Callback::F2(_) => 2,
            Callback::F3(_) => 3,
            Callback::F4(_) => 4,
            Callback::F5(_) => 5,
            Callback::F6(_) => 6,
            Callback::F7(_) => 7,
            Callback::F8(_) => 8,
            Callback::F9(_) => 9,
            Callback::F10(_) => 10,
        }
    }

    /// Address of the wrapped function, for emitting native calls.
    pub fn addr(&self) -> usize {
        match *self {
            Callback::F0(f) => f as usize,
            Callback::F1(f) => f as usize,
            Callback::F2(f) => f as usize,
            Callback::F3(f) => f as usize,
            Callback::F4(f) => f as usize,
            Callback::F5(f) => f as usize,
            Callback::F6(f) => f as usize,
            Callback::F7(f) => f as usize,
            Callback::F8(f) => f as usize,
            Callback::F9(f) => f as usize,
            Callback::F10(f) => f as usize,
        }
    }

    /// Calls the wrapped function with `args` in left-to-right order.
    ///
    /// `args` must match the arity exactly.
    pub fn invoke(&self, args: &[Value]) -> Value {
        debug_assert_eq!(args.len(), self.arity());

        let a = args;
        match *self {
            Callback::F0(f) => f(),
            Callback::F1(f) => f(a[0]),
            Callback::F2(f) => f(a[0], a[1]),
            Callback::F3(f) => f(a[0], a[1], a[2]),
            Callback::F4(f) => f(a[0], a[1], a[2], a[3]),
            Callback::F5(f) => f(a[0], a[1], a[2], a[3], a[4]),
            Callback::F6(f) => f(a[0], a[1], a[2], a[3], a[4], a[5]),
            Callback::F7(f) => f(a[0], a[1], a[2], a[3], a[4], a[5], a[6]),
            Callback::F8(f) => f(a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]),
            Callback::F9(f) => f(a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8]),
            Callback::F10(f) => f(a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8], a[9]),
        }
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Callback) -> bool {
        self.arity() == other.arity() && self.addr() == other.addr()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Callback::F{}({:#x})", self.arity(), self.addr())
    }
}
