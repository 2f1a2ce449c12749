use std::error::Error as StdError;
use std::fmt;

/// Errors raised while assembling or relocating code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AsmError {
    /// An 8-bit displacement could not represent the distance between a
    /// short jump and its bound label.
    ShortJumpOutOfRange { site: usize, disp: i64 },
    /// A 32-bit relocation target is out of range and no trampoline slot
    /// was reserved for it.
    RelocOutOfRange { site: usize },
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AsmError::ShortJumpOutOfRange { site, disp } => write!(
                f,
                "short jump at offset {} out of range (displacement {})",
                site, disp
            ),
            AsmError::RelocOutOfRange { site } => {
                write!(f, "relocation at offset {} out of range", site)
            }
        }
    }
}

impl StdError for AsmError {}

/// Errors raised by the executable memory broker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemError {
    /// `mmap` failed with the contained errno.
    Map(i32),
    /// `mprotect` failed with the contained errno.
    Protect(i32),
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemError::Map(errno) => write!(f, "mapping executable memory failed (errno {})", errno),
            MemError::Protect(errno) => {
                write!(f, "changing page protection failed (errno {})", errno)
            }
        }
    }
}

impl StdError for MemError {}

/// Error type of the expression compiler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JitError {
    Asm(AsmError),
    Memory(MemError),
    /// The token stream violated an invariant the compiler relies on.
    Internal(&'static str),
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            JitError::Asm(ref err) => write!(f, "{}", err),
            JitError::Memory(ref err) => write!(f, "{}", err),
            JitError::Internal(what) => write!(f, "internal compiler error: {}", what),
        }
    }
}

impl StdError for JitError {}

impl From<AsmError> for JitError {
    fn from(err: AsmError) -> JitError {
        JitError::Asm(err)
    }
}

impl From<MemError> for JitError {
    fn from(err: MemError) -> JitError {
        JitError::Memory(err)
    }
}
