//! Math expression front end for the [fex](../fex/index.html) bytecode
//! and the [fexjit](../fexjit/index.html) native back end.
//!
//! The central type is [`Parser`](struct.Parser.html): it owns the symbol
//! tables, tokenizes and parses an infix expression into a reverse polish
//! program, folds constant subexpressions, and evaluates the program
//! either through the bytecode interpreter ([`eval`](struct.Parser.html#method.eval))
//! or as native code ([`compile`](struct.Parser.html#method.compile)).
//!
//! ```no_run
//! use fexparse::Parser;
//!
//! let mut a = 1.0f32;
//! let mut parser = Parser::new();
//! parser.define_var("a", &mut a).unwrap();
//! parser.set_expr("(1 + 2 * a)");
//! assert_eq!(parser.eval().unwrap(), 3.0);
//! ```
//!
//! # Expression Language
//!
//! ## Built in binary operators
//!
//!  Symbol | Meaning | Precedence | Associativity
//! --------|---------------------------|---|------
//! `||`    | logical or                | 1 | left
//! `&&`    | logical and               | 2 | left
//! `<=` `>=` `!=` `==` `<` `>` | comparison | 4 | left
//! `<?` `>?` | minimum, maximum        | 4 | left
//! `+` `-` | addition, subtraction     | 5 | left
//! `*` `/` | multiplication, division  | 6 | left
//! `^`     | power                     | 7 | right
//!
//! The ternary conditional `cond ? a : b` binds loosest of all and nests
//! to the right. Parentheses group, and the argument separator (`,` by
//! default) separates function arguments; at the top level it chains
//! sub-expressions of which the last one's value is returned.
//!
//! ## Built in functions
//!
//! `sin`, `cos`, `tan`, `abs` and `sqrt` compile to dedicated bytecodes.
//! The remaining functions are preinstalled callbacks: `asin`, `acos`,
//! `atan`, `sinh`, `cosh`, `tanh`, `asinh`, `acosh`, `atanh`, `log2`,
//! `log10`, `log`, `ln`, `exp`, `sign`, `rint`, `min` and `max`. The
//! constants `_pi` and `_e` are predefined.
//!
//! ## Literals
//!
//! Decimal floats use the locale controlled decimal separator and may
//! carry an exponent (`1.25e-3`) and optional thousands separators.
//! Hexadecimal integers use a `0x` prefix. Additional literal syntaxes
//! can be plugged in with
//! [`add_val_ident`](struct.Parser.html#method.add_val_ident).
//!
//! ## User extensions
//!
//! Variables bind to host owned `f32` cells and are reread on every
//! evaluation. Functions take 0 to 10 scalar arguments. Binary, prefix
//! and postfix operators are callbacks with a configurable precedence.
//! All names are checked against configurable character sets.

mod builtin;
mod error;
mod lexer;
mod parser;
mod symbols;
mod token;
mod values;

pub use crate::error::{ErrorCode, ParseError, Result};
pub use crate::lexer::LexConfig;
pub use crate::parser::Parser;
pub use crate::symbols::{Assoc, FunEntry, OprtEntry};
pub use crate::values::{is_dec_val, is_hex_val, NumFormat, ValIdent};
