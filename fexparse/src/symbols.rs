use std::collections::HashMap;

use fex::{Callback, Value};

/// Operator associativity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Assoc {
    Left,
    Right,
}

/// A registered function.
#[derive(Clone, Debug)]
pub struct FunEntry {
    pub name: String,
    pub fun: Callback,
    /// Allows the parser to evaluate calls with constant arguments at
    /// parse time.
    pub optimizable: bool,
}

/// A registered binary, infix or postfix operator.
#[derive(Clone, Debug)]
pub struct OprtEntry {
    pub name: String,
    pub fun: Callback,
    pub prec: i32,
    pub assoc: Assoc,
    pub optimizable: bool,
}

/// The symbol tables owned by one parser instance.
///
/// Variable cells are owned by the host; the tables only store the
/// pointers handed in through the definition calls.
#[derive(Default)]
pub struct SymbolTables {
    pub vars: HashMap<String, *mut Value>,
    pub consts: HashMap<String, Value>,
    pub funs: HashMap<String, FunEntry>,
    pub oprts: HashMap<String, OprtEntry>,
    pub infix_oprts: HashMap<String, OprtEntry>,
    pub postfix_oprts: HashMap<String, OprtEntry>,
}

impl SymbolTables {
    pub fn new() -> SymbolTables {
        SymbolTables::default()
    }
}
