use std::collections::HashMap;

use fex::{Op, Value};

use crate::error::{ErrorCode, ParseError, Result};
use crate::symbols::SymbolTables;
use crate::token::{ParseTok, TokKind};
use crate::values::{NumFormat, ValIdent};

/// Prohibition bits restricting which token class may come next.
pub mod flags {
    pub const NO_OPEN: u16 = 1 << 0;
    pub const NO_CLOSE: u16 = 1 << 1;
    pub const NO_VAL: u16 = 1 << 2;
    pub const NO_VAR: u16 = 1 << 3;
    pub const NO_ARG_SEP: u16 = 1 << 4;
    pub const NO_FUN: u16 = 1 << 5;
    pub const NO_OPRT: u16 = 1 << 6;
    pub const NO_POSTFIX: u16 = 1 << 7;
    pub const NO_INFIX: u16 = 1 << 8;
    pub const NO_END: u16 = 1 << 9;
    pub const NO_IF: u16 = 1 << 10;
    pub const NO_ELSE: u16 = 1 << 11;
    pub const NO_ANY: u16 = 0xFFF;
}

use self::flags::*;

/// Built in operator symbols, multi-character entries first so the
/// longest match wins.
const BUILTIN_OPRT: &[(&str, Op)] = &[
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("!=", Op::Ne),
    ("==", Op::Eq),
    ("<?", Op::Min),
    (">?", Op::Max),
    ("&&", Op::And),
    ("||", Op::Or),
    ("<", Op::Lt),
    (">", Op::Gt),
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("/", Op::Div),
];

/// Names of the intrinsic functions, indexable by opcode.
const INTRINSIC_FUN: &[(&str, Op)] = &[
    ("sin", Op::Sin),
    ("cos", Op::Cos),
    ("tan", Op::Tan),
    ("abs", Op::Abs),
    ("sqrt", Op::Sqrt),
];

/// Fallback cell bound to undefined variables while collecting the
/// used-variable list.
static UNDEF_CELL: Value = 0.0;

/// True if `name` is one of the built in operator or grouping symbols.
pub fn is_builtin_symbol(name: &str) -> bool {
    BUILTIN_OPRT.iter().any(|&(sym, _)| sym == name)
        || name == "("
        || name == ")"
        || name == "?"
        || name == ":"
}

/// Runtime configurable lexer settings.
#[derive(Clone)]
pub struct LexConfig {
    /// Characters usable in value, variable and function identifiers.
    pub name_chars: String,
    /// Characters usable in binary and postfix operator identifiers.
    pub oprt_chars: String,
    /// Characters usable in infix operator identifiers.
    pub infix_chars: String,
    pub fmt: NumFormat,
    pub arg_sep: char,
    pub val_idents: Vec<ValIdent>,
}

impl Default for LexConfig {
    fn default() -> LexConfig {
        LexConfig {
            name_chars: "0123456789_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ"
                .to_owned(),
            oprt_chars: "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+-*^/?<>=#!$%&|~'_{}"
                .to_owned(),
            infix_chars: "/+-*^?<>=#!$%&|~'_".to_owned(),
            fmt: NumFormat::default(),
            arg_sep: ',',
            val_idents: vec![crate::values::is_hex_val, crate::values::is_dec_val],
        }
    }
}

/// The token reader: one classified token per call, with a syntax flag
/// mask restricting what may come next and parenthesis balancing.
pub struct TokenReader<'a> {
    expr: &'a str,
    pos: usize,
    syn_flags: u16,
    brackets: i32,
    last_was_fun: bool,
    tables: &'a SymbolTables,
    config: &'a LexConfig,
    factory: Option<&'a mut dyn FnMut(&str) -> *mut Value>,
    ignore_undef: bool,
    /// Variables actually referenced so far, in encounter order.
    pub used_vars: HashMap<String, *mut Value>,
    /// Variables created by the factory during this run.
    pub new_vars: Vec<(String, *mut Value)>,
}

impl<'a> TokenReader<'a> {
    pub fn new(
        expr: &'a str,
        tables: &'a SymbolTables,
        config: &'a LexConfig,
        factory: Option<&'a mut dyn FnMut(&str) -> *mut Value>,
        ignore_undef: bool,
    ) -> TokenReader<'a> {
        TokenReader {
            expr,
            pos: 0,
            syn_flags: NO_OPRT | NO_CLOSE | NO_POSTFIX | NO_IF,
            brackets: 0,
            last_was_fun: false,
            tables,
            config,
            factory,
            ignore_undef,
            used_vars: HashMap::new(),
            new_vars: Vec::new(),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.expr[self.pos..]
    }

    /// Longest run of characters from `set` starting at the cursor.
    fn extract(&self, set: &str) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !set.contains(c))
            .map(|(i, _)| i)
            .unwrap_or_else(|| rest.len());
        &rest[..end]
    }

    fn err(&self, code: ErrorCode, pos: usize, token: &str) -> ParseError {
        ParseError::at(code, pos, token)
    }

    /// Reads and classifies the next token.
    pub fn next_token(&mut self) -> Result<ParseTok> {
        while self.rest().starts_with(' ') {
            self.pos += 1;
        }

        let tok = if let Some(t) = self.is_eof()? {
            t
        } else if let Some(t) = self.is_user_oprt()? {
            t
        } else {
            self.classify_rest()?
        };

        self.last_was_fun = match tok.kind {
            TokKind::Fun(_) | TokKind::Intrinsic(_) => true,
            _ => false,
        };

        Ok(tok)
    }

    fn classify_rest(&mut self) -> Result<ParseTok> {
        if let Some(t) = self.is_intrinsic_fun()? {
            return Ok(t);
        }
        if let Some(t) = self.is_fun()? {
            return Ok(t);
        }
        if let Some(t) = self.is_builtin()? {
            return Ok(t);
        }
        if let Some(t) = self.is_arg_sep()? {
            return Ok(t);
        }
        if let Some(t) = self.is_val()? {
            return Ok(t);
        }
        if let Some(t) = self.is_var()? {
            return Ok(t);
        }
        if let Some(t) = self.is_infix_oprt()? {
            return Ok(t);
        }
        if let Some(t) = self.is_postfix_oprt()? {
            return Ok(t);
        }
        if self.ignore_undef || self.factory.is_some() {
            if let Some(t) = self.is_undef_var()? {
                return Ok(t);
            }
        }

        let name = self.extract(&self.config.name_chars);
        let text = if name.is_empty() { self.rest() } else { name };
        Err(self.err(ErrorCode::UnassignableToken, self.pos, text))
    }

    fn is_eof(&mut self) -> Result<Option<ParseTok>> {
        if !self.rest().is_empty() {
            return Ok(None);
        }
        if self.syn_flags & NO_END != 0 {
            return Err(self.err(ErrorCode::UnexpectedEof, self.pos, ""));
        }
        if self.brackets > 0 {
            return Err(self.err(ErrorCode::MissingParens, self.pos, ")"));
        }
        self.syn_flags = 0;
        Ok(Some(ParseTok::new(TokKind::End, self.pos, "")))
    }

    /// User defined binary operators; may turn into an infix operator
    /// when a binary operator cannot appear here.
    fn is_user_oprt(&mut self) -> Result<Option<ParseTok>> {
        let run = self.extract(&self.config.oprt_chars);
        if run.is_empty() {
            return Ok(None);
        }

        // Built in symbols are handled later with their own rules.
        if BUILTIN_OPRT.iter().any(|&(sym, _)| sym == run) {
            return Ok(None);
        }

        let mut names: Vec<&String> = self.tables.oprts.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        for name in names {
            if self.rest().starts_with(name.as_str()) {
                if self.syn_flags & NO_OPRT != 0 {
                    // Maybe it is an infix operator; both kinds can
                    // share characters in their identifiers.
                    if let Some(t) = self.is_infix_oprt()? {
                        return Ok(Some(t));
                    }
                    return Err(self.err(ErrorCode::UnexpectedOperator, self.pos, name));
                }

                let pos = self.pos;
                self.pos += name.len();
                self.syn_flags = NO_CLOSE | NO_OPRT | NO_ARG_SEP | NO_POSTFIX | NO_END | NO_IF;
                let entry = self.tables.oprts[name.as_str()].clone();
                return Ok(Some(ParseTok::new(TokKind::UserOprt(entry), pos, name)));
            }
        }

        Ok(None)
    }

    /// sin/cos/tan/abs/sqrt immediately followed by `(`.
    fn is_intrinsic_fun(&mut self) -> Result<Option<ParseTok>> {
        let name = self.extract(&self.config.name_chars);
        if name.is_empty() {
            return Ok(None);
        }

        let op = match INTRINSIC_FUN.iter().find(|&&(n, _)| n == name) {
            Some(&(_, op)) => op,
            None => return Ok(None),
        };

        if !self.rest()[name.len()..].starts_with('(') {
            return Ok(None);
        }

        if self.syn_flags & NO_FUN != 0 {
            return Err(self.err(ErrorCode::UnexpectedFun, self.pos, name));
        }

        let pos = self.pos;
        self.pos += name.len();
        self.syn_flags = NO_ANY ^ NO_OPEN;
        Ok(Some(ParseTok::new(TokKind::Intrinsic(op), pos, name)))
    }

    fn is_fun(&mut self) -> Result<Option<ParseTok>> {
        let name = self.extract(&self.config.name_chars);
        if name.is_empty() {
            return Ok(None);
        }

        let entry = match self.tables.funs.get(name) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        if self.syn_flags & NO_FUN != 0 {
            return Err(self.err(ErrorCode::UnexpectedFun, self.pos, name));
        }

        let pos = self.pos;
        self.pos += name.len();
        self.syn_flags = NO_ANY ^ NO_OPEN;
        Ok(Some(ParseTok::new(TokKind::Fun(entry), pos, name)))
    }

    fn is_builtin(&mut self) -> Result<Option<ParseTok>> {
        for &(sym, op) in BUILTIN_OPRT {
            if self.rest().starts_with(sym) {
                if self.syn_flags & NO_OPRT != 0 {
                    // "-" and "+" double as infix operators.
                    if let Some(t) = self.is_infix_oprt()? {
                        return Ok(Some(t));
                    }
                    return Err(self.err(ErrorCode::UnexpectedOperator, self.pos, sym));
                }

                let pos = self.pos;
                self.pos += sym.len();
                self.syn_flags =
                    NO_CLOSE | NO_OPRT | NO_ARG_SEP | NO_POSTFIX | NO_END | NO_IF | NO_ELSE;
                return Ok(Some(ParseTok::new(TokKind::BinOprt(op), pos, sym)));
            }
        }

        let c = match self.rest().chars().next() {
            Some(c) => c,
            None => return Ok(None),
        };
        let pos = self.pos;

        match c {
            '(' => {
                if self.syn_flags & NO_OPEN != 0 {
                    return Err(self.err(ErrorCode::UnexpectedParens, pos, "("));
                }
                self.syn_flags = NO_OPRT | NO_END | NO_ARG_SEP | NO_POSTFIX | NO_IF | NO_ELSE;
                if !self.last_was_fun {
                    // "()" is only meaningful after a function name
                    self.syn_flags |= NO_CLOSE;
                }
                self.brackets += 1;
                self.pos += 1;
                Ok(Some(ParseTok::new(TokKind::Open, pos, "(")))
            }
            ')' => {
                if self.syn_flags & NO_CLOSE != 0 {
                    return Err(self.err(ErrorCode::UnexpectedParens, pos, ")"));
                }
                self.brackets -= 1;
                if self.brackets < 0 {
                    return Err(self.err(ErrorCode::UnexpectedParens, pos, ")"));
                }
                self.syn_flags = NO_OPEN | NO_VAR | NO_VAL | NO_FUN | NO_INFIX;
                self.pos += 1;
                Ok(Some(ParseTok::new(TokKind::Close, pos, ")")))
            }
            '?' => {
                if self.syn_flags & NO_IF != 0 {
                    return Err(self.err(ErrorCode::UnexpectedConditional, pos, "?"));
                }
                self.syn_flags = NO_CLOSE | NO_POSTFIX | NO_END | NO_OPRT | NO_IF | NO_ELSE;
                self.pos += 1;
                Ok(Some(ParseTok::new(TokKind::IfCond, pos, "?")))
            }
            ':' => {
                if self.syn_flags & NO_ELSE != 0 {
                    return Err(self.err(ErrorCode::MisplacedColon, pos, ":"));
                }
                self.syn_flags = NO_CLOSE | NO_POSTFIX | NO_END | NO_OPRT | NO_IF | NO_ELSE;
                self.pos += 1;
                Ok(Some(ParseTok::new(TokKind::ElseSep, pos, ":")))
            }
            _ => Ok(None),
        }
    }

    fn is_arg_sep(&mut self) -> Result<Option<ParseTok>> {
        if !self.rest().starts_with(self.config.arg_sep) {
            return Ok(None);
        }
        let pos = self.pos;
        let text = self.config.arg_sep.to_string();

        if self.syn_flags & NO_ARG_SEP != 0 {
            return Err(self.err(ErrorCode::UnexpectedArgSep, pos, &text));
        }

        self.syn_flags = NO_CLOSE | NO_OPRT | NO_END | NO_ARG_SEP | NO_POSTFIX | NO_IF;
        self.pos += self.config.arg_sep.len_utf8();
        Ok(Some(ParseTok::new(TokKind::ArgSep, pos, &text)))
    }

    fn is_val(&mut self) -> Result<Option<ParseTok>> {
        // user defined constants
        let name = self.extract(&self.config.name_chars);
        if !name.is_empty() {
            if let Some(&value) = self.tables.consts.get(name) {
                if self.syn_flags & NO_VAL != 0 {
                    return Err(self.err(ErrorCode::UnexpectedVal, self.pos, name));
                }
                let pos = self.pos;
                self.pos += name.len();
                self.syn_flags = NO_VAL | NO_VAR | NO_FUN | NO_OPEN | NO_INFIX;
                return Ok(Some(ParseTok::new(TokKind::Val(value), pos, name)));
            }
        }

        // value recognizers, in registration order
        for ident in &self.config.val_idents {
            if let Some((consumed, value)) = ident(self.rest(), &self.config.fmt) {
                let pos = self.pos;
                let text = &self.rest()[..consumed];
                if self.syn_flags & NO_VAL != 0 {
                    return Err(self.err(ErrorCode::UnexpectedVal, pos, text));
                }
                let tok = ParseTok::new(TokKind::Val(value), pos, text);
                self.pos += consumed;
                self.syn_flags = NO_VAL | NO_VAR | NO_FUN | NO_OPEN | NO_INFIX;
                return Ok(Some(tok));
            }
        }

        Ok(None)
    }

    fn is_var(&mut self) -> Result<Option<ParseTok>> {
        let name = self.extract(&self.config.name_chars);
        if name.is_empty() {
            return Ok(None);
        }

        let cell = match self.tables.vars.get(name) {
            Some(&cell) => cell,
            None => match self.new_vars.iter().find(|(n, _)| n == name) {
                Some(&(_, cell)) => cell,
                None => return Ok(None),
            },
        };

        if self.syn_flags & NO_VAR != 0 {
            return Err(self.err(ErrorCode::UnexpectedVar, self.pos, name));
        }

        let pos = self.pos;
        self.pos += name.len();
        self.used_vars.insert(name.to_owned(), cell);
        self.syn_flags = NO_VAL | NO_VAR | NO_FUN | NO_OPEN | NO_INFIX;
        Ok(Some(ParseTok::new(TokKind::Var(cell), pos, name)))
    }

    fn is_infix_oprt(&mut self) -> Result<Option<ParseTok>> {
        let run = self.extract(&self.config.infix_chars);
        if run.is_empty() {
            return Ok(None);
        }

        let mut names: Vec<&String> = self.tables.infix_oprts.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        for name in names {
            if run.starts_with(name.as_str()) {
                if self.syn_flags & NO_INFIX != 0 {
                    return Err(self.err(ErrorCode::UnexpectedOperator, self.pos, name));
                }
                let pos = self.pos;
                self.pos += name.len();
                self.syn_flags = NO_POSTFIX | NO_INFIX | NO_OPRT | NO_CLOSE | NO_IF;
                let entry = self.tables.infix_oprts[name.as_str()].clone();
                return Ok(Some(ParseTok::new(TokKind::InfixOprt(entry), pos, name)));
            }
        }

        Ok(None)
    }

    fn is_postfix_oprt(&mut self) -> Result<Option<ParseTok>> {
        // Operators directly follow a value, so the extracted run may
        // contain trailing binary operator characters ("3m+5").
        let run = self.extract(&self.config.oprt_chars);
        if run.is_empty() {
            return Ok(None);
        }

        let mut names: Vec<&String> = self.tables.postfix_oprts.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        for name in names {
            if run.starts_with(name.as_str()) {
                if self.syn_flags & NO_POSTFIX != 0 {
                    return Err(self.err(ErrorCode::UnexpectedOperator, self.pos, name));
                }
                let pos = self.pos;
                self.pos += name.len();
                self.syn_flags = NO_VAL | NO_VAR | NO_FUN | NO_OPEN | NO_POSTFIX;
                let entry = self.tables.postfix_oprts[name.as_str()].clone();
                return Ok(Some(ParseTok::new(TokKind::PostfixOprt(entry), pos, name)));
            }
        }

        Ok(None)
    }

    fn is_undef_var(&mut self) -> Result<Option<ParseTok>> {
        let name = self.extract(&self.config.name_chars);
        if name.is_empty() {
            return Ok(None);
        }

        if self.syn_flags & NO_VAR != 0 {
            return Err(self.err(ErrorCode::UnexpectedVar, self.pos, name));
        }

        let pos = self.pos;
        let name = name.to_owned();
        self.pos += name.len();

        let cell = if let Some(factory) = self.factory.as_mut() {
            let cell = factory(&name);
            if cell.is_null() {
                return Err(self.err(ErrorCode::InvalidVarPtr, pos, &name));
            }
            self.new_vars.push((name.clone(), cell));
            self.used_vars.insert(name.clone(), cell);
            cell
        } else {
            // Collection mode: bind a dummy cell and record the name.
            self.used_vars.insert(name.clone(), std::ptr::null_mut());
            &UNDEF_CELL as *const Value as *mut Value
        };

        self.syn_flags = NO_VAL | NO_VAR | NO_FUN | NO_OPEN | NO_POSTFIX | NO_INFIX;
        Ok(Some(ParseTok::new(TokKind::Var(cell), pos, &name)))
    }
}
