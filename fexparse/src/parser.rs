use std::collections::HashMap;

use log::debug;
use matches::debug_assert_matches;

use fex::{Callback, Op, Program, Rpn, Value, Vm};
use fexjit::CompiledExpr;

use crate::builtin;
use crate::error::{ErrorCode, ParseError, Result};
use crate::lexer::{LexConfig, TokenReader};
use crate::symbols::{Assoc, FunEntry, OprtEntry, SymbolTables};
use crate::token::TokKind;
use crate::values::{NumFormat, ValIdent};

/// Precedence of the built in binary operator symbols.
fn builtin_prec(op: Op) -> i32 {
    match op {
        Op::Or => 1,
        Op::And => 2,
        Op::Le | Op::Ge | Op::Ne | Op::Eq | Op::Lt | Op::Gt | Op::Min | Op::Max => 4,
        Op::Add | Op::Sub => 5,
        Op::Mul | Op::Div => 6,
        _ => unreachable!(),
    }
}

fn eval_builtin_bin(op: Op, a: Value, b: Value) -> Value {
    let t = |c: bool| if c { 1.0 } else { 0.0 };
    match op {
        Op::Min => a.min(b),
        Op::Max => a.max(b),
        Op::Le => t(a <= b),
        Op::Ge => t(a >= b),
        Op::Ne => t(a != b),
        Op::Eq => t(a == b),
        Op::Lt => t(a < b),
        Op::Gt => t(a > b),
        Op::And => t(a != 0.0 && b != 0.0),
        Op::Or => t(a != 0.0 || b != 0.0),
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => a / b,
        _ => unreachable!(),
    }
}

fn intrinsic_name(op: Op) -> &'static str {
    match op {
        Op::Sin => "sin",
        Op::Cos => "cos",
        Op::Tan => "tan",
        Op::Abs => "abs",
        Op::Sqrt => "sqrt",
        _ => unreachable!(),
    }
}

fn eval_intrinsic(op: Op, v: Value) -> Value {
    match op {
        Op::Sin => v.sin(),
        Op::Cos => v.cos(),
        Op::Tan => v.tan(),
        Op::Abs => v.abs(),
        Op::Sqrt => v.sqrt(),
        _ => unreachable!(),
    }
}

/// Entry of the parse-time value stack: the (possibly preliminary) value
/// of a finalized subexpression plus its volatility taint.
#[derive(Clone, Copy)]
struct ValEntry {
    value: Value,
    volatile: bool,
}

/// Entry of the operator stack.
#[derive(Debug)]
enum StackOp {
    Bin(Op, usize),
    UserBin(OprtEntry, usize),
    Infix(OprtEntry, usize),
    Intrinsic(Op, usize),
    Fun(FunEntry, usize),
    Open(usize),
    If(usize),
    Else(usize),
}

/// Result of one parse run.
struct ParseOutcome {
    program: Program,
    used_vars: HashMap<String, *mut Value>,
    new_vars: Vec<(String, *mut Value)>,
}

/// Working state of the shunting-yard conversion.
struct Shunt {
    rpn: Rpn,
    vals: Vec<ValEntry>,
    ops: Vec<StackOp>,
    argcs: Vec<u32>,
    if_else: i32,
}

impl Shunt {
    fn new() -> Shunt {
        Shunt {
            rpn: Rpn::new(),
            vals: Vec::new(),
            ops: Vec::new(),
            argcs: Vec::new(),
            if_else: 0,
        }
    }

    fn internal(what: &'static str) -> ParseError {
        debug!("parser invariant violated: {}", what);
        ParseError::new(ErrorCode::InternalError)
    }

    fn pop_val(&mut self) -> Result<ValEntry> {
        self.vals
            .pop()
            .ok_or_else(|| Self::internal("value stack underflow"))
    }

    /// Applies a unary or binary callback operator or function with
    /// `argc` arguments from the value stack, folding the call when every
    /// argument is constant and the callback allows it.
    fn apply_call(
        &mut self,
        fun: &Callback,
        name: &str,
        pos: usize,
        argc: usize,
        optimizable: bool,
        check_arity: bool,
    ) -> Result<()> {
        let arity = fun.arity();
        if check_arity && argc > arity {
            return Err(ParseError::at(ErrorCode::TooManyParams, pos, name));
        }
        if check_arity && argc < arity {
            return Err(ParseError::at(ErrorCode::TooFewParams, pos, name));
        }

        let mut args = [0.0; fex::callback::MAX_ARITY];
        let mut volatile = false;
        for i in (0..argc).rev() {
            let entry = self.pop_val()?;
            args[i] = entry.value;
            volatile |= entry.volatile;
        }

        if !volatile && optimizable {
            let value = fun.invoke(&args[..argc]);
            self.rpn.pop_val_entries(argc);
            self.rpn.push_val(value);
            self.vals.push(ValEntry {
                value,
                volatile: false,
            });
        } else {
            self.rpn.push_fun(*fun, argc as u8);
            self.vals.push(ValEntry {
                value: 0.0,
                volatile: true,
            });
        }

        Ok(())
    }

    /// Applies an intrinsic function call gathered behind a parenthesis.
    fn apply_intrinsic(&mut self, op: Op, name: &str, pos: usize, argc: usize) -> Result<()> {
        if argc > 1 {
            return Err(ParseError::at(ErrorCode::TooManyParams, pos, name));
        }
        if argc < 1 {
            return Err(ParseError::at(ErrorCode::TooFewParams, pos, name));
        }

        let arg = self.pop_val()?;
        let value = eval_intrinsic(op, arg.value);

        if !arg.volatile {
            self.rpn.pop_val_entries(1);
            self.rpn.push_val(value);
        } else {
            self.rpn.push_intrinsic(op);
        }
        self.vals.push(ValEntry {
            value,
            volatile: arg.volatile,
        });

        Ok(())
    }

    /// Applies the topmost operator of the operator stack.
    fn apply_top(&mut self) -> Result<()> {
        match self.ops.pop() {
            Some(StackOp::Bin(op, _)) => {
                let b = self.pop_val()?;
                let a = self.pop_val()?;
                let volatile = a.volatile || b.volatile;
                let value = eval_builtin_bin(op, a.value, b.value);

                if !volatile {
                    self.rpn.pop_val_entries(2);
                    self.rpn.push_val(value);
                } else {
                    self.rpn.push_bin(op);
                }
                self.vals.push(ValEntry { value, volatile });
                Ok(())
            }
            Some(StackOp::UserBin(entry, pos)) => self.apply_call(
                &entry.fun,
                &entry.name,
                pos,
                2,
                entry.optimizable,
                false,
            ),
            Some(StackOp::Infix(entry, pos)) => self.apply_call(
                &entry.fun,
                &entry.name,
                pos,
                1,
                entry.optimizable,
                false,
            ),
            _ => Err(Self::internal("operator stack underflow")),
        }
    }

    /// Applies stacked operators down to the next parenthesis or
    /// conditional marker.
    fn apply_remaining(&mut self) -> Result<()> {
        loop {
            match self.ops.last() {
                None
                | Some(StackOp::Open(_))
                | Some(StackOp::If(_))
                | Some(StackOp::Else(_)) => return Ok(()),
                _ => self.apply_top()?,
            }
        }
    }

    /// Resolves pending `? :` pairs whose else branch is complete.
    ///
    /// The branch selection is performed on the parse-time value stack
    /// too, but its outcome is always tainted volatile so conditionals
    /// are never folded out of the token stream.
    fn apply_if_else(&mut self) -> Result<()> {
        while let Some(StackOp::Else(_)) = self.ops.last() {
            let else_op = self.ops.pop().unwrap();
            let v_else = self.pop_val()?;

            if let Some(StackOp::If(_)) = self.ops.last() {
                self.ops.pop();
                let v_then = self.pop_val()?;
                let v_cond = self.pop_val()?;

                self.vals.push(ValEntry {
                    value: if v_cond.value != 0.0 {
                        v_then.value
                    } else {
                        v_else.value
                    },
                    volatile: true,
                });
                self.rpn.push_branch(Op::EndIf);
            } else {
                // a nested pair is still open; resolve it first, then
                // put this branch back
                self.apply_if_else()?;
                if !matches!(self.ops.last(), Some(StackOp::If(_))) {
                    return Err(Self::internal("unmatched conditional branch"));
                }
                self.vals.push(v_else);
                self.ops.push(else_op);
            }
        }

        Ok(())
    }
}

/// A math expression parser with user definable variables, constants,
/// functions and operators.
///
/// The expression string is tokenized and converted to a reverse polish
/// program on the first evaluation; the program is cached until the
/// expression or one of the symbol tables changes.
pub struct Parser {
    expr: String,
    symbols: SymbolTables,
    config: LexConfig,
    var_factory: Option<Box<dyn FnMut(&str) -> *mut Value>>,
    program: Option<Program>,
    used_vars: HashMap<String, *mut Value>,
    vm: Vm,
    parse_count: u32,
}

impl Parser {
    /// Creates a parser with the default functions, constants and
    /// operators installed.
    pub fn new() -> Parser {
        let mut symbols = SymbolTables::new();
        builtin::install(&mut symbols);

        Parser {
            expr: String::new(),
            symbols,
            config: LexConfig::default(),
            var_factory: None,
            program: None,
            used_vars: HashMap::new(),
            vm: Vm::new(),
            parse_count: 0,
        }
    }

    // ------------------------------------------------------------------
    // definitions

    fn check_name(name: &str, charset: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name.chars().all(|c| charset.contains(c))
            && !name.starts_with(|c: char| c.is_ascii_digit());
        if valid {
            Ok(())
        } else {
            Err(ParseError::at(ErrorCode::InvalidName, 0, name))
        }
    }

    fn check_oprt_name(name: &str, charset: &str) -> Result<()> {
        let valid = !name.is_empty() && name.chars().all(|c| charset.contains(c));
        if valid {
            Ok(())
        } else {
            Err(ParseError::at(ErrorCode::InvalidName, 0, name))
        }
    }

    /// Binds `name` to an externally owned value cell. The cell must stay
    /// valid for as long as this parser (or any compiled expression
    /// produced from it) can read it.
    pub fn define_var(&mut self, name: &str, cell: *mut Value) -> Result<()> {
        Self::check_name(name, &self.config.name_chars)?;
        if cell.is_null() {
            return Err(ParseError::at(ErrorCode::InvalidVarPtr, 0, name));
        }
        if self.symbols.consts.contains_key(name) || self.symbols.funs.contains_key(name) {
            return Err(ParseError::at(ErrorCode::NameConflict, 0, name));
        }

        self.symbols.vars.insert(name.to_owned(), cell);
        self.invalidate();
        Ok(())
    }

    /// Binds `name` to a constant value.
    pub fn define_const(&mut self, name: &str, value: Value) -> Result<()> {
        Self::check_name(name, &self.config.name_chars)?;
        if self.symbols.vars.contains_key(name) || self.symbols.funs.contains_key(name) {
            return Err(ParseError::at(ErrorCode::NameConflict, 0, name));
        }

        self.symbols.consts.insert(name.to_owned(), value);
        self.invalidate();
        Ok(())
    }

    /// Registers a user function of up to ten scalar arguments.
    /// Optimizable functions may be evaluated at parse time when all
    /// their arguments are constant.
    pub fn define_fun(&mut self, name: &str, fun: Callback, optimizable: bool) -> Result<()> {
        Self::check_name(name, &self.config.name_chars)?;
        if self.symbols.vars.contains_key(name) || self.symbols.consts.contains_key(name) {
            return Err(ParseError::at(ErrorCode::NameConflict, 0, name));
        }

        self.symbols.funs.insert(
            name.to_owned(),
            FunEntry {
                name: name.to_owned(),
                fun,
                optimizable,
            },
        );
        self.invalidate();
        Ok(())
    }

    /// Registers a user binary operator with a precedence from 1 (lowest)
    /// to 7 (highest).
    pub fn define_oprt(
        &mut self,
        name: &str,
        fun: fex::callback::Fun2,
        prec: i32,
        assoc: Assoc,
    ) -> Result<()> {
        Self::check_oprt_name(name, &self.config.oprt_chars)?;
        if crate::lexer::is_builtin_symbol(name) {
            return Err(ParseError::at(ErrorCode::NameConflict, 0, name));
        }
        if prec < 1 || prec > 7 {
            return Err(ParseError::at(ErrorCode::OptPri, 0, name));
        }

        self.symbols.oprts.insert(
            name.to_owned(),
            OprtEntry {
                name: name.to_owned(),
                fun: Callback::F2(fun),
                prec,
                assoc,
                optimizable: true,
            },
        );
        self.invalidate();
        Ok(())
    }

    /// Registers a user unary prefix operator.
    pub fn define_infix_oprt(
        &mut self,
        name: &str,
        fun: fex::callback::Fun1,
        prec: i32,
    ) -> Result<()> {
        Self::check_oprt_name(name, &self.config.infix_chars)?;
        if prec < 1 || prec > 7 {
            return Err(ParseError::at(ErrorCode::OptPri, 0, name));
        }

        self.symbols.infix_oprts.insert(
            name.to_owned(),
            OprtEntry {
                name: name.to_owned(),
                fun: Callback::F1(fun),
                prec,
                assoc: Assoc::Left,
                optimizable: true,
            },
        );
        self.invalidate();
        Ok(())
    }

    /// Registers a user unary postfix operator.
    pub fn define_postfix_oprt(&mut self, name: &str, fun: fex::callback::Fun1) -> Result<()> {
        Self::check_oprt_name(name, &self.config.oprt_chars)?;

        self.symbols.postfix_oprts.insert(
            name.to_owned(),
            OprtEntry {
                name: name.to_owned(),
                fun: Callback::F1(fun),
                prec: 1,
                assoc: Assoc::Left,
                optimizable: true,
            },
        );
        self.invalidate();
        Ok(())
    }

    /// Adds a custom value recognizer, consulted after the built in hex
    /// and decimal recognizers in registration order.
    pub fn add_val_ident(&mut self, ident: ValIdent) {
        self.config.val_idents.push(ident);
        self.invalidate();
    }

    /// Installs a factory creating cells for undefined variables on the
    /// fly.
    pub fn set_var_factory<F>(&mut self, factory: F)
    where
        F: FnMut(&str) -> *mut Value + 'static,
    {
        self.var_factory = Some(Box::new(factory));
        self.invalidate();
    }

    pub fn clear_var_factory(&mut self) {
        self.var_factory = None;
        self.invalidate();
    }

    // ------------------------------------------------------------------
    // locale

    /// Sets the function argument separator (default `,`).
    pub fn set_arg_sep(&mut self, sep: char) -> Result<()> {
        if sep == self.config.fmt.dec_sep || Some(sep) == self.config.fmt.thousands_sep {
            return Err(ParseError::new(ErrorCode::LocaleConflict));
        }
        self.config.arg_sep = sep;
        self.invalidate();
        Ok(())
    }

    /// Sets the decimal separator (default `.`).
    pub fn set_dec_sep(&mut self, sep: char) -> Result<()> {
        if sep == self.config.arg_sep || Some(sep) == self.config.fmt.thousands_sep {
            return Err(ParseError::new(ErrorCode::LocaleConflict));
        }
        self.config.fmt.dec_sep = sep;
        self.invalidate();
        Ok(())
    }

    /// Sets the thousands separator accepted between digit groups.
    pub fn set_thousands_sep(&mut self, sep: char) -> Result<()> {
        if sep == self.config.arg_sep || sep == self.config.fmt.dec_sep {
            return Err(ParseError::new(ErrorCode::LocaleConflict));
        }
        self.config.fmt.thousands_sep = Some(sep);
        self.invalidate();
        Ok(())
    }

    /// Restores `.` as decimal separator, `,` as argument separator and
    /// no thousands separator.
    pub fn reset_locale(&mut self) {
        self.config.fmt = NumFormat::default();
        self.config.arg_sep = ',';
        self.invalidate();
    }

    // ------------------------------------------------------------------
    // expression handling

    /// Stores the expression; parsing happens lazily on the next
    /// evaluation or compilation.
    pub fn set_expr(&mut self, expr: &str) {
        self.expr = expr.to_owned();
        self.invalidate();
    }

    /// Parses if needed and interprets the program.
    pub fn eval(&mut self) -> Result<Value> {
        self.ensure_parsed()?;
        let program = self.program.as_ref().unwrap();
        Ok(self.vm.eval(program))
    }

    /// Parses if needed and compiles the program to native code.
    /// `reg_hint` is the highest SSE register used for the evaluation
    /// stack (0..=5).
    pub fn compile(&mut self, reg_hint: u8) -> Result<CompiledExpr> {
        self.ensure_parsed()?;
        let program = self.program.as_ref().unwrap();
        fexjit::compile(program, reg_hint).map_err(|err| {
            debug!("native compilation failed: {}", err);
            ParseError::new(ErrorCode::InternalError)
        })
    }

    // ------------------------------------------------------------------
    // removal

    pub fn remove_var(&mut self, name: &str) {
        self.symbols.vars.remove(name);
        self.invalidate();
    }

    pub fn clear_var(&mut self) {
        self.symbols.vars.clear();
        self.invalidate();
    }

    pub fn clear_const(&mut self) {
        self.symbols.consts.clear();
        self.invalidate();
    }

    pub fn clear_fun(&mut self) {
        self.symbols.funs.clear();
        self.invalidate();
    }

    /// Removes all binary operators, including the predefined `^`.
    pub fn clear_oprt(&mut self) {
        self.symbols.oprts.clear();
        self.invalidate();
    }

    pub fn clear_infix_oprt(&mut self) {
        self.symbols.infix_oprts.clear();
        self.invalidate();
    }

    pub fn clear_postfix_oprt(&mut self) {
        self.symbols.postfix_oprts.clear();
        self.invalidate();
    }

    // ------------------------------------------------------------------
    // introspection

    /// Variables referenced by the current expression. Undefined names
    /// are reported with a null cell when no variable factory is set.
    pub fn get_used_var(&mut self) -> Result<&HashMap<String, *mut Value>> {
        if self.program.is_none() {
            let outcome = self.run_parse(true)?;
            self.used_vars = outcome.used_vars;
            // the program may reference placeholder cells; do not cache
        }
        Ok(&self.used_vars)
    }

    pub fn get_var(&self) -> &HashMap<String, *mut Value> {
        &self.symbols.vars
    }

    pub fn get_const(&self) -> &HashMap<String, Value> {
        &self.symbols.consts
    }

    pub fn get_fun_def(&self) -> &HashMap<String, FunEntry> {
        &self.symbols.funs
    }

    pub fn get_expr(&self) -> &str {
        &self.expr
    }

    pub fn get_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    #[cfg(test)]
    pub(crate) fn parse_count(&self) -> u32 {
        self.parse_count
    }

    #[cfg(test)]
    pub(crate) fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    // ------------------------------------------------------------------
    // internals

    fn invalidate(&mut self) {
        self.program = None;
        self.used_vars.clear();
    }

    fn ensure_parsed(&mut self) -> Result<()> {
        if self.program.is_some() {
            return Ok(());
        }

        let outcome = self.run_parse(false)?;
        for (name, cell) in &outcome.new_vars {
            self.symbols.vars.insert(name.clone(), *cell);
        }
        self.used_vars = outcome.used_vars;
        self.program = Some(outcome.program);
        self.parse_count += 1;
        Ok(())
    }

    fn run_parse(&mut self, ignore_undef: bool) -> Result<ParseOutcome> {
        let expr = self.expr.clone();
        let factory = match self.var_factory.as_mut() {
            Some(f) => Some(&mut **f as &mut dyn FnMut(&str) -> *mut Value),
            None => None,
        };

        let mut reader = TokenReader::new(&expr, &self.symbols, &self.config, factory, ignore_undef);
        let mut st = Shunt::new();
        let mut prev_was_open = false;
        let mut top_commas = 0u32;

        loop {
            let tok = reader.next_token()?;
            let is_open = matches!(tok.kind, TokKind::Open);
            let is_end = matches!(tok.kind, TokKind::End);

            match tok.kind {
                TokKind::Val(value) => {
                    st.vals.push(ValEntry {
                        value,
                        volatile: false,
                    });
                    st.rpn.push_val(value);
                }
                TokKind::Var(cell) => {
                    st.vals.push(ValEntry {
                        value: 0.0,
                        volatile: true,
                    });
                    st.rpn.push_var(cell);
                }

                TokKind::IfCond | TokKind::ElseSep => {
                    let is_if = matches!(tok.kind, TokKind::IfCond);
                    st.if_else += if is_if { 1 } else { -1 };
                    if st.if_else < 0 {
                        return Err(ParseError::at(ErrorCode::MisplacedColon, tok.pos, ":"));
                    }

                    st.apply_remaining()?;
                    if is_if {
                        st.rpn.push_branch(Op::If(0));
                        st.ops.push(StackOp::If(tok.pos));
                    } else {
                        st.rpn.push_branch(Op::Else(0));
                        st.ops.push(StackOp::Else(tok.pos));
                    }
                }

                TokKind::ArgSep => {
                    // Inside a call this counts an argument; at the top
                    // level it chains sub-expressions.
                    match st.argcs.last_mut() {
                        Some(argc) => *argc += 1,
                        None => {
                            st.apply_remaining()?;
                            st.apply_if_else()?;
                            if st.vals.len() != top_commas as usize + 1 {
                                return Err(ParseError::at(
                                    ErrorCode::UnexpectedArgSep,
                                    tok.pos,
                                    &tok.text,
                                ));
                            }
                            top_commas += 1;
                            prev_was_open = false;
                            continue;
                        }
                    }
                    st.apply_remaining()?;
                    st.apply_if_else()?;
                }

                TokKind::End => {
                    st.apply_remaining()?;
                    st.apply_if_else()?;
                }

                TokKind::Close => {
                    // "()": the opening parenthesis preset one argument
                    if prev_was_open {
                        if let Some(argc) = st.argcs.last_mut() {
                            *argc -= 1;
                        }
                    }

                    st.apply_remaining()?;
                    st.apply_if_else()?;

                    if let Some(StackOp::Open(_)) = st.ops.last() {
                        st.ops.pop();
                        let argc = st
                            .argcs
                            .pop()
                            .ok_or_else(|| Shunt::internal("argument count underflow"))?;

                        let fun_on_top = match st.ops.last() {
                            Some(StackOp::Fun(..)) | Some(StackOp::Intrinsic(..)) => true,
                            _ => false,
                        };

                        if argc > 1 && !fun_on_top {
                            return Err(ParseError::at(
                                ErrorCode::UnexpectedArg,
                                tok.pos,
                                &tok.text,
                            ));
                        }

                        if fun_on_top {
                            match st.ops.pop() {
                                Some(StackOp::Fun(entry, pos)) => {
                                    st.apply_call(
                                        &entry.fun,
                                        &entry.name,
                                        pos,
                                        argc as usize,
                                        entry.optimizable,
                                        true,
                                    )?;
                                }
                                Some(StackOp::Intrinsic(op, pos)) => {
                                    st.apply_intrinsic(op, intrinsic_name(op), pos, argc as usize)?;
                                }
                                _ => unreachable!(),
                            }
                        }
                    }
                }

                TokKind::BinOprt(..) | TokKind::UserOprt(..) => {
                    let (new_prec, new_assoc) = match &tok.kind {
                        TokKind::BinOprt(op) => (builtin_prec(*op), Assoc::Left),
                        TokKind::UserOprt(entry) => (entry.prec, entry.assoc),
                        _ => unreachable!(),
                    };

                    loop {
                        let (top_prec, same) = match st.ops.last() {
                            None
                            | Some(StackOp::Open(_))
                            | Some(StackOp::If(_))
                            | Some(StackOp::Else(_)) => break,
                            Some(StackOp::Bin(top_op, _)) => (
                                builtin_prec(*top_op),
                                matches!(&tok.kind, TokKind::BinOprt(op) if op == top_op),
                            ),
                            Some(StackOp::UserBin(top, _)) | Some(StackOp::Infix(top, _)) => (
                                top.prec,
                                matches!(&tok.kind, TokKind::UserOprt(e) if e.name == top.name),
                            ),
                            _ => return Err(Shunt::internal("function left on operator stack")),
                        };

                        // For two different operators the precedence
                        // decides alone; equal operators defer to their
                        // associativity.
                        let done = if same {
                            match new_assoc {
                                Assoc::Right => top_prec <= new_prec,
                                Assoc::Left => top_prec < new_prec,
                            }
                        } else {
                            top_prec < new_prec
                        };
                        if done {
                            break;
                        }

                        st.apply_top()?;
                    }

                    match tok.kind {
                        TokKind::BinOprt(op) => st.ops.push(StackOp::Bin(op, tok.pos)),
                        TokKind::UserOprt(entry) => st.ops.push(StackOp::UserBin(entry, tok.pos)),
                        _ => unreachable!(),
                    }
                }

                TokKind::Open => {
                    st.argcs.push(1);
                    st.ops.push(StackOp::Open(tok.pos));
                }

                TokKind::Intrinsic(op) => st.ops.push(StackOp::Intrinsic(op, tok.pos)),
                TokKind::Fun(entry) => st.ops.push(StackOp::Fun(entry, tok.pos)),
                TokKind::InfixOprt(entry) => st.ops.push(StackOp::Infix(entry, tok.pos)),

                TokKind::PostfixOprt(entry) => {
                    st.apply_call(&entry.fun, &entry.name, tok.pos, 1, entry.optimizable, false)?;
                }
            }

            if is_end {
                break;
            }
            prev_was_open = is_open;
        }

        if st.if_else > 0 {
            return Err(ParseError::new(ErrorCode::MissingElseClause));
        }
        if st.vals.is_empty() {
            return Err(ParseError::new(ErrorCode::EmptyExpression));
        }
        debug_assert_matches!(st.ops.last(), None);

        let program = st.rpn.finalize();
        if log::log_enabled!(log::Level::Debug) {
            program.dump();
        }

        Ok(ParseOutcome {
            program,
            used_vars: reader.used_vars,
            new_vars: reader.new_vars,
        })
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}
