use std::f32::consts;

use fex::{Callback, Value};

use crate::symbols::{Assoc, FunEntry, OprtEntry, SymbolTables};

/// Default precedence of infix (sign) operators: tighter than addition,
/// looser than the power operator.
pub const PREC_INFIX: i32 = 6;

/// Precedence of the built in power operator.
pub const PREC_POW: i32 = 7;

extern "C" fn asin(v: Value) -> Value {
    v.asin()
}

extern "C" fn acos(v: Value) -> Value {
    v.acos()
}

extern "C" fn atan(v: Value) -> Value {
    v.atan()
}

extern "C" fn sinh(v: Value) -> Value {
    v.sinh()
}

extern "C" fn cosh(v: Value) -> Value {
    v.cosh()
}

extern "C" fn tanh(v: Value) -> Value {
    v.tanh()
}

extern "C" fn asinh(v: Value) -> Value {
    v.asinh()
}

extern "C" fn acosh(v: Value) -> Value {
    v.acosh()
}

extern "C" fn atanh(v: Value) -> Value {
    v.atanh()
}

extern "C" fn log2(v: Value) -> Value {
    v.log2()
}

extern "C" fn log10(v: Value) -> Value {
    v.log10()
}

extern "C" fn ln(v: Value) -> Value {
    v.ln()
}

extern "C" fn exp(v: Value) -> Value {
    v.exp()
}

extern "C" fn sign(v: Value) -> Value {
    if v < 0.0 {
        -1.0
    } else if v > 0.0 {
        1.0
    } else {
        0.0
    }
}

extern "C" fn rint(v: Value) -> Value {
    (v + 0.5).floor()
}

extern "C" fn min(a: Value, b: Value) -> Value {
    if a < b {
        a
    } else {
        b
    }
}

extern "C" fn max(a: Value, b: Value) -> Value {
    if a > b {
        a
    } else {
        b
    }
}

pub extern "C" fn pow(base: Value, exponent: Value) -> Value {
    base.powf(exponent)
}

extern "C" fn unary_minus(v: Value) -> Value {
    -v
}

extern "C" fn unary_plus(v: Value) -> Value {
    v
}

fn fun(tables: &mut SymbolTables, name: &str, fun: Callback) {
    tables.funs.insert(
        name.to_owned(),
        FunEntry {
            name: name.to_owned(),
            fun,
            optimizable: true,
        },
    );
}

fn infix(tables: &mut SymbolTables, name: &str, callback: Callback) {
    tables.infix_oprts.insert(
        name.to_owned(),
        OprtEntry {
            name: name.to_owned(),
            fun: callback,
            prec: PREC_INFIX,
            assoc: Assoc::Left,
            optimizable: true,
        },
    );
}

/// Populates freshly created symbol tables with the default functions,
/// constants and operators.
pub fn install(tables: &mut SymbolTables) {
    // arcus functions
    fun(tables, "asin", Callback::F1(asin));
    fun(tables, "acos", Callback::F1(acos));
    fun(tables, "atan", Callback::F1(atan));
    // hyperbolic functions
    fun(tables, "sinh", Callback::F1(sinh));
    fun(tables, "cosh", Callback::F1(cosh));
    fun(tables, "tanh", Callback::F1(tanh));
    // arcus hyperbolic functions
    fun(tables, "asinh", Callback::F1(asinh));
    fun(tables, "acosh", Callback::F1(acosh));
    fun(tables, "atanh", Callback::F1(atanh));
    // logarithms
    fun(tables, "log2", Callback::F1(log2));
    fun(tables, "log10", Callback::F1(log10));
    fun(tables, "log", Callback::F1(ln));
    fun(tables, "ln", Callback::F1(ln));
    // misc
    fun(tables, "exp", Callback::F1(exp));
    fun(tables, "sign", Callback::F1(sign));
    fun(tables, "rint", Callback::F1(rint));
    fun(tables, "min", Callback::F2(min));
    fun(tables, "max", Callback::F2(max));

    tables.consts.insert("_pi".to_owned(), consts::PI);
    tables.consts.insert("_e".to_owned(), consts::E);

    infix(tables, "-", Callback::F1(unary_minus));
    infix(tables, "+", Callback::F1(unary_plus));

    tables.oprts.insert(
        "^".to_owned(),
        OprtEntry {
            name: "^".to_owned(),
            fun: Callback::F2(pow),
            prec: PREC_POW,
            assoc: Assoc::Right,
            optimizable: true,
        },
    );
}
