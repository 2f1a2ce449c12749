use super::*;

use fex::{Callback, Value};

extern "C" fn mean(a: Value, b: Value) -> Value {
    (a + b) / 2.0
}

extern "C" fn fmod(a: Value, b: Value) -> Value {
    a - (a / b).trunc() * b
}

extern "C" fn not(v: Value) -> Value {
    if v == 0.0 {
        1.0
    } else {
        0.0
    }
}

extern "C" fn milli(v: Value) -> Value {
    v / 1000.0
}

extern "C" fn kilo(v: Value) -> Value {
    v * 1000.0
}

#[test]
fn user_functions_of_various_arities() {
    extern "C" fn three() -> Value {
        3.0
    }
    extern "C" fn double(v: Value) -> Value {
        2.0 * v
    }
    extern "C" fn sum3(a: Value, b: Value, c: Value) -> Value {
        a + b + c
    }

    let mut parser = Parser::new();
    parser.define_fun("three", Callback::F0(three), true).unwrap();
    parser.define_fun("double", Callback::F1(double), true).unwrap();
    parser.define_fun("sum3", Callback::F3(sum3), true).unwrap();

    parser.set_expr("sum3(three(), double(2), 1)");
    assert_eq!(parser.eval().unwrap(), 8.0);
}

#[test]
fn user_binary_operator() {
    let mut parser = Parser::new();
    parser.define_oprt("~", mean, 5, Assoc::Left).unwrap();

    parser.set_expr("2 ~ 4");
    assert_eq!(parser.eval().unwrap(), 3.0);

    // same precedence as addition, applied left to right
    parser.set_expr("2 ~ 4 + 2");
    assert_eq!(parser.eval().unwrap(), 5.0);
}

#[test]
fn word_named_binary_operator() {
    extern "C" fn add(a: Value, b: Value) -> Value {
        a + b
    }

    let mut parser = Parser::new();
    parser.define_oprt("add", add, 5, Assoc::Left).unwrap();

    parser.set_expr("1 add 2 * 3");
    assert_eq!(parser.eval().unwrap(), 7.0);
}

#[test]
fn truncated_modulo_as_user_operator() {
    let mut parser = Parser::new();
    parser.define_oprt("%", fmod, 6, Assoc::Left).unwrap();

    parser.set_expr("7 % 2");
    assert_eq!(parser.eval().unwrap(), 1.0);
}

#[test]
fn user_infix_operator() {
    let mut parser = Parser::new();
    parser.define_infix_oprt("!", not, 6).unwrap();

    parser.set_expr("!1");
    assert_eq!(parser.eval().unwrap(), 0.0);
    parser.set_expr("!0 + 1");
    assert_eq!(parser.eval().unwrap(), 2.0);
}

#[test]
fn user_postfix_operators() {
    let mut parser = Parser::new();
    parser.define_postfix_oprt("{m}", milli).unwrap();
    parser.define_postfix_oprt("{k}", kilo).unwrap();

    parser.set_expr("4{m}");
    assert_eq!(parser.eval().unwrap(), 4.0 / 1000.0);

    // the extracted operator run swallows the following '+'
    parser.set_expr("3{k}+5");
    assert_eq!(parser.eval().unwrap(), 3005.0);
}

#[test]
fn postfix_binds_to_the_preceding_value() {
    let mut parser = Parser::new();
    parser.define_postfix_oprt("{k}", kilo).unwrap();

    parser.set_expr("2+1{k}");
    assert_eq!(parser.eval().unwrap(), 1002.0);
}

#[test]
fn custom_value_recognizer() {
    // '#'-prefixed hex bytes, as a color channel notation
    fn is_channel_val(input: &str, _fmt: &crate::NumFormat) -> Option<(usize, f32)> {
        let rest = input.strip_prefix('#')?;
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_hexdigit()).len();
        if digits == 0 {
            return None;
        }
        u32::from_str_radix(&rest[..digits], 16)
            .ok()
            .map(|v| (1 + digits, v as f32))
    }

    let mut parser = Parser::new();
    parser.add_val_ident(is_channel_val);
    parser.set_expr("#FF - #0F");
    assert_eq!(parser.eval().unwrap(), 240.0);
}

#[test]
fn variable_factory_creates_cells_on_demand() {
    let mut parser = Parser::new();
    parser.set_var_factory(|_name| Box::into_raw(Box::new(7.0f32)));

    parser.set_expr("x + y");
    assert_eq!(parser.eval().unwrap(), 14.0);

    // the created cells are now ordinary variables
    assert!(parser.get_var().contains_key("x"));
    assert!(parser.get_var().contains_key("y"));
}

#[test]
fn get_used_var_reports_only_referenced_variables() {
    let (mut a, mut b, mut c): (Value, Value, Value) = (1.0, 2.0, 3.0);
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();
    parser.define_var("b", &mut b).unwrap();
    parser.define_var("c", &mut c).unwrap();

    parser.set_expr("a + b*2");
    let used = parser.get_used_var().unwrap();
    assert_eq!(used.len(), 2);
    assert!(used.contains_key("a"));
    assert!(used.contains_key("b"));
    assert!(!used.contains_key("c"));
}

#[test]
fn get_used_var_collects_undefined_names() {
    let mut parser = Parser::new();
    parser.set_expr("q * 2");
    let used = parser.get_used_var().unwrap();
    assert!(used.contains_key("q"));
    assert!(used["q"].is_null());
}

#[test]
fn introspection_accessors() {
    let mut value: Value = 0.0;
    let mut parser = Parser::new();
    parser.define_var("v", &mut value).unwrap();

    assert!(parser.get_var().contains_key("v"));
    assert!(parser.get_const().contains_key("_pi"));
    assert!(parser.get_fun_def().contains_key("min"));
    assert_eq!(parser.get_expr(), "");
    assert!(!Parser::get_version().is_empty());
}

#[test]
fn redefining_a_variable_rebinds_it() {
    let (mut a, mut b): (Value, Value) = (1.0, 5.0);
    let mut parser = Parser::new();
    parser.define_var("n", &mut a).unwrap();
    parser.set_expr("n * 2");
    assert_eq!(parser.eval().unwrap(), 2.0);

    parser.remove_var("n");
    parser.define_var("n", &mut b).unwrap();
    assert_eq!(parser.eval().unwrap(), 10.0);
}

#[test]
fn clearing_tables_invalidates_expressions() {
    let mut parser = Parser::new();
    parser.set_expr("min(1, 2)");
    assert_eq!(parser.eval().unwrap(), 1.0);

    parser.clear_fun();
    assert_eq!(parser.eval().unwrap_err().code, ErrorCode::UnassignableToken);
}
