use super::*;

#[test]
fn literals() {
    assert_eq!(eval_str("42"), 42.0);
    assert_eq!(eval_str("4.25"), 4.25);
    assert_eq!(eval_str(".5"), 0.5);
    assert_eq!(eval_str("1.25e2"), 125.0);
    assert_eq!(eval_str("2e-2"), 0.02);
    assert_eq!(eval_str("0xFF"), 255.0);
    assert_eq!(eval_str("0x10 + 1"), 17.0);
}

#[test]
fn operator_precedence() {
    assert_eq!(eval_str("1+2*3"), 7.0);
    assert_eq!(eval_str("(1+2)*3"), 9.0);
    assert_eq!(eval_str("6-4/2"), 4.0);
    assert_eq!(eval_str("2*3^2"), 18.0);
    assert_eq!(eval_str("1+1<3"), 1.0);
    assert_eq!(eval_str("1 || 0 && 0"), 1.0);
}

#[test]
fn left_associativity() {
    assert_eq!(eval_str("8/4/2"), 1.0);
    assert_eq!(eval_str("10-4-3"), 3.0);
}

#[test]
fn power_is_right_associative() {
    assert_eq!(eval_str("2^2^3"), 256.0);
    assert_eq!(eval_str("(2^2)^3"), 64.0);
}

#[test]
fn unary_signs() {
    assert_eq!(eval_str("-4+2"), -2.0);
    assert_eq!(eval_str("-(2*3)"), -6.0);
    assert_eq!(eval_str("+5"), 5.0);
    assert_eq!(eval_str("2^-1"), 0.5);
    assert_eq!(eval_str("3 * -2"), -6.0);
}

#[test]
fn min_max_operators() {
    assert_eq!(eval_str("1 <? 2"), 1.0);
    assert_eq!(eval_str("1 >? 2"), 2.0);
    assert_eq!(eval_str("1 + 2 <? 2"), 2.0);
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(eval_str("1 < 2"), 1.0);
    assert_eq!(eval_str("2 <= 2"), 1.0);
    assert_eq!(eval_str("3 != 3"), 0.0);
    assert_eq!(eval_str("3 == 3"), 1.0);
    assert_eq!(eval_str("1 && 2"), 1.0);
    assert_eq!(eval_str("1 && 0"), 0.0);
    assert_eq!(eval_str("0 || 0"), 0.0);
}

#[test]
fn ternary_conditional() {
    assert_eq!(eval_str("1 ? 10 : 20"), 10.0);
    assert_eq!(eval_str("0 ? 10 : 20"), 20.0);
    assert_eq!(eval_str("0 ? 10 : 1 ? 20 : 30"), 20.0);
    assert_eq!(eval_str("(1<2) ? 10 : 20"), 10.0);
    assert_eq!(eval_str("1 ? 0 ? 128 : 255 : 1 ? 32 : 64"), 255.0);
    assert_eq!(eval_str("(0 ? 10 : 20) + 1"), 21.0);
}

#[test]
fn intrinsic_functions() {
    assert_eq!(eval_str("sqrt(16)"), 4.0);
    assert_eq!(eval_str("abs(-2.5)"), 2.5);
    assert_eq!(eval_str("sin(0)"), 0.0);
    assert_eq!(eval_str("cos(0)"), 1.0);
    assert_eq!(eval_str("tan(0)"), 0.0);
    assert_eq!(eval_str("sqrt(sqrt(16))"), 2.0);
}

#[test]
fn builtin_functions() {
    assert_eq!(eval_str("min(3, 2)"), 2.0);
    assert_eq!(eval_str("max(3, 2)"), 3.0);
    assert_eq!(eval_str("exp(0)"), 1.0);
    assert_eq!(eval_str("log2(8)"), 3.0);
    assert_eq!(eval_str("sign(-3)"), -1.0);
    assert_eq!(eval_str("rint(2.4)"), 2.0);
    assert_eq!(eval_str("atan(tan(0.5))"), 0.5_f32.tan().atan());
}

#[test]
fn builtin_constants() {
    assert_eq!(eval_str("_pi"), std::f32::consts::PI);
    assert_eq!(eval_str("_e"), std::f32::consts::E);
    assert_eq!(eval_str("cos(_pi)"), std::f32::consts::PI.cos());
}

#[test]
fn top_level_comma_returns_last_value() {
    assert_eq!(eval_str("1, 2, 3"), 3.0);
    assert_eq!(eval_str("1+1, 2*2"), 4.0);
}

#[test]
fn variables() {
    let mut a: Value = 1.0;
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();
    parser.set_expr("(1+ 2*a)");
    assert_eq!(parser.eval().unwrap(), 3.0);
}

#[test]
fn variable_updates_are_visible() {
    let mut a: Value = 1.0;
    let cell: *mut Value = &mut a;

    let mut parser = Parser::new();
    parser.define_var("a", cell).unwrap();
    parser.set_expr("a*2");
    assert_eq!(parser.eval().unwrap(), 2.0);

    a = 21.0;
    assert_eq!(parser.eval().unwrap(), 42.0);
}

#[test]
fn scenario_logic_on_variables() {
    let (mut a, mut b): (Value, Value) = (1.0, 2.0);
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();
    parser.define_var("b", &mut b).unwrap();
    parser.set_expr("(a<b) && (b<a)");
    assert_eq!(parser.eval().unwrap(), 0.0);
}

#[test]
fn scenario_max_times_two() {
    let mut a: Value = 1.0;
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();
    parser.set_expr("max(3*a+1, 1)*2");
    assert_eq!(parser.eval().unwrap(), 8.0);
}

#[test]
fn scenario_nested_product() {
    let (mut a, mut b): (Value, Value) = (1.0, 2.0);
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();
    parser.define_var("b", &mut b).unwrap();
    parser.set_expr("(1*(2*(3*(4*(5*(6*(7*(a+b))))))))");
    assert_eq!(parser.eval().unwrap(), 15120.0);
}

#[test]
fn seven_variable_sum() {
    let mut cells: Vec<Value> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
    let names = ["a", "b", "c", "d", "e", "f", "g"];

    let mut parser = Parser::new();
    for (name, cell) in names.iter().zip(cells.iter_mut()) {
        parser.define_var(name, cell).unwrap();
    }
    parser.set_expr("a+b+c+d+e+f+g");
    assert_eq!(parser.eval().unwrap(), 28.0);
}

#[test]
fn whitespace_is_ignored() {
    assert_eq!(eval_str("  1   +    2 "), 3.0);
}

#[test]
fn empty_function_call() {
    extern "C" fn seven() -> Value {
        7.0
    }

    let mut parser = Parser::new();
    parser
        .define_fun("seven", fex::Callback::F0(seven), true)
        .unwrap();
    parser.set_expr("seven() + 1");
    assert_eq!(parser.eval().unwrap(), 8.0);
}
