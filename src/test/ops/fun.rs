use super::*;

extern "C" fn seven() -> Value {
    7.0
}

extern "C" fn halve(v: Value) -> Value {
    v / 2.0
}

extern "C" fn wsum(a: Value, b: Value, c: Value, d: Value) -> Value {
    a + 2.0 * b + 3.0 * c + 4.0 * d
}

#[test]
fn nullary() {
    let mut rpn = Rpn::new();
    rpn.push_fun(Callback::F0(seven), 0);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 7.0);
}

#[test]
fn unary() {
    let mut rpn = Rpn::new();
    rpn.push_val(9.0);
    rpn.push_fun(Callback::F1(halve), 1);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 4.5);
}

#[test]
fn argument_order_is_left_to_right() {
    let mut rpn = Rpn::new();
    rpn.push_val(1.0);
    rpn.push_val(2.0);
    rpn.push_val(3.0);
    rpn.push_val(4.0);
    rpn.push_fun(Callback::F4(wsum), 4);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 1.0 + 4.0 + 9.0 + 16.0);
}

#[test]
fn function_result_feeds_operator() {
    // seven() * halve(4) == 14
    let mut rpn = Rpn::new();
    rpn.push_fun(Callback::F0(seven), 0);
    rpn.push_val(4.0);
    rpn.push_fun(Callback::F1(halve), 1);
    rpn.push_bin(Op::Mul);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 14.0);
}
