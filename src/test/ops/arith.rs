use super::*;

#[test]
fn add() {
    binop_evals!(Op::Add, 262.5, -82.25 => 180.25);
}

#[test]
fn sub() {
    binop_evals!(Op::Sub, 10.0, 4.5 => 5.5);
}

#[test]
fn mul() {
    binop_evals!(Op::Mul, -3.0, 2.5 => -7.5);
}

#[test]
fn div() {
    binop_evals!(Op::Div, 7.0, 2.0 => 3.5);
}

#[test]
fn div_by_zero_follows_ieee() {
    binop_evals!(Op::Div, 1.0, 0.0 => std::f32::INFINITY);
    binop_evals!(Op::Div, -1.0, 0.0 => std::f32::NEG_INFINITY);
}
