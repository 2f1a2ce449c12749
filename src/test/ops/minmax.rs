use super::*;

#[test]
fn min() {
    binop_evals!(Op::Min, 1.0, 2.0 => 1.0);
    binop_evals!(Op::Min, -1.0, -2.0 => -2.0);
}

#[test]
fn max() {
    binop_evals!(Op::Max, 1.0, 2.0 => 2.0);
    binop_evals!(Op::Max, -1.0, -2.0 => -1.0);
}
