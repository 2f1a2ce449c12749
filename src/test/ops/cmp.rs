use super::*;

#[test]
fn lt() {
    binop_evals!(Op::Lt, 1.0, 2.0 => 1.0);
    binop_evals!(Op::Lt, 2.0, 1.0 => 0.0);
    binop_evals!(Op::Lt, 2.0, 2.0 => 0.0);
}

#[test]
fn le() {
    binop_evals!(Op::Le, 1.0, 2.0 => 1.0);
    binop_evals!(Op::Le, 2.0, 2.0 => 1.0);
    binop_evals!(Op::Le, 3.0, 2.0 => 0.0);
}

#[test]
fn gt() {
    binop_evals!(Op::Gt, 2.0, 1.0 => 1.0);
    binop_evals!(Op::Gt, 1.0, 2.0 => 0.0);
}

#[test]
fn ge() {
    binop_evals!(Op::Ge, 2.0, 2.0 => 1.0);
    binop_evals!(Op::Ge, 1.0, 2.0 => 0.0);
}

#[test]
fn eq() {
    binop_evals!(Op::Eq, 2.0, 2.0 => 1.0);
    binop_evals!(Op::Eq, 2.0, -2.0 => 0.0);
}

#[test]
fn ne() {
    binop_evals!(Op::Ne, 2.0, -2.0 => 1.0);
    binop_evals!(Op::Ne, 2.0, 2.0 => 0.0);
}
