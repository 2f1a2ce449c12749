use super::*;

#[test]
fn and() {
    binop_evals!(Op::And, 1.0, 1.0 => 1.0);
    binop_evals!(Op::And, 1.0, 0.0 => 0.0);
    binop_evals!(Op::And, 0.0, 1.0 => 0.0);
    binop_evals!(Op::And, 0.0, 0.0 => 0.0);
}

#[test]
fn or() {
    binop_evals!(Op::Or, 1.0, 1.0 => 1.0);
    binop_evals!(Op::Or, 1.0, 0.0 => 1.0);
    binop_evals!(Op::Or, 0.0, 1.0 => 1.0);
    binop_evals!(Op::Or, 0.0, 0.0 => 0.0);
}

#[test]
fn nonzero_counts_as_true() {
    binop_evals!(Op::And, -3.5, 0.25 => 1.0);
    binop_evals!(Op::Or, -3.5, 0.0 => 1.0);
}
