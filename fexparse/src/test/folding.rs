use super::*;

use fex::Op;

/// Parses the expression and returns the opcodes of the finalized
/// program.
fn rpn_ops(expr: &str) -> Vec<Op> {
    let mut parser = Parser::new();
    parser.set_expr(expr);
    parser.eval().unwrap();
    parser
        .program()
        .unwrap()
        .tokens()
        .iter()
        .map(|t| t.op)
        .collect()
}

#[test]
fn constant_expression_folds_to_single_value() {
    assert_eq!(rpn_ops("1+2*3"), vec![Op::Val(7.0), Op::End]);
    assert_eq!(rpn_ops("(1+2)*3"), vec![Op::Val(9.0), Op::End]);
    assert_eq!(rpn_ops("2^2^3"), vec![Op::Val(256.0), Op::End]);
    assert_eq!(rpn_ops("sqrt(16)+min(1,2)"), vec![Op::Val(5.0), Op::End]);
    assert_eq!(rpn_ops("-3"), vec![Op::Val(-3.0), Op::End]);
}

#[test]
fn variables_taint_their_subexpression() {
    let mut a: f32 = 1.0;
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();

    parser.set_expr("a+1");
    parser.eval().unwrap();
    let ops: Vec<Op> = parser
        .program()
        .unwrap()
        .tokens()
        .iter()
        .map(|t| t.op)
        .collect();
    assert!(ops.len() > 2, "tainted expression must not fold");
    assert!(ops.contains(&Op::Add));
}

#[test]
fn constant_subexpressions_still_fold() {
    let mut a: f32 = 1.0;
    let mut parser = Parser::new();
    parser.define_var("a", &mut a).unwrap();

    // 2*3 folds even though the sum is tainted
    parser.set_expr("a + 2*3");
    parser.eval().unwrap();
    let ops: Vec<Op> = parser
        .program()
        .unwrap()
        .tokens()
        .iter()
        .map(|t| t.op)
        .collect();
    assert_eq!(ops, vec![Op::Var(&mut a), Op::Val(6.0), Op::Add, Op::End]);
}

#[test]
fn non_optimizable_function_is_never_folded() {
    extern "C" fn tick() -> f32 {
        4.0
    }

    let mut parser = Parser::new();
    parser
        .define_fun("tick", fex::Callback::F0(tick), false)
        .unwrap();
    parser.set_expr("tick() + 1");
    assert_eq!(parser.eval().unwrap(), 5.0);

    let has_fun = parser.program().unwrap().tokens().iter().any(|t| match t.op {
        Op::Fun { .. } => true,
        _ => false,
    });
    assert!(has_fun);
}

#[test]
fn optimizable_function_folds_with_constant_arguments() {
    assert_eq!(rpn_ops("min(4, 1+1)"), vec![Op::Val(2.0), Op::End]);
    assert_eq!(rpn_ops("exp(0)*3"), vec![Op::Val(3.0), Op::End]);
}

#[test]
fn conditionals_are_never_folded() {
    let ops = rpn_ops("1 ? 2 : 3");
    assert!(ops.iter().any(|op| match op {
        Op::If(_) => true,
        _ => false,
    }));
}

#[test]
fn folding_is_deterministic() {
    assert_eq!(rpn_ops("1/3*sqrt(2)"), rpn_ops("1/3*sqrt(2)"));
}
