use super::*;

/// Builds `cond ? a : b` as a finalized program.
fn ternary(cond: Value, a: Value, b: Value) -> Program {
    let mut rpn = Rpn::new();
    rpn.push_val(cond);
    rpn.push_branch(Op::If(0));
    rpn.push_val(a);
    rpn.push_branch(Op::Else(0));
    rpn.push_val(b);
    rpn.push_branch(Op::EndIf);
    rpn.finalize()
}

#[test]
fn then_branch() {
    assert_eq!(Vm::new().eval(&ternary(1.0, 10.0, 20.0)), 10.0);
}

#[test]
fn else_branch() {
    assert_eq!(Vm::new().eval(&ternary(0.0, 10.0, 20.0)), 20.0);
}

#[test]
fn nonzero_condition_is_true() {
    assert_eq!(Vm::new().eval(&ternary(-0.5, 10.0, 20.0)), 10.0);
}

#[test]
fn branch_feeds_operator() {
    // (0 ? 10 : 20) + 1
    let mut rpn = Rpn::new();
    rpn.push_val(0.0);
    rpn.push_branch(Op::If(0));
    rpn.push_val(10.0);
    rpn.push_branch(Op::Else(0));
    rpn.push_val(20.0);
    rpn.push_branch(Op::EndIf);
    rpn.push_val(1.0);
    rpn.push_bin(Op::Add);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 21.0);
}

#[test]
fn condition_can_be_computed() {
    // (2 < 1) ? 10 : 20
    let mut rpn = Rpn::new();
    rpn.push_val(2.0);
    rpn.push_val(1.0);
    rpn.push_bin(Op::Lt);
    rpn.push_branch(Op::If(0));
    rpn.push_val(10.0);
    rpn.push_branch(Op::Else(0));
    rpn.push_val(20.0);
    rpn.push_branch(Op::EndIf);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 20.0);
}
