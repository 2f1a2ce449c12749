use super::*;

#[test]
fn sin() {
    intrinsic_evals!(Op::Sin, 0.0 => 0.0);
    intrinsic_evals!(Op::Sin, 1.25 => 1.25_f32.sin());
}

#[test]
fn cos() {
    intrinsic_evals!(Op::Cos, 0.0 => 1.0);
    intrinsic_evals!(Op::Cos, 1.25 => 1.25_f32.cos());
}

#[test]
fn tan() {
    intrinsic_evals!(Op::Tan, 0.5 => 0.5_f32.tan());
}

#[test]
fn abs() {
    intrinsic_evals!(Op::Abs, -3.5 => 3.5);
    intrinsic_evals!(Op::Abs, 3.5 => 3.5);
    intrinsic_evals!(Op::Abs, 0.0 => 0.0);
}

#[test]
fn sqrt() {
    intrinsic_evals!(Op::Sqrt, 16.0 => 4.0);
    intrinsic_evals!(Op::Sqrt, 2.0 => 2.0_f32.sqrt());
}

#[test]
fn intrinsic_applies_in_place() {
    // sqrt(abs(-16)) + 1
    let mut rpn = Rpn::new();
    rpn.push_val(-16.0);
    rpn.push_intrinsic(Op::Abs);
    rpn.push_intrinsic(Op::Sqrt);
    rpn.push_val(1.0);
    rpn.push_bin(Op::Add);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 5.0);
}
