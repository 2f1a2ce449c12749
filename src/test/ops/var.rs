use super::*;

#[test]
fn reads_the_cell() {
    let a: Value = 41.0;

    let mut rpn = Rpn::new();
    rpn.push_var(&a);
    rpn.push_val(1.0);
    rpn.push_bin(Op::Add);
    assert_eq!(Vm::new().eval(&rpn.finalize()), 42.0);
}

#[test]
fn rereads_the_cell_on_every_evaluation() {
    let mut a: Value = 1.0;
    let cell: *const Value = &a;

    let mut rpn = Rpn::new();
    rpn.push_var(cell);
    rpn.push_val(2.0);
    rpn.push_bin(Op::Mul);
    let program = rpn.finalize();

    let mut vm = Vm::new();
    assert_eq!(vm.eval(&program), 2.0);

    a = 21.0;
    assert_eq!(vm.eval(&program), 42.0);
}
