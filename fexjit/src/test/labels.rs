use super::*;
use crate::error::AsmError;

#[test]
fn forward_jump_is_back_patched() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jmp(label);
    asm.nop();
    asm.bind(label).unwrap();

    assert_eq!(asm.code(), &[0xE9, 0x01, 0x00, 0x00, 0x00, 0x90]);
}

#[test]
fn backward_jump_resolves_immediately() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.bind(label).unwrap();
    asm.nop();
    asm.jmp(label);

    // rel32 from the end of the jmp back to offset 0
    assert_eq!(asm.code(), &[0x90, 0xE9, 0xFA, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn conditional_forward_jump() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jcc(Cond::E, label);
    asm.nop();
    asm.nop();
    asm.bind(label).unwrap();

    assert_eq!(asm.code(), &[0x0F, 0x84, 0x02, 0x00, 0x00, 0x00, 0x90, 0x90]);
}

#[test]
fn multiple_pending_sites_for_one_label() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jmp(label);
    asm.jcc(Cond::Ne, label);
    asm.bind(label).unwrap();

    assert_eq!(
        asm.code(),
        &[0xE9, 0x06, 0x00, 0x00, 0x00, 0x0F, 0x85, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn short_jump_within_range() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jmp_short(label);
    asm.nop();
    asm.bind(label).unwrap();

    assert_eq!(asm.code(), &[0xEB, 0x01, 0x90]);
}

#[test]
fn short_conditional_jump() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jcc_short(Cond::A, label);
    asm.bind(label).unwrap();

    assert_eq!(asm.code(), &[0x77, 0x00]);
}

#[test]
fn short_jump_out_of_range_raises_at_bind() {
    let mut asm = Assembler::new(Mode::X64);
    let label = asm.new_label();
    asm.jmp_short(label);
    for _ in 0..200 {
        asm.nop();
    }
    match asm.bind(label) {
        Err(AsmError::ShortJumpOutOfRange { site, disp }) => {
            assert_eq!(site, 1);
            assert_eq!(disp, 200);
        }
        other => panic!("expected short jump error, got {:?}", other),
    }
}
