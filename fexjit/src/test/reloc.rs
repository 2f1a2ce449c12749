use byteorder::{ByteOrder, LittleEndian};

use super::*;
use crate::asm::TRAMPOLINE_SIZE;
use crate::error::AsmError;

#[test]
fn call_in_range_becomes_rel32() {
    let mut asm = Assembler::new(Mode::X64);
    asm.call_abs(0x2000);
    let image = asm.relocate(0x1000).unwrap();

    assert_eq!(image[0], 0xE8);
    // displacement from the end of the call at 0x1005
    assert_eq!(LittleEndian::read_i32(&image[1..5]), 0x2000 - 0x1005);
}

#[test]
fn x64_call_reserves_a_trampoline_slot() {
    let mut asm = Assembler::new(Mode::X64);
    asm.call_abs(0x2000);
    assert_eq!(asm.trampoline_size(), TRAMPOLINE_SIZE);
    assert_eq!(asm.code_size(), asm.code().len() + TRAMPOLINE_SIZE);
}

#[test]
fn x86_call_has_no_trampoline() {
    let mut asm = Assembler::new(Mode::X86);
    asm.call_abs(0x2000);
    assert_eq!(asm.trampoline_size(), 0);
}

#[test]
fn far_target_goes_through_trampoline() {
    let mut asm = Assembler::new(Mode::X64);
    let target = 0x7766_5544_3322_1100u64;
    asm.call_abs(target);
    asm.ret();

    let base = 0x10_0000u64;
    let image = asm.relocate(base).unwrap();
    let code_len = asm.code().len();
    assert_eq!(image.len(), code_len + TRAMPOLINE_SIZE);

    // The call lands on the trampoline at the end of the code.
    let disp = LittleEndian::read_i32(&image[1..5]) as i64;
    assert_eq!(5 + disp, code_len as i64);

    // movabs rax, target ; jmp rax
    assert_eq!(&image[code_len..code_len + 2], &[0x48, 0xB8]);
    assert_eq!(LittleEndian::read_u64(&image[code_len + 2..code_len + 10]), target);
    assert_eq!(&image[code_len + 10..code_len + 12], &[0xFF, 0xE0]);
}

#[test]
fn near_target_leaves_trampoline_unused() {
    let mut asm = Assembler::new(Mode::X64);
    asm.call_abs(0x2000);
    let image = asm.relocate(0x1000).unwrap();

    // The slot is still reserved but holds only filler.
    assert_eq!(image.len(), asm.code().len() + TRAMPOLINE_SIZE);
    assert!(image[asm.code().len()..].iter().all(|&b| b == 0xCC));
}

#[test]
fn x86_far_target_is_an_error() {
    let mut asm = Assembler::new(Mode::X86);
    asm.call_abs(0x7766_5544_3322_1100);
    match asm.relocate(0x1000) {
        Err(AsmError::RelocOutOfRange { site }) => assert_eq!(site, 1),
        other => panic!("expected out of range error, got {:?}", other),
    }
}

#[test]
fn abs_addr_slot_gets_final_address() {
    let mut asm = Assembler::new(Mode::X64);
    asm.ret();
    asm.emit_abs_addr(0);

    let image = asm.relocate(0x4000).unwrap();
    assert_eq!(LittleEndian::read_u64(&image[1..9]), 0x4000);
}

#[test]
fn relocation_is_reproducible() {
    let mut asm = Assembler::new(Mode::X64);
    asm.call_abs(0x1234_5678);
    asm.ret();

    let a = asm.relocate(0x9000).unwrap();
    let b = asm.relocate(0x9000).unwrap();
    assert_eq!(a, b);
}
