use std::sync::Arc;

use log::debug;
use num_traits::FromPrimitive;

use fex::{Callback, Op, Program, Value};

use crate::asm::{Assembler, Label, Mem, Mode};
use crate::error::{AsmError, JitError};
use crate::memory::{ExecAllocator, ExecPage};
use crate::reg::{Cond, Gp, Xmm};
use crate::regstack::{RegStack, SPILL_SLOT};

/// Comparison results are materialized by loading one of these two cells.
static ZERO: Value = 0.0;
static ONE: Value = 1.0;

/// Per-expression cells referenced by the emitted code.
///
/// `buf` ferries values between the SSE registers, the x87 stack and
/// function call results; `saved` holds the live stack registers across
/// calls. The block is heap allocated so its addresses stay stable for
/// the lifetime of the compiled expression.
#[repr(C)]
struct Scratch {
    buf: Value,
    saved: [Value; 6],
}

/// A pending conditional label together with the logical stack depth to
/// restore when it binds and the number of tokens until then.
struct JumpTag {
    label: Label,
    depth: i32,
    len: i32,
}

/// Compiles `program` into native code using the process-wide executable
/// memory pool.
///
/// `reg_hint` is the highest xmm register used for the evaluation stack
/// (0..=5); deeper slots spill to the CPU stack.
pub fn compile(program: &Program, reg_hint: u8) -> Result<CompiledExpr, JitError> {
    compile_with(program, reg_hint, ExecAllocator::global())
}

/// Like [`compile`], with an explicit executable memory allocator.
pub fn compile_with(
    program: &Program,
    reg_hint: u8,
    alloc: &Arc<ExecAllocator>,
) -> Result<CompiledExpr, JitError> {
    let mut compiler = ExprCompiler::new(program, reg_hint.min(5));
    compiler.run(program)?;

    let ExprCompiler {
        asm,
        scratch,
        consts,
        ..
    } = compiler;

    let mut page = alloc.allocate(asm.code_size())?;
    let image = asm.relocate(page.base() as u64)?;
    page.copy_code(&image);
    page.publish()?;

    debug!(
        "compiled expression: {} code bytes, {} trampoline bytes, page {:p}",
        asm.offset(),
        asm.trampoline_size(),
        page.base()
    );

    let entry =
        unsafe { std::mem::transmute::<*const u8, extern "C" fn() -> Value>(page.base()) };

    Ok(CompiledExpr {
        entry,
        _page: page,
        _scratch: scratch,
        _consts: consts,
    })
}

/// A natively compiled expression.
///
/// The handle owns the executable page, the scratch cells and the literal
/// pool the code references; dropping it releases all of them. Variable
/// cells referenced by the source program must outlive the handle.
///
/// The emitted code uses per-expression scratch memory, so a single
/// handle must not be invoked from two threads at once.
pub struct CompiledExpr {
    entry: extern "C" fn() -> Value,
    _page: ExecPage,
    _scratch: Box<Scratch>,
    _consts: Box<[Value]>,
}

impl CompiledExpr {
    /// Runs the compiled code.
    pub fn eval(&self) -> Value {
        (self.entry)()
    }

    /// The raw entry point.
    pub fn as_fn(&self) -> extern "C" fn() -> Value {
        self.entry
    }
}

struct ExprCompiler {
    asm: Assembler,
    rs: RegStack,
    tags: Vec<JumpTag>,
    scratch: Box<Scratch>,
    consts: Box<[Value]>,
    next_const: usize,
}

impl ExprCompiler {
    fn new(program: &Program, reg_hint: u8) -> ExprCompiler {
        let const_count = program
            .tokens()
            .iter()
            .filter(|t| match t.op {
                Op::Val(_) => true,
                _ => false,
            })
            .count();

        ExprCompiler {
            asm: Assembler::new(Mode::X64),
            rs: RegStack::new(reg_hint),
            tags: Vec::new(),
            scratch: Box::new(Scratch {
                buf: 0.0,
                saved: [0.0; 6],
            }),
            consts: vec![0.0; const_count].into_boxed_slice(),
            next_const: 0,
        }
    }

    fn buf_addr(&self) -> u64 {
        &self.scratch.buf as *const Value as u64
    }

    fn saved_addr(&self) -> u64 {
        self.scratch.saved.as_ptr() as u64
    }

    fn run(&mut self, program: &Program) -> Result<(), JitError> {
        // System V entry: the push realigns rsp to a 16-byte boundary.
        self.asm.push_r(Gp::Rbp);
        self.asm.mov_rr(Gp::Rbp, Gp::Rsp);

        for tok in program.tokens() {
            match tok.op {
                Op::Le | Op::Ge | Op::Ne | Op::Eq | Op::Lt | Op::Gt => {
                    self.bin_op_compare(tok.op)?
                }
                Op::And | Op::Or => self.bin_op_logic(tok.op)?,
                Op::Min | Op::Max | Op::Add | Op::Sub | Op::Mul | Op::Div => self.bin_op(tok.op),

                Op::Sin | Op::Cos | Op::Tan => self.intrinsic_x87(tok.op),
                Op::Abs => self.intrinsic_abs()?,
                Op::Sqrt => self.intrinsic_sqrt(),

                Op::Val(value) => {
                    let slot = self.next_const;
                    self.consts[slot] = value;
                    self.next_const += 1;
                    let addr = &self.consts[slot] as *const Value as u64;
                    self.push_cell(addr);
                }
                Op::Var(cell) => self.push_cell(cell as u64),

                Op::Fun { fun, argc } => self.call_fun(fun, argc)?,

                Op::If(offset) => self.cond_if(offset)?,
                Op::Else(offset) => self.cond_else(offset),
                Op::EndIf => {}

                Op::End => self.emit_result(program),
            }

            self.insert_jump_labels()?;

            if tok.op == Op::End {
                break;
            }
        }

        Ok(())
    }

    /// Binds every pending conditional label whose token distance has run
    /// out and restores the recorded stack depth.
    fn insert_jump_labels(&mut self) -> Result<(), AsmError> {
        let mut i = 0;
        while i < self.tags.len() {
            self.tags[i].len -= 1;
            if self.tags[i].len < 0 {
                let tag = self.tags.remove(i);
                self.rs.set_depth(tag.depth);
                self.asm.bind(tag.label)?;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Pushes the float stored at an absolute address.
    fn push_cell(&mut self, addr: u64) {
        self.asm.mov_ri_addr(Gp::Rcx, addr);
        self.rs.push(&mut self.asm, &Mem::base(Gp::Rcx));
    }

    fn bin_op(&mut self, op: Op) {
        let (a, b, spilled) = self.rs.load_two(&mut self.asm);
        match op {
            Op::Min => self.asm.minss(a, b),
            Op::Max => self.asm.maxss(a, b),
            Op::Add => self.asm.addss(a, b),
            Op::Sub => self.asm.subss(a, b),
            Op::Mul => self.asm.mulss(a, b),
            Op::Div => self.asm.divss(a, b),
            _ => unreachable!(),
        }
        self.rs.commit(&mut self.asm, a, spilled);
    }

    fn bin_op_compare(&mut self, op: Op) -> Result<(), AsmError> {
        let (a, b, spilled) = self.rs.load_two(&mut self.asm);

        let l_true = self.asm.new_label();
        let l_done = self.asm.new_label();

        self.asm.comiss_rr(a, b);
        let cond = match op {
            Op::Eq => Cond::E,
            Op::Ne => Cond::Ne,
            Op::Gt => Cond::A,
            Op::Lt => Cond::B,
            Op::Ge => Cond::Ae,
            Op::Le => Cond::Be,
            _ => unreachable!(),
        };
        self.asm.jcc(cond, l_true);

        self.asm.mov_ri_addr(Gp::Rcx, &ZERO as *const Value as u64);
        self.asm.jmp(l_done);
        self.asm.bind(l_true)?;
        self.asm.mov_ri_addr(Gp::Rcx, &ONE as *const Value as u64);
        self.asm.bind(l_done)?;
        self.asm.movss_rm(a, &Mem::base(Gp::Rcx));

        self.rs.commit(&mut self.asm, a, spilled);
        Ok(())
    }

    /// Both operands are already evaluated; the short circuit only picks
    /// the result without re-testing the second operand.
    fn bin_op_logic(&mut self, op: Op) -> Result<(), AsmError> {
        let (a, b, spilled) = self.rs.load_two(&mut self.asm);

        let l_short = self.asm.new_label();
        let l_exit = self.asm.new_label();

        let (cond, short_result) = match op {
            Op::Or => (Cond::Ne, 1),
            Op::And => (Cond::E, 0),
            _ => unreachable!(),
        };

        self.asm.mov_ri_addr(Gp::Rcx, &ZERO as *const Value as u64);
        self.asm.ucomiss_rm(a, &Mem::base(Gp::Rcx));
        self.asm.jcc(cond, l_short);
        self.asm.ucomiss_rm(b, &Mem::base(Gp::Rcx));
        self.asm.jcc(cond, l_short);

        self.asm.mov_ri32(Gp::Rdx, 1 - short_result);
        self.asm.jmp(l_exit);
        self.asm.bind(l_short)?;
        self.asm.mov_ri32(Gp::Rdx, short_result);
        self.asm.bind(l_exit)?;

        self.asm.cvtsi2ss(a, Gp::Rdx);
        self.rs.commit(&mut self.asm, a, spilled);
        Ok(())
    }

    /// sin/cos/tan take the x87 detour since SSE has no encodings for
    /// them.
    fn intrinsic_x87(&mut self, op: Op) {
        let (arg, spilled) = self.rs.load_one(&mut self.asm);

        let buf = self.buf_addr();
        self.asm.mov_ri_addr(Gp::Rcx, buf);
        self.asm.movss_mr(&Mem::base(Gp::Rcx), arg);
        self.asm.fld_m32(&Mem::base(Gp::Rcx));
        match op {
            Op::Sin => self.asm.fsin(),
            Op::Cos => self.asm.fcos(),
            Op::Tan => {
                // fptan pushes the result and a 1.0 on top of it.
                self.asm.fptan();
                self.asm.fstp_st0();
            }
            _ => unreachable!(),
        }
        self.asm.fstp_m32(&Mem::base(Gp::Rcx));
        self.asm.movss_rm(arg, &Mem::base(Gp::Rcx));

        self.rs.commit(&mut self.asm, arg, spilled);
    }

    fn intrinsic_abs(&mut self) -> Result<(), AsmError> {
        let (arg, spilled) = self.rs.load_one(&mut self.asm);
        let l_exit = self.asm.new_label();

        self.asm.mov_ri32(Gp::Rdx, 0);
        self.asm.cvtsi2ss(Xmm::Xmm7, Gp::Rdx);
        self.asm.comiss_rr(arg, Xmm::Xmm7);
        self.asm.jcc(Cond::A, l_exit);
        self.asm.mov_ri32(Gp::Rdx, -1);
        self.asm.cvtsi2ss(Xmm::Xmm7, Gp::Rdx);
        self.asm.mulss(arg, Xmm::Xmm7);
        self.asm.bind(l_exit)?;

        self.rs.commit(&mut self.asm, arg, spilled);
        Ok(())
    }

    fn intrinsic_sqrt(&mut self) {
        let (arg, spilled) = self.rs.load_one(&mut self.asm);
        self.asm.sqrtss(arg, arg);
        self.rs.commit(&mut self.asm, arg, spilled);
    }

    fn cond_if(&mut self, offset: i32) -> Result<(), AsmError> {
        let (arg, _) = self.rs.load_one(&mut self.asm);
        self.rs.pop(&mut self.asm, 1);

        self.asm.mov_ri_addr(Gp::Rcx, &ZERO as *const Value as u64);
        self.asm.ucomiss_rm(arg, &Mem::base(Gp::Rcx));

        let label = self.asm.new_label();
        self.tags.push(JumpTag {
            label,
            depth: self.rs.depth(),
            len: offset,
        });
        self.asm.jcc(Cond::E, label);
        Ok(())
    }

    fn cond_else(&mut self, offset: i32) {
        let label = self.asm.new_label();
        self.asm.jmp(label);
        self.tags.push(JumpTag {
            label,
            depth: self.rs.depth(),
            len: offset,
        });
    }

    /// Calls a user callback with System V xmm argument passing: the
    /// first eight arguments travel in `xmm0..xmm7`, the rest in stack
    /// slots, and the result comes back in `xmm0`.
    fn call_fun(&mut self, fun: Callback, argc: u8) -> Result<(), JitError> {
        let argc = i32::from(argc);
        let d = self.rs.depth();
        let r = self.rs.top_reg();
        let saved = self.saved_addr();
        let buf = self.buf_addr();
        let new_top = d - argc + 1;
        if new_top < 0 {
            return Err(JitError::Internal("function arguments underflow"));
        }

        // Everything below the result slot survives the call in the
        // scratch save area; the arguments themselves are consumed.
        let save_n = new_top.min(r + 1);
        if save_n > 0 {
            self.asm.mov_ri_addr(Gp::Rcx, saved);
            for i in 0..save_n {
                self.asm
                    .movss_mr(&Mem::base_disp(Gp::Rcx, i * 4), self.rs.reg_at(i));
            }
        }

        let spill_total = (d - r).max(0) * SPILL_SLOT;
        let spilled_args = argc.min((d - r).max(0));
        let stack_args = (argc - 8).max(0);
        let area = stack_args * 8;
        // rsp must sit on a 16-byte boundary at the call instruction; the
        // spill count is known statically, so the padding is too.
        let pad = (16 - (spill_total + area) % 16) % 16;
        let adj = area + pad;
        if adj > 0 {
            self.asm.sub_ri(Gp::Rsp, adj);
        }

        // Stack-tail arguments first, while the scratch registers are
        // still free.
        for j in 8..argc {
            let dj = new_top + j;
            let slot = Mem::base_disp(Gp::Rsp, (j - 8) * 8);
            if !self.rs.is_spilled(dj) {
                self.asm.movss_mr(&slot, self.rs.reg_at(dj));
            } else {
                let off = adj + (d - dj) * SPILL_SLOT;
                let scratch = self.rs.scratch0();
                self.asm.movss_rm(scratch, &Mem::base_disp(Gp::Rsp, off));
                self.asm.movss_mr(&slot, scratch);
            }
        }

        // Register arguments in ascending order; every source sits at the
        // same or a higher register index than its destination, so no
        // source is clobbered before it is read.
        for j in 0..argc.min(8) {
            let dj = new_top + j;
            let dst = Xmm::from_i32(j).expect("argument register index out of range");
            if !self.rs.is_spilled(dj) {
                if dj != j {
                    self.asm.movss_rr(dst, self.rs.reg_at(dj));
                }
            } else {
                let off = adj + (d - dj) * SPILL_SLOT;
                self.asm.movss_rm(dst, &Mem::base_disp(Gp::Rsp, off));
            }
        }

        self.asm.call_abs(fun.addr() as u64);

        // Park the result while the saved registers are restored.
        self.asm.mov_ri_addr(Gp::Rcx, buf);
        self.asm.movss_mr(&Mem::base(Gp::Rcx), Xmm::Xmm0);

        if adj > 0 {
            self.asm.add_ri(Gp::Rsp, adj);
        }
        if spilled_args > 0 {
            self.asm.add_ri(Gp::Rsp, spilled_args * SPILL_SLOT);
        }

        if save_n > 0 {
            self.asm.mov_ri_addr(Gp::Rcx, saved);
            for i in 0..save_n {
                self.asm
                    .movss_rm(self.rs.reg_at(i), &Mem::base_disp(Gp::Rcx, i * 4));
            }
        }

        self.rs.set_depth(new_top);
        self.asm.mov_ri_addr(Gp::Rcx, buf);
        if !self.rs.is_spilled(new_top) {
            self.asm
                .movss_rm(self.rs.reg_at(new_top), &Mem::base(Gp::Rcx));
        } else {
            let scratch = self.rs.scratch0();
            self.asm.sub_ri(Gp::Rsp, SPILL_SLOT);
            self.asm.movss_rm(scratch, &Mem::base(Gp::Rcx));
            self.asm.movss_mr(&Mem::base(Gp::Rsp), scratch);
        }

        Ok(())
    }

    /// Moves the final value into `xmm0` and returns.
    fn emit_result(&mut self, program: &Program) {
        let d = (program.result_slot() as i32) - 1;

        if d > 0 {
            if !self.rs.is_spilled(d) {
                self.asm.movss_rr(Xmm::Xmm0, self.rs.reg_at(d));
            } else {
                self.asm.movss_rm(Xmm::Xmm0, &Mem::base(Gp::Rsp));
                let spills = self.rs.spill_count();
                self.asm.add_ri(Gp::Rsp, spills * SPILL_SLOT);
            }
        }

        self.asm.pop_r(Gp::Rbp);
        self.asm.ret();
    }
}
