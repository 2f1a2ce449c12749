use num_traits::FromPrimitive;

use crate::asm::{Assembler, Mem};
use crate::reg::{Gp, Xmm};

/// Bytes one spilled stack slot occupies.
pub const SPILL_SLOT: i32 = 4;

/// Deterministic mapping from logical evaluation-stack depth to physical
/// locations.
///
/// Depths `0..=top_reg` live directly in `xmm0..xmm[top_reg]`; deeper
/// slots are spilled to the CPU stack, newest on top. The two registers
/// above `top_reg` are reserved as scratch for reloading spilled values.
/// For identical token streams the emitted register assignments and spill
/// patterns are identical.
pub struct RegStack {
    depth: i32,
    top_reg: i32,
}

impl RegStack {
    /// `top_reg` is the highest xmm register used for the stack (0..=5).
    pub fn new(top_reg: u8) -> RegStack {
        debug_assert!(top_reg <= 5);
        RegStack {
            depth: -1,
            top_reg: i32::from(top_reg),
        }
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    pub fn top_reg(&self) -> i32 {
        self.top_reg
    }

    fn xmm(index: i32) -> Xmm {
        Xmm::from_i32(index).expect("xmm index out of range")
    }

    /// First scratch register, directly above the stack registers.
    pub fn scratch0(&self) -> Xmm {
        Self::xmm(self.top_reg + 1)
    }

    /// Second scratch register.
    pub fn scratch1(&self) -> Xmm {
        Self::xmm(self.top_reg + 2)
    }

    /// Register holding the given depth; the depth must not be spilled.
    pub fn reg_at(&self, depth: i32) -> Xmm {
        debug_assert!(depth >= 0 && depth <= self.top_reg);
        Self::xmm(depth)
    }

    /// True if the given depth lives on the CPU stack.
    pub fn is_spilled(&self, depth: i32) -> bool {
        depth > self.top_reg
    }

    /// Number of spilled slots at the current depth.
    pub fn spill_count(&self) -> i32 {
        (self.depth - self.top_reg).max(0)
    }

    /// Spill-region offset of `depth` relative to the stack pointer.
    pub fn spill_offset(&self, depth: i32) -> i32 {
        debug_assert!(self.is_spilled(depth) && depth <= self.depth);
        (self.depth - depth) * SPILL_SLOT
    }

    /// Pushes a new value read from `src` onto the logical stack.
    pub fn push(&mut self, asm: &mut Assembler, src: &Mem) {
        self.depth += 1;
        if self.depth <= self.top_reg {
            let dst = Self::xmm(self.depth);
            asm.movss_rm(dst, src);
        } else {
            let scratch = self.scratch0();
            asm.sub_ri(Gp::Rsp, SPILL_SLOT);
            asm.movss_rm(scratch, src);
            asm.movss_mr(&Mem::base(Gp::Rsp), scratch);
        }
    }

    /// Makes the top slot available in a register without consuming it.
    /// Returns the register and whether the slot is spilled; a spilled
    /// result has to be written back with
    /// [`commit`](RegStack::commit) after modification.
    pub fn load_one(&mut self, asm: &mut Assembler) -> (Xmm, bool) {
        if self.depth <= self.top_reg {
            (Self::xmm(self.depth), false)
        } else {
            let scratch = self.scratch0();
            asm.movss_rm(scratch, &Mem::base(Gp::Rsp));
            (scratch, true)
        }
    }

    /// Consumes the two topmost slots and makes them available in
    /// registers; the first result register doubles as the destination
    /// slot. Returns whether the destination is spilled.
    ///
    /// At most one reload per spilled operand is emitted, and the stack
    /// pointer is adjusted so that exactly the destination slot remains.
    pub fn load_two(&mut self, asm: &mut Assembler) -> (Xmm, Xmm, bool) {
        self.depth -= 1;

        if self.depth < self.top_reg {
            (Self::xmm(self.depth), Self::xmm(self.depth + 1), false)
        } else if self.depth == self.top_reg {
            // Only the consumed slot was spilled; the destination stays
            // in the highest stack register.
            let scratch = self.scratch0();
            asm.movss_rm(scratch, &Mem::base(Gp::Rsp));
            asm.add_ri(Gp::Rsp, SPILL_SLOT);
            (Self::xmm(self.top_reg), scratch, false)
        } else {
            let s0 = self.scratch0();
            let s1 = self.scratch1();
            asm.movss_rm(s1, &Mem::base(Gp::Rsp));
            asm.add_ri(Gp::Rsp, SPILL_SLOT);
            asm.movss_rm(s0, &Mem::base(Gp::Rsp));
            (s0, s1, true)
        }
    }

    /// Writes an operation result held in `reg` back to the top spill
    /// slot if the destination is spilled.
    pub fn commit(&mut self, asm: &mut Assembler, reg: Xmm, spilled: bool) {
        if spilled {
            asm.movss_mr(&Mem::base(Gp::Rsp), reg);
        }
    }

    /// Discards the topmost `count` slots, releasing any spilled ones.
    pub fn pop(&mut self, asm: &mut Assembler, count: i32) {
        debug_assert!(count >= 0 && count <= self.depth + 1);
        let spilled = self.depth - self.top_reg.max(self.depth - count);
        self.depth -= count;
        if spilled > 0 {
            asm.add_ri(Gp::Rsp, spilled * SPILL_SLOT);
        }
    }
}
