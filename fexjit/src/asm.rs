use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::trace;

use crate::error::AsmError;
use crate::reg::{Cond, Gp, Xmm};

/// Target mode of the assembler.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    X86,
    X64,
}

/// Index scale of a SIB byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Scale {
    S1 = 0,
    S2 = 1,
    S4 = 2,
    S8 = 3,
}

/// A memory operand.
///
/// Without base and index this encodes a plain `[disp32]` (absolute in
/// 32-bit mode, SIB-absolute in 64-bit mode); [`Mem::rip`] produces the
/// RIP-relative form addressing a buffer offset.
#[derive(Clone, Copy, Debug)]
pub struct Mem {
    base: Option<Gp>,
    index: Option<(Gp, Scale)>,
    disp: i32,
    rip: bool,
}

impl Mem {
    /// `[base]`
    pub fn base(base: Gp) -> Mem {
        Mem {
            base: Some(base),
            index: None,
            disp: 0,
            rip: false,
        }
    }

    /// `[base + disp]`
    pub fn base_disp(base: Gp, disp: i32) -> Mem {
        Mem {
            base: Some(base),
            index: None,
            disp,
            rip: false,
        }
    }

    /// `[base + index * scale + disp]`
    pub fn base_index(base: Gp, index: Gp, scale: Scale, disp: i32) -> Mem {
        Mem {
            base: Some(base),
            index: Some((index, scale)),
            disp,
            rip: false,
        }
    }

    /// `[index * scale + disp]`
    pub fn index_disp(index: Gp, scale: Scale, disp: i32) -> Mem {
        Mem {
            base: None,
            index: Some((index, scale)),
            disp,
            rip: false,
        }
    }

    /// `[disp]`, absolute.
    pub fn abs(disp: i32) -> Mem {
        Mem {
            base: None,
            index: None,
            disp,
            rip: false,
        }
    }

    /// RIP-relative reference to the given code buffer offset
    /// (64-bit mode only).
    pub fn rip(target_offset: usize) -> Mem {
        Mem {
            base: None,
            index: None,
            disp: target_offset as i32,
            rip: true,
        }
    }
}

/// Handle to a label owned by an [`Assembler`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Label(u32);

struct LabelEntry {
    /// Bound code offset, or -1 while unbound.
    offset: i64,
    /// Displacement fields waiting for the label to be bound.
    pending: Vec<Patch>,
}

#[derive(Clone, Copy)]
struct Patch {
    site: u32,
    size: u8,
}

/// Kinds of relocation records.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelocKind {
    /// The site holds an absolute address that is already final.
    AbsToAbs,
    /// The site holds an absolute address of a location inside the code
    /// buffer; the final value is `base + target`.
    AbsToRel,
    /// The site is the rel32 field of a call/jump to an absolute target.
    /// In 64-bit mode a trampoline slot backs the record in case the
    /// displacement overflows.
    RelToAbs,
}

struct Reloc {
    site: usize,
    size: u8,
    kind: RelocKind,
    target: u64,
    trampoline: Option<usize>,
}

/// Byte size of one trampoline slot: `movabs rax, imm64; jmp rax` is
/// twelve bytes, padded for alignment.
pub const TRAMPOLINE_SIZE: usize = 16;

/// A streaming instruction emitter for x86 and x86-64.
///
/// The assembler only ever works with buffer offsets; absolute addresses
/// enter the picture when [`relocate`](Assembler::relocate) produces the
/// final image for a known base address. One method call emits one
/// instruction.
pub struct Assembler {
    mode: Mode,
    buf: Vec<u8>,
    labels: Vec<LabelEntry>,
    relocs: Vec<Reloc>,
    trampolines: usize,
}

impl Assembler {
    pub fn new(mode: Mode) -> Assembler {
        Assembler {
            mode,
            buf: Vec::with_capacity(256),
            labels: Vec::new(),
            relocs: Vec::new(),
            trampolines: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current emission offset.
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// The raw code bytes emitted so far, without trampolines.
    pub fn code(&self) -> &[u8] {
        &self.buf
    }

    /// Total size of the final image including reserved trampoline slots;
    /// callers allocate this much before relocating.
    pub fn code_size(&self) -> usize {
        self.buf.len() + self.trampoline_size()
    }

    pub fn trampoline_size(&self) -> usize {
        self.trampolines * TRAMPOLINE_SIZE
    }

    // ------------------------------------------------------------------
    // raw emission

    pub fn emit_byte(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn emit_word(&mut self, value: u16) {
        self.buf.write_u16::<LittleEndian>(value).unwrap();
    }

    pub fn emit_dword(&mut self, value: u32) {
        self.buf.write_u32::<LittleEndian>(value).unwrap();
    }

    pub fn emit_qword(&mut self, value: u64) {
        self.buf.write_u64::<LittleEndian>(value).unwrap();
    }

    fn patch_dword(&mut self, site: usize, value: u32) {
        LittleEndian::write_u32(&mut self.buf[site..site + 4], value);
    }

    /// Packs a ModR/M byte.
    pub fn emit_modrm(&mut self, modbits: u8, reg: u8, rm: u8) {
        debug_assert!(modbits < 4 && reg < 8 && rm < 8);
        self.emit_byte(modbits << 6 | reg << 3 | rm);
    }

    /// Packs a SIB byte.
    pub fn emit_sib(&mut self, scale: u8, index: u8, base: u8) {
        debug_assert!(scale < 4 && index < 8 && base < 8);
        self.emit_byte(scale << 6 | index << 3 | base);
    }

    /// Emits a REX prefix if any of the W bit or the high bits of the
    /// given register numbers require one. A no-op in 32-bit mode.
    pub fn emit_rex(&mut self, w: bool, reg: u8, index: u8, base: u8) {
        if self.mode == Mode::X86 {
            debug_assert!(!w && reg < 8 && index < 8 && base < 8);
            return;
        }

        let rex = 0x40
            | (w as u8) << 3
            | ((reg >> 3) & 1) << 2
            | ((index >> 3) & 1) << 1
            | ((base >> 3) & 1);
        if rex != 0x40 {
            self.emit_byte(rex);
        }
    }

    /// Emits the ModR/M byte, optional SIB byte and displacement for a
    /// memory operand. `imm_len` is the size of an immediate following
    /// the displacement; it matters for the RIP-relative form, whose
    /// displacement is counted from the end of the whole instruction.
    pub fn emit_modrm_mem(&mut self, reg: u8, mem: &Mem, imm_len: usize) {
        let reg3 = reg & 7;

        if mem.rip {
            debug_assert_eq!(self.mode, Mode::X64);
            self.emit_modrm(0, reg3, 5);
            let end = self.buf.len() + 4 + imm_len;
            self.emit_dword((mem.disp as i64 - end as i64) as u32);
            return;
        }

        match (mem.base, mem.index) {
            (None, None) => {
                // [disp32]; 64-bit mode needs the SIB escape, plain
                // mod 00 rm 101 would mean RIP-relative there.
                if self.mode == Mode::X86 {
                    self.emit_modrm(0, reg3, 5);
                } else {
                    self.emit_modrm(0, reg3, 4);
                    self.emit_sib(0, 4, 5);
                }
                self.emit_dword(mem.disp as u32);
            }
            (Some(base), None) => {
                let rm = base.low3();
                let sib = base.needs_sib();
                if mem.disp == 0 && !base.needs_disp() {
                    self.emit_modrm(0, reg3, if sib { 4 } else { rm });
                    if sib {
                        self.emit_sib(0, 4, rm);
                    }
                } else if mem.disp >= -128 && mem.disp <= 127 {
                    // RBP and R13 bases land here with an explicit zero
                    // displacement.
                    self.emit_modrm(1, reg3, if sib { 4 } else { rm });
                    if sib {
                        self.emit_sib(0, 4, rm);
                    }
                    self.emit_byte(mem.disp as u8);
                } else {
                    self.emit_modrm(2, reg3, if sib { 4 } else { rm });
                    if sib {
                        self.emit_sib(0, 4, rm);
                    }
                    self.emit_dword(mem.disp as u32);
                }
            }
            (base, Some((index, scale))) => {
                // RSP cannot be an index register.
                debug_assert!(index.num() != 4);
                match base {
                    None => {
                        self.emit_modrm(0, reg3, 4);
                        self.emit_sib(scale as u8, index.low3(), 5);
                        self.emit_dword(mem.disp as u32);
                    }
                    Some(base) => {
                        if mem.disp == 0 && !base.needs_disp() {
                            self.emit_modrm(0, reg3, 4);
                            self.emit_sib(scale as u8, index.low3(), base.low3());
                        } else if mem.disp >= -128 && mem.disp <= 127 {
                            self.emit_modrm(1, reg3, 4);
                            self.emit_sib(scale as u8, index.low3(), base.low3());
                            self.emit_byte(mem.disp as u8);
                        } else {
                            self.emit_modrm(2, reg3, 4);
                            self.emit_sib(scale as u8, index.low3(), base.low3());
                            self.emit_dword(mem.disp as u32);
                        }
                    }
                }
            }
        }
    }

    fn mem_rex_bits(mem: &Mem) -> (u8, u8) {
        let index = mem.index.map(|(r, _)| r.num()).unwrap_or(0);
        let base = mem.base.map(|r| r.num()).unwrap_or(0);
        (index, base)
    }

    // ------------------------------------------------------------------
    // labels

    /// Creates a fresh unbound label.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelEntry {
            offset: -1,
            pending: Vec::new(),
        });
        Label(self.labels.len() as u32 - 1)
    }

    /// Binds `label` to the current offset and back-patches every pending
    /// displacement. Raises [`AsmError::ShortJumpOutOfRange`] if an 8-bit
    /// patch cannot reach.
    pub fn bind(&mut self, label: Label) -> Result<(), AsmError> {
        let offset = self.buf.len() as i64;
        let entry = &mut self.labels[label.0 as usize];
        debug_assert!(entry.offset < 0, "label bound twice");
        entry.offset = offset;

        let pending = std::mem::replace(&mut entry.pending, Vec::new());
        for patch in pending {
            let site = patch.site as usize;
            let disp = offset - (site as i64 + i64::from(patch.size));
            match patch.size {
                1 => {
                    if disp < -128 || disp > 127 {
                        return Err(AsmError::ShortJumpOutOfRange { site, disp });
                    }
                    self.buf[site] = disp as u8;
                }
                4 => self.patch_dword(site, disp as u32),
                _ => unreachable!(),
            }
        }

        Ok(())
    }

    /// Emits a displacement field referring to `label`, either resolved
    /// immediately or queued for back-patching.
    fn emit_label_disp(&mut self, label: Label, size: u8) {
        let site = self.buf.len();
        let offset = self.labels[label.0 as usize].offset;
        if offset >= 0 {
            let disp = offset - (site as i64 + i64::from(size));
            match size {
                1 => self.emit_byte(disp as u8),
                4 => self.emit_dword(disp as u32),
                _ => unreachable!(),
            }
        } else {
            self.labels[label.0 as usize].pending.push(Patch {
                site: site as u32,
                size,
            });
            match size {
                1 => self.emit_byte(0),
                4 => self.emit_dword(0),
                _ => unreachable!(),
            }
        }
    }

    // ------------------------------------------------------------------
    // relocation

    /// Emits the rel32 field of a call (`0xE8`) or jump (`0xE9`) to an
    /// absolute target address. The displacement cannot be known until
    /// the final image location is fixed, so a relocation record is
    /// stored; in 64-bit mode a trampoline slot is reserved in case the
    /// target ends up out of rel32 range.
    pub fn emit_rel_jump_or_call(&mut self, opcode: u8, target: u64) {
        debug_assert!(opcode == 0xE8 || opcode == 0xE9);
        self.emit_byte(opcode);

        let trampoline = if self.mode == Mode::X64 {
            let slot = self.trampolines;
            self.trampolines += 1;
            Some(slot)
        } else {
            None
        };

        self.relocs.push(Reloc {
            site: self.buf.len(),
            size: 4,
            kind: RelocKind::RelToAbs,
            target,
            trampoline,
        });
        self.emit_dword(0);
    }

    /// `call target`
    pub fn call_abs(&mut self, target: u64) {
        self.emit_rel_jump_or_call(0xE8, target);
    }

    /// `jmp target`
    pub fn jmp_abs(&mut self, target: u64) {
        self.emit_rel_jump_or_call(0xE9, target);
    }

    /// Emits a pointer-sized slot that will hold the absolute address of
    /// the given buffer offset once relocated (e.g. jump table entries).
    pub fn emit_abs_addr(&mut self, target_offset: usize) {
        let size = match self.mode {
            Mode::X86 => 4,
            Mode::X64 => 8,
        };
        self.relocs.push(Reloc {
            site: self.buf.len(),
            size,
            kind: RelocKind::AbsToRel,
            target: target_offset as u64,
            trampoline: None,
        });
        match size {
            4 => self.emit_dword(0),
            _ => self.emit_qword(0),
        }
    }

    /// Produces the final image for a load address of `base`: the code
    /// bytes followed by the trampoline area, with every relocation site
    /// rewritten.
    pub fn relocate(&self, base: u64) -> Result<Vec<u8>, AsmError> {
        let code_len = self.buf.len();
        let mut image = self.buf.clone();
        image.resize(self.code_size(), 0xCC);

        for reloc in &self.relocs {
            match reloc.kind {
                RelocKind::AbsToAbs => {
                    Self::write_sized(&mut image, reloc.site, reloc.size, reloc.target)
                }
                RelocKind::AbsToRel => Self::write_sized(
                    &mut image,
                    reloc.site,
                    reloc.size,
                    base.wrapping_add(reloc.target),
                ),
                RelocKind::RelToAbs => {
                    let end = base.wrapping_add(reloc.site as u64).wrapping_add(4);
                    let disp = reloc.target.wrapping_sub(end) as i64;
                    if disp >= i64::from(i32::min_value()) && disp <= i64::from(i32::max_value()) {
                        LittleEndian::write_u32(
                            &mut image[reloc.site..reloc.site + 4],
                            disp as u32,
                        );
                    } else if let Some(slot) = reloc.trampoline {
                        let tramp = code_len + slot * TRAMPOLINE_SIZE;
                        trace!(
                            "reloc at {:#x}: target {:#x} through trampoline at offset {:#x}",
                            reloc.site,
                            reloc.target,
                            tramp
                        );
                        // movabs rax, target ; jmp rax
                        image[tramp] = 0x48;
                        image[tramp + 1] = 0xB8;
                        LittleEndian::write_u64(&mut image[tramp + 2..tramp + 10], reloc.target);
                        image[tramp + 10] = 0xFF;
                        image[tramp + 11] = 0xE0;

                        let disp = tramp as i64 - (reloc.site as i64 + 4);
                        LittleEndian::write_u32(
                            &mut image[reloc.site..reloc.site + 4],
                            disp as u32,
                        );
                    } else {
                        return Err(AsmError::RelocOutOfRange { site: reloc.site });
                    }
                }
            }
        }

        Ok(image)
    }

    fn write_sized(image: &mut [u8], site: usize, size: u8, value: u64) {
        match size {
            4 => LittleEndian::write_u32(&mut image[site..site + 4], value as u32),
            8 => LittleEndian::write_u64(&mut image[site..site + 8], value),
            _ => unreachable!(),
        }
    }

    // ------------------------------------------------------------------
    // general purpose instructions

    /// `nop`
    pub fn nop(&mut self) {
        self.emit_byte(0x90);
    }

    /// `ret`
    pub fn ret(&mut self) {
        self.emit_byte(0xC3);
    }

    /// Pads with NOPs up to the next `n`-aligned offset.
    pub fn align(&mut self, n: usize) {
        debug_assert!(n.is_power_of_two());
        while self.buf.len() % n != 0 {
            self.nop();
        }
    }

    /// `push reg`
    pub fn push_r(&mut self, reg: Gp) {
        self.emit_rex(false, 0, 0, reg.num());
        self.emit_byte(0x50 + reg.low3());
    }

    /// `pop reg`
    pub fn pop_r(&mut self, reg: Gp) {
        self.emit_rex(false, 0, 0, reg.num());
        self.emit_byte(0x58 + reg.low3());
    }

    /// `mov dst, src` at the native word width.
    pub fn mov_rr(&mut self, dst: Gp, src: Gp) {
        self.emit_rex(self.mode == Mode::X64, dst.num(), 0, src.num());
        self.emit_byte(0x8B);
        self.emit_modrm(3, dst.low3(), src.low3());
    }

    /// `mov dst, imm32` (zero-extended in 64-bit mode).
    pub fn mov_ri32(&mut self, dst: Gp, imm: i32) {
        self.emit_rex(false, 0, 0, dst.num());
        self.emit_byte(0xB8 + dst.low3());
        self.emit_dword(imm as u32);
    }

    /// `movabs dst, imm64` (64-bit mode only).
    pub fn mov_ri64(&mut self, dst: Gp, imm: u64) {
        debug_assert_eq!(self.mode, Mode::X64);
        self.emit_rex(true, 0, 0, dst.num());
        self.emit_byte(0xB8 + dst.low3());
        self.emit_qword(imm);
    }

    /// Loads an address-sized immediate; `mov` in 32-bit mode, `movabs`
    /// in 64-bit mode.
    pub fn mov_ri_addr(&mut self, dst: Gp, addr: u64) {
        match self.mode {
            Mode::X86 => self.mov_ri32(dst, addr as i32),
            Mode::X64 => self.mov_ri64(dst, addr),
        }
    }

    fn arith_ri(&mut self, ext: u8, dst: Gp, imm: i32) {
        self.emit_rex(self.mode == Mode::X64, 0, 0, dst.num());
        if imm >= -128 && imm <= 127 {
            self.emit_byte(0x83);
            self.emit_modrm(3, ext, dst.low3());
            self.emit_byte(imm as u8);
        } else {
            self.emit_byte(0x81);
            self.emit_modrm(3, ext, dst.low3());
            self.emit_dword(imm as u32);
        }
    }

    /// `add dst, imm`
    pub fn add_ri(&mut self, dst: Gp, imm: i32) {
        self.arith_ri(0, dst, imm);
    }

    /// `sub dst, imm`
    pub fn sub_ri(&mut self, dst: Gp, imm: i32) {
        self.arith_ri(5, dst, imm);
    }

    // ------------------------------------------------------------------
    // scalar SSE instructions

    fn sse_rr(&mut self, prefix: Option<u8>, opcode: u8, reg: u8, rm: u8) {
        if let Some(p) = prefix {
            self.emit_byte(p);
        }
        self.emit_rex(false, reg, 0, rm);
        self.emit_byte(0x0F);
        self.emit_byte(opcode);
        self.emit_modrm(3, reg & 7, rm & 7);
    }

    fn sse_rm(&mut self, prefix: Option<u8>, opcode: u8, reg: u8, mem: &Mem) {
        if let Some(p) = prefix {
            self.emit_byte(p);
        }
        let (index, base) = Self::mem_rex_bits(mem);
        self.emit_rex(false, reg, index, base);
        self.emit_byte(0x0F);
        self.emit_byte(opcode);
        self.emit_modrm_mem(reg, mem, 0);
    }

    /// `movss dst, [mem]`
    pub fn movss_rm(&mut self, dst: Xmm, mem: &Mem) {
        self.sse_rm(Some(0xF3), 0x10, dst.num(), mem);
    }

    /// `movss [mem], src`
    pub fn movss_mr(&mut self, mem: &Mem, src: Xmm) {
        self.sse_rm(Some(0xF3), 0x11, src.num(), mem);
    }

    /// `movss dst, src`
    pub fn movss_rr(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x10, dst.num(), src.num());
    }

    /// `addss dst, src`
    pub fn addss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x58, dst.num(), src.num());
    }

    /// `subss dst, src`
    pub fn subss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x5C, dst.num(), src.num());
    }

    /// `mulss dst, src`
    pub fn mulss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x59, dst.num(), src.num());
    }

    /// `divss dst, src`
    pub fn divss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x5E, dst.num(), src.num());
    }

    /// `minss dst, src`
    pub fn minss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x5D, dst.num(), src.num());
    }

    /// `maxss dst, src`
    pub fn maxss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x5F, dst.num(), src.num());
    }

    /// `sqrtss dst, src`
    pub fn sqrtss(&mut self, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), 0x51, dst.num(), src.num());
    }

    /// `ucomiss a, b`
    pub fn ucomiss_rr(&mut self, a: Xmm, b: Xmm) {
        self.sse_rr(None, 0x2E, a.num(), b.num());
    }

    /// `ucomiss a, [mem]`
    pub fn ucomiss_rm(&mut self, a: Xmm, mem: &Mem) {
        self.sse_rm(None, 0x2E, a.num(), mem);
    }

    /// `comiss a, b`
    pub fn comiss_rr(&mut self, a: Xmm, b: Xmm) {
        self.sse_rr(None, 0x2F, a.num(), b.num());
    }

    /// `comiss a, [mem]`
    pub fn comiss_rm(&mut self, a: Xmm, mem: &Mem) {
        self.sse_rm(None, 0x2F, a.num(), mem);
    }

    /// `cvtsi2ss dst, src` converting a 32-bit integer register.
    pub fn cvtsi2ss(&mut self, dst: Xmm, src: Gp) {
        self.sse_rr(Some(0xF3), 0x2A, dst.num(), src.num());
    }

    // ------------------------------------------------------------------
    // x87 instructions (sin/cos/tan have no SSE encoding)

    fn x87_mem(&mut self, opcode: u8, ext: u8, mem: &Mem) {
        let (index, base) = Self::mem_rex_bits(mem);
        self.emit_rex(false, 0, index, base);
        self.emit_byte(opcode);
        self.emit_modrm_mem(ext, mem, 0);
    }

    /// `fld dword [mem]`
    pub fn fld_m32(&mut self, mem: &Mem) {
        self.x87_mem(0xD9, 0, mem);
    }

    /// `fstp dword [mem]`
    pub fn fstp_m32(&mut self, mem: &Mem) {
        self.x87_mem(0xD9, 3, mem);
    }

    /// `fstp st(0)`, dropping the top of the x87 stack.
    pub fn fstp_st0(&mut self) {
        self.emit_byte(0xDD);
        self.emit_byte(0xD8);
    }

    /// `fsin`
    pub fn fsin(&mut self) {
        self.emit_byte(0xD9);
        self.emit_byte(0xFE);
    }

    /// `fcos`
    pub fn fcos(&mut self) {
        self.emit_byte(0xD9);
        self.emit_byte(0xFF);
    }

    /// `fptan`, which pushes the result and then 1.0.
    pub fn fptan(&mut self) {
        self.emit_byte(0xD9);
        self.emit_byte(0xF2);
    }

    // ------------------------------------------------------------------
    // branches

    /// `jmp label` (rel32)
    pub fn jmp(&mut self, label: Label) {
        self.emit_byte(0xE9);
        self.emit_label_disp(label, 4);
    }

    /// `jmp label` (rel8)
    pub fn jmp_short(&mut self, label: Label) {
        self.emit_byte(0xEB);
        self.emit_label_disp(label, 1);
    }

    /// `jcc label` (rel32)
    pub fn jcc(&mut self, cond: Cond, label: Label) {
        self.emit_byte(0x0F);
        self.emit_byte(0x80 + cond.code());
        self.emit_label_disp(label, 4);
    }

    /// `jcc label` (rel8)
    pub fn jcc_short(&mut self, cond: Cond, label: Label) {
        self.emit_byte(0x70 + cond.code());
        self.emit_label_disp(label, 1);
    }
}
