use log::debug;

use crate::callback::Callback;
use crate::token::{Op, PackedToken};
use crate::Value;

/// Append-only builder for the reverse polish stream.
///
/// The builder keeps track of the logical stack position while tokens are
/// added and records the highest position ever reached, which determines
/// the stack size an evaluator has to provide. [`finalize`](Rpn::finalize)
/// seals the stream and patches the branch offsets of the ternary
/// conditional.
pub struct Rpn {
    tokens: Vec<PackedToken>,
    stack_pos: i32,
    max_stack: i32,
}

impl Rpn {
    pub fn new() -> Rpn {
        Rpn {
            tokens: Vec::with_capacity(64),
            stack_pos: 0,
            max_stack: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn push(&mut self, op: Op) {
        self.tokens.push(PackedToken {
            stack_pos: self.stack_pos,
            op,
        });
    }

    pub fn push_val(&mut self, value: Value) {
        self.stack_pos += 1;
        self.max_stack = self.max_stack.max(self.stack_pos);
        self.push(Op::Val(value));
    }

    pub fn push_var(&mut self, cell: *const Value) {
        self.stack_pos += 1;
        self.max_stack = self.max_stack.max(self.stack_pos);
        self.push(Op::Var(cell));
    }

    /// Adds a binary operator token; consumes two slots, produces one.
    pub fn push_bin(&mut self, op: Op) {
        debug_assert!(op.is_binary());
        self.stack_pos -= 1;
        self.push(op);
    }

    /// Adds a unary intrinsic token; operates on the top slot in place.
    pub fn push_intrinsic(&mut self, op: Op) {
        debug_assert!(op.is_intrinsic());
        self.push(op);
    }

    /// Adds a function call consuming `argc` slots and producing one.
    pub fn push_fun(&mut self, fun: Callback, argc: u8) {
        self.stack_pos = self.stack_pos - i32::from(argc) + 1;
        self.max_stack = self.max_stack.max(self.stack_pos);
        self.push(Op::Fun { fun, argc });
    }

    /// Adds an `If` or `Else` marker with a placeholder offset, or an
    /// `EndIf` marker. `If` and `Else` consume the slot holding the
    /// condition or branch value.
    pub fn push_branch(&mut self, op: Op) {
        self.push(op);
        match op {
            Op::If(_) | Op::Else(_) => self.stack_pos -= 1,
            Op::EndIf => {}
            _ => debug_assert!(false, "not a branch token: {:?}", op),
        }
    }

    /// Drops the trailing `count` tokens, which must all be value tokens.
    /// Used by the constant folder to replace arguments with a result.
    pub fn pop_val_entries(&mut self, count: usize) {
        debug_assert!(self
            .tokens
            .iter()
            .rev()
            .take(count)
            .all(|t| match t.op {
                Op::Val(_) => true,
                _ => false,
            }));

        let len = self.tokens.len() - count;
        self.tokens.truncate(len);
        self.stack_pos -= count as i32;
    }

    /// Appends the end marker, resolves the conditional jump offsets and
    /// returns the immutable program.
    ///
    /// After finalization every `If` offset is the distance to its
    /// matching `Else` and every `Else` offset the distance to its
    /// matching `EndIf`, both relative to the token's own position.
    pub fn finalize(mut self) -> Program {
        let result_slot = self.stack_pos.max(1);
        self.push(Op::End);

        let mut st_if = Vec::new();
        let mut st_else = Vec::new();

        for i in 0..self.tokens.len() {
            match self.tokens[i].op {
                Op::If(_) => st_if.push(i),
                Op::Else(_) => {
                    let idx = st_if.pop().expect("unbalanced conditional");
                    self.tokens[idx].op = Op::If((i - idx) as i32);
                    st_else.push(i);
                }
                Op::EndIf => {
                    let idx = st_else.pop().expect("unbalanced conditional");
                    self.tokens[idx].op = Op::Else((i - idx) as i32);
                }
                _ => {}
            }
        }
        debug_assert!(st_if.is_empty() && st_else.is_empty());

        Program {
            tokens: self.tokens,
            max_stack: self.max_stack,
            result_slot,
        }
    }
}

impl Default for Rpn {
    fn default() -> Rpn {
        Rpn::new()
    }
}

/// A finalized reverse polish program.
pub struct Program {
    tokens: Vec<PackedToken>,
    max_stack: i32,
    result_slot: i32,
}

impl Program {
    pub fn tokens(&self) -> &[PackedToken] {
        &self.tokens
    }

    /// Slot holding the final result. This is 1 except when an argument
    /// separator chains several sub-expressions at the top level, in
    /// which case the last sub-expression's slot is returned.
    pub fn result_slot(&self) -> usize {
        self.result_slot as usize
    }

    /// Number of stack slots an evaluation needs, including the reserved
    /// slot 0.
    pub fn stack_size(&self) -> usize {
        (self.max_stack + 1) as usize
    }

    /// Logs a human readable listing of the token stream.
    pub fn dump(&self) {
        debug!("rpn: {} tokens, stack size {}", self.tokens.len(), self.stack_size());
        for (i, tok) in self.tokens.iter().enumerate() {
            debug!("{:4}: stack[{}] {:?}", i, tok.stack_pos, tok.op);
        }
    }
}
