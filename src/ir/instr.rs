//! Tagged-variant instruction model.
//!
//! Mirrors the "polymorphism over IR nodes" design note: rather than
//! runtime down-casts on an abstract instruction base class, every node the
//! analysis can observe is one variant of [`ValueKind`], addressed by a
//! dense [`ValueId`] into the owning [`crate::ir::Function`]'s arena.

/// Identifies a value within a single function's arena. Two operands that
/// refer to "the same IR value" compare equal `ValueId`s; this is the
/// identity notion wait-matching and the overlap check rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

/// Identifies a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// Binary operators recognized on integer operands. Only used to identify
/// that a count operand is non-constant; the specific operator never
/// drives a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Shl,
    And,
    Or,
}

/// Comparison predicates. Branch pruning only cares about `Ne`, but the IR
/// models the full family since any of them may appear as a conditional
/// branch's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The tagged union of node kinds the analysis inspects. Variants split
/// into two groups:
///
/// - "free" values (`Global`, `ConstantInt`, `ConstantNullPtr`,
///   `ConstantExpr`) are not sequenced in any block's instruction list,
///   mirroring how LLVM constants are not themselves `Instruction`s.
/// - "placed" values sit in exactly one [`super::BasicBlock`]'s
///   instruction list, in program order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A named global value (free).
    Global { name: String },
    /// A constant integer (free).
    ConstantInt { value: i64 },
    /// The null pointer constant (free).
    ConstantNullPtr,
    /// A constant expression wrapping a single address-producing operand
    /// (free; recursed into during root-pointer tracing exactly like a
    /// bitcast).
    ConstantExpr { operand: ValueId },

    /// Stack allocation (placed).
    Alloca,
    /// Pointer cast with no arithmetic (placed).
    Bitcast { operand: ValueId },
    /// Address arithmetic. `operands[0]` is the base pointer; the rest are
    /// index operands, matching the LLVM `getelementptr` operand layout the
    /// original analysis walks with `getOperand(i)`.
    Gep { operands: Vec<ValueId> },
    /// Memory load from `addr`, whose pointee type is `pointee`.
    Load { addr: ValueId, pointee: crate::ir::types::Type },
    /// Memory store of `value` to `addr`, whose pointee type is `pointee`
    /// (mirroring the pointer operand's static type, as for `Load`).
    Store { addr: ValueId, value: ValueId, pointee: crate::ir::types::Type },
    /// A binary arithmetic or logical operator.
    BinaryOp { op: BinOp, lhs: ValueId, rhs: ValueId },
    /// An integer comparison.
    Cmp { pred: CmpPred, lhs: ValueId, rhs: ValueId },
    /// A call to a (possibly unresolved) named callee.
    Call { callee: Option<String>, args: Vec<ValueId> },
}

impl ValueKind {
    /// True for the "free" constant-like kinds that never appear in a
    /// block's instruction list.
    pub fn is_free(&self) -> bool {
        matches!(
            self,
            ValueKind::Global { .. }
                | ValueKind::ConstantInt { .. }
                | ValueKind::ConstantNullPtr
                | ValueKind::ConstantExpr { .. }
        )
    }

    /// The resolved callee name, if this is a call with a statically
    /// known target. Calls through function pointers (no resolvable name)
    /// yield `None`.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            ValueKind::Call { callee, .. } => callee.as_deref(),
            _ => None,
        }
    }

    /// Argument list of a call, if this is one.
    pub fn call_args(&self) -> Option<&[ValueId]> {
        match self {
            ValueKind::Call { args, .. } => Some(args),
            _ => None,
        }
    }

    /// The base pointer operand of a `getelementptr`, if this is one.
    pub fn gep_base(&self) -> Option<ValueId> {
        match self {
            ValueKind::Gep { operands } => operands.first().copied(),
            _ => None,
        }
    }

    /// The full operand list of a `getelementptr` (base followed by
    /// indices), if this is one.
    pub fn gep_operands(&self) -> Option<&[ValueId]> {
        match self {
            ValueKind::Gep { operands } => Some(operands),
            _ => None,
        }
    }

    /// The constant integer value, if this is a `ConstantInt`.
    pub fn as_constant_int(&self) -> Option<i64> {
        match self {
            ValueKind::ConstantInt { value } => Some(*value),
            _ => None,
        }
    }
}

/// A basic block's terminator. Every block has exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional branch to a single successor.
    Br(BlockId),
    /// Conditional branch: `if_true` is taken when `cond` is non-zero.
    CondBr {
        cond: ValueId,
        if_true: BlockId,
        if_false: BlockId,
    },
}

impl Terminator {
    /// Successor blocks in order, matching `TI->getSuccessor(i)` for
    /// `i` in `0..getNumSuccessors()`.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr { if_true, if_false, .. } => vec![*if_true, *if_false],
        }
    }
}
