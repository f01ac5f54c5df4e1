//! The in-memory IR data model the analysis core operates over.
//!
//! This stands in for a compiled low-level IR: modules hold an ordered
//! sequence of functions, functions an ordered sequence of basic blocks,
//! blocks an ordered sequence of instructions plus a single terminator.
//! Loading this representation from on-disk input is [`crate::loader`]'s
//! job; constructing it directly is [`builder`]'s.

pub mod builder;
mod instr;
mod module;
pub mod types;

pub use instr::{BinOp, BlockId, CmpPred, Terminator, ValueId, ValueKind};
pub use module::{BasicBlock, Function, Module, ValueData};
pub use types::{DebugLoc, MpiDatatype, Type};
