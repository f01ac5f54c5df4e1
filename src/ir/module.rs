//! Module / function / basic-block containers and the CFG queries the
//! analysis is specified against: a module is an ordered sequence of
//! functions, a function an ordered sequence of basic blocks, a block an
//! ordered sequence of instructions plus a single terminator.

use std::collections::HashMap;

use super::instr::{BlockId, Terminator, ValueId, ValueKind};
use super::types::DebugLoc;

/// A single value's data: its kind and an optional source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueData {
    pub kind: ValueKind,
    pub loc: Option<DebugLoc>,
}

/// An ordered sequence of non-terminator instructions plus one terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub instructions: Vec<ValueId>,
    pub terminator: Terminator,
}

/// A function: a flat arena of values plus an ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub(crate) values: Vec<ValueData>,
    pub blocks: Vec<BasicBlock>,
    /// Cached map from a placed value to its enclosing block, built once at
    /// construction time since the IR is immutable afterwards.
    block_of: HashMap<ValueId, BlockId>,
}

impl Function {
    pub(crate) fn new(name: String, values: Vec<ValueData>, blocks: Vec<BasicBlock>) -> Self {
        let mut block_of = HashMap::new();
        for (idx, block) in blocks.iter().enumerate() {
            for &value in &block.instructions {
                block_of.insert(value, BlockId(idx));
            }
        }
        Function { name, values, blocks, block_of }
    }

    /// The kind of a value. Panics on an out-of-range id, which would
    /// indicate a bug in IR construction, not a condition the analysis
    /// should recover from.
    pub fn kind(&self, id: ValueId) -> &ValueKind {
        &self.values[id.0].kind
    }

    /// The debug location of a value, if any.
    pub fn loc(&self, id: ValueId) -> Option<&DebugLoc> {
        self.values[id.0].loc.as_ref()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    /// The block a placed value belongs to. `None` for free values
    /// (globals, constants) and for the non-blocking call's own return
    /// value is always `Some` since calls are placed instructions.
    pub fn block_of(&self, id: ValueId) -> Option<BlockId> {
        self.block_of.get(&id).copied()
    }

    /// Position of a placed value within its block's instruction list.
    pub fn index_in_block(&self, id: ValueId) -> Option<usize> {
        let block = self.block_of(id)?;
        self.block(block).instructions.iter().position(|&v| v == id)
    }

    /// Terminator successors of a block, in order. Fixed IR-contract
    /// query; the `addSuccessorBlocks`-style collection helpers live in
    /// [`crate::analysis::utils`].
    pub fn raw_successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).terminator.successors()
    }

    /// Predecessor blocks of a block: every block whose terminator lists
    /// it as a successor. Fixed IR-contract query.
    pub fn raw_predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.terminator.successors().contains(&id))
            .map(|(idx, _)| BlockId(idx))
            .collect()
    }

    /// All block ids, in program order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Iterate a block's placed instructions strictly after `after`, in
    /// program order, stopping at the block's end. Used by wait
    /// identification and region traversal to walk "the rest of this
    /// block".
    pub fn instructions_after<'a>(&'a self, after: ValueId) -> impl Iterator<Item = ValueId> + 'a {
        let start = self.index_in_block(after).map(|i| i + 1).unwrap_or(usize::MAX);
        let block = self.block_of(after);
        block
            .into_iter()
            .flat_map(move |b| self.block(b).instructions.iter().copied().skip(start))
    }
}

/// A compiled module: an ordered sequence of functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}
