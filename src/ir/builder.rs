//! Programmatic IR construction, standing in for a compiler front end.
//!
//! The test suite builds CFGs for end-to-end scenarios with this builder
//! instead of parsing real bitcode, in the same spirit as the
//! teacher crate's `TransactionBuilder` (`fuel-tx`'s `builder` feature)
//! being used throughout `fuel-vm`'s own tests in place of hand-encoded
//! transactions.

use std::collections::HashMap;

use thiserror::Error;

use super::instr::{BinOp, BlockId, CmpPred, Terminator, ValueId, ValueKind};
use super::module::{BasicBlock, Function, Module, ValueData};
use super::types::{DebugLoc, Type};

/// Errors raised when finalizing a function built with [`FunctionBuilder`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    /// A block was never given a terminator before `build()`.
    #[error("block {0:?} has no terminator")]
    UnterminatedBlock(BlockId),
}

struct PendingBlock {
    instructions: Vec<ValueId>,
    terminator: Option<Terminator>,
}

/// Incrementally builds one [`Function`].
pub struct FunctionBuilder {
    name: String,
    values: Vec<ValueData>,
    blocks: Vec<PendingBlock>,
    globals: HashMap<String, ValueId>,
}

impl FunctionBuilder {
    /// Start a new function with a single, empty entry block (`BlockId(0)`).
    pub fn new(name: impl Into<String>) -> Self {
        FunctionBuilder {
            name: name.into(),
            values: Vec::new(),
            blocks: vec![PendingBlock { instructions: Vec::new(), terminator: None }],
            globals: HashMap::new(),
        }
    }

    /// The implicit entry block created by `new`.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Start a new, empty block and return its id.
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(PendingBlock { instructions: Vec::new(), terminator: None });
        BlockId(self.blocks.len() - 1)
    }

    fn push_free(&mut self, kind: ValueKind) -> ValueId {
        self.values.push(ValueData { kind, loc: None });
        ValueId(self.values.len() - 1)
    }

    fn push_placed(&mut self, block: BlockId, kind: ValueKind) -> ValueId {
        self.values.push(ValueData { kind, loc: None });
        let id = ValueId(self.values.len() - 1);
        self.blocks[block.0].instructions.push(id);
        id
    }

    /// Attach a debug location to a previously created value.
    pub fn with_loc(&mut self, value: ValueId, loc: DebugLoc) -> ValueId {
        self.values[value.0].loc = Some(loc);
        value
    }

    /// A named global, interned: repeated calls with the same name return
    /// the same [`ValueId`], matching LLVM's single `GlobalValue` per name.
    pub fn global(&mut self, name: impl Into<String>) -> ValueId {
        let name = name.into();
        if let Some(&id) = self.globals.get(&name) {
            return id;
        }
        let id = self.push_free(ValueKind::Global { name: name.clone() });
        self.globals.insert(name, id);
        id
    }

    pub fn const_int(&mut self, value: i64) -> ValueId {
        self.push_free(ValueKind::ConstantInt { value })
    }

    pub fn null_ptr(&mut self) -> ValueId {
        self.push_free(ValueKind::ConstantNullPtr)
    }

    pub fn constant_expr(&mut self, operand: ValueId) -> ValueId {
        self.push_free(ValueKind::ConstantExpr { operand })
    }

    pub fn alloca(&mut self, block: BlockId) -> ValueId {
        self.push_placed(block, ValueKind::Alloca)
    }

    pub fn bitcast(&mut self, block: BlockId, operand: ValueId) -> ValueId {
        self.push_placed(block, ValueKind::Bitcast { operand })
    }

    /// `base` followed by `indices`, matching the LLVM `getelementptr`
    /// operand layout (`operands[0]` is the base pointer).
    pub fn gep(&mut self, block: BlockId, base: ValueId, indices: &[ValueId]) -> ValueId {
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(base);
        operands.extend_from_slice(indices);
        self.push_placed(block, ValueKind::Gep { operands })
    }

    pub fn load(&mut self, block: BlockId, addr: ValueId, pointee: Type) -> ValueId {
        self.push_placed(block, ValueKind::Load { addr, pointee })
    }

    pub fn store(&mut self, block: BlockId, addr: ValueId, value: ValueId, pointee: Type) -> ValueId {
        self.push_placed(block, ValueKind::Store { addr, value, pointee })
    }

    pub fn binop(&mut self, block: BlockId, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push_placed(block, ValueKind::BinaryOp { op, lhs, rhs })
    }

    pub fn cmp(&mut self, block: BlockId, pred: CmpPred, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push_placed(block, ValueKind::Cmp { pred, lhs, rhs })
    }

    /// A call to `callee` (or an unresolved indirect call if `None`).
    pub fn call(&mut self, block: BlockId, callee: Option<&str>, args: &[ValueId]) -> ValueId {
        self.push_placed(
            block,
            ValueKind::Call { callee: callee.map(str::to_owned), args: args.to_vec() },
        )
    }

    pub fn br(&mut self, block: BlockId, target: BlockId) {
        self.blocks[block.0].terminator = Some(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, block: BlockId, cond: ValueId, if_true: BlockId, if_false: BlockId) {
        self.blocks[block.0].terminator = Some(Terminator::CondBr { cond, if_true, if_false });
    }

    /// Finalize the function. Fails if any block was left without a
    /// terminator.
    pub fn build(self) -> Result<Function, BuilderError> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (idx, pending) in self.blocks.into_iter().enumerate() {
            let terminator = pending
                .terminator
                .ok_or(BuilderError::UnterminatedBlock(BlockId(idx)))?;
            blocks.push(BasicBlock { instructions: pending.instructions, terminator });
        }
        Ok(Function::new(self.name, self.values, blocks))
    }
}

/// Incrementally builds one [`Module`].
#[derive(Default)]
pub struct ModuleBuilder {
    name: String,
    functions: Vec<Function>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleBuilder { name: name.into(), functions: Vec::new() }
    }

    pub fn add_function(&mut self, function: Function) -> &mut Self {
        self.functions.push(function);
        self
    }

    pub fn build(self) -> Module {
        Module { name: self.name, functions: self.functions }
    }
}
