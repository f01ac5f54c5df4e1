//! Pure predicates and helpers over the IR.
//!
//! Grounded on `analyzer/src/lib/common.cc` in the original implementation:
//! this is the one file that talks to raw CFG/value structure directly, so
//! every other component builds on top of it rather than re-deriving these
//! facts.

use std::collections::{HashSet, VecDeque};

use crate::diagnostics::Diagnostic;
use crate::ir::{BlockId, Function, MpiDatatype, Type, ValueId, ValueKind};

/// Callee names recognized as non-blocking communication calls.
pub const NONBLOCKING_APIS: &[&str] = &["send_nb", "readysend_nb", "recv_nb"];
/// Callee names recognized as blocking communication calls.
pub const BLOCKING_APIS: &[&str] = &["send_blocking", "recv_blocking"];
/// Callee names recognized as wait calls.
pub const WAIT_APIS: &[&str] = &["wait", "wait_all", "wait_any"];
/// Callee names among the above whose buffer direction is a write (the
/// call fills the buffer rather than reading from it).
pub const WRITE_APIS: &[&str] = &["recv_nb", "recv_blocking"];
/// Mangled symbols recognized as an indexed-access operator on an STL
/// container, e.g. `std::vector<int>::operator[]`.
const STL_INDEXED_ACCESS: &[&str] = &["_ZNSt6vectorIiSaIiEEixEm"];

pub fn is_nonblocking_api(name: &str) -> bool {
    NONBLOCKING_APIS.contains(&name)
}

pub fn is_blocking_api(name: &str) -> bool {
    BLOCKING_APIS.contains(&name)
}

pub fn is_wait_api(name: &str) -> bool {
    WAIT_APIS.contains(&name)
}

pub fn is_write_api(name: &str) -> bool {
    WRITE_APIS.contains(&name)
}

pub fn is_stl_indexed_access(name: &str) -> bool {
    STL_INDEXED_ACCESS.contains(&name)
}

/// Successor blocks of `block`, in terminator order.
pub fn successor_blocks(function: &Function, block: BlockId) -> Vec<BlockId> {
    function.raw_successors(block)
}

/// Predecessor blocks of `block`.
pub fn predecessor_blocks(function: &Function, block: BlockId) -> Vec<BlockId> {
    function.raw_predecessors(block)
}

/// True if `dst` is `src`, or reachable from `src` via a forward BFS over
/// the CFG starting at `src`'s successors.
pub fn is_reachable(function: &Function, src: BlockId, dst: BlockId) -> bool {
    if src == dst {
        return true;
    }
    let mut visited = HashSet::new();
    let mut queue: VecDeque<BlockId> = successor_blocks(function, src).into();
    while let Some(cur) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        if cur == dst {
            return true;
        }
        for succ in successor_blocks(function, cur) {
            queue.push_back(succ);
        }
    }
    false
}

/// True if both values are loads from the same address operand.
pub fn is_load_from_same_addr(function: &Function, a: ValueId, b: ValueId) -> bool {
    match (function.kind(a), function.kind(b)) {
        (ValueKind::Load { addr: addr_a, .. }, ValueKind::Load { addr: addr_b, .. }) => addr_a == addr_b,
        _ => false,
    }
}

/// True if every index operand of a `getelementptr` (and, recursively, of
/// a `getelementptr` base) is a constant integer.
pub fn is_constant_idx(function: &Function, gep: ValueId) -> bool {
    let Some(operands) = function.kind(gep).gep_operands() else {
        return false;
    };
    let base = operands[0];
    if matches!(function.kind(base), ValueKind::Gep { .. }) && !is_constant_idx(function, base) {
        return false;
    }
    operands[1..].iter().all(|&idx| function.kind(idx).as_constant_int().is_some())
}

/// Derive a communication buffer's access size in bytes from its `(count,
/// datatype)` operand pair. Falls back to `0` — disabling
/// constant-offset overlap reasoning for this call — when the count is
/// non-constant or the datatype tag is unrecognized.
pub fn parse_access_size(function: &Function, count: ValueId, datatype: ValueId) -> u64 {
    let count_value = function.kind(count).as_constant_int().map(|v| v.max(0) as u64).unwrap_or(0);

    if let ValueKind::ConstantInt { value } = function.kind(datatype) {
        if let Some(dt) = MpiDatatype::from_tag(*value as u64) {
            return count_value * dt.byte_size();
        }
    } else if matches!(function.kind(datatype), ValueKind::Load { .. }) {
        // A derived datatype loaded from memory: unsupported, but not
        // worth a diagnostic on its own (original returns silently here).
        return 0;
    }

    Diagnostic::warning(format!("unsupported MPI_Datatype operand: {:?}", function.kind(datatype))).emit();
    0
}

/// Derive an access size in bytes from a pointee type.
pub fn access_size_from_pointee(ty: &Type) -> u64 {
    let size = ty.access_size();
    if size == 0 && !matches!(ty, Type::Int(0)) {
        Diagnostic::warning(format!("unsupported pointer element type: {ty:?}")).emit();
    }
    size
}

/// Walk a pointer expression back to its root values. A deliberately
/// local, syntactic approximation — not an alias analysis.
pub fn collect_root_pointers(function: &Function, ptr: ValueId) -> HashSet<ValueId> {
    let mut roots = HashSet::new();
    collect_root_pointers_into(function, ptr, &mut roots);
    roots
}

fn collect_root_pointers_into(function: &Function, ptr: ValueId, roots: &mut HashSet<ValueId>) {
    match function.kind(ptr) {
        ValueKind::Alloca | ValueKind::Global { .. } | ValueKind::ConstantNullPtr => {
            roots.insert(ptr);
        }
        ValueKind::Bitcast { operand } => collect_root_pointers_into(function, *operand, roots),
        ValueKind::Gep { operands } => collect_root_pointers_into(function, operands[0], roots),
        ValueKind::ConstantExpr { operand } => collect_root_pointers_into(function, *operand, roots),
        ValueKind::Call { callee, args } => match callee.as_deref() {
            Some("malloc") => {
                roots.insert(ptr);
            }
            Some(name) if is_stl_indexed_access(name) => {
                if let Some(&container) = args.first() {
                    roots.insert(container);
                }
            }
            _ => {
                Diagnostic::warning(format!("unsupported call in collect_root_pointers: {callee:?}")).emit();
            }
        },
        ValueKind::Load { addr, .. } => collect_root_pointers_from_load(function, ptr, *addr, roots),
        other => {
            Diagnostic::warning(format!("unsupported pointer in collect_root_pointers: {other:?}")).emit();
        }
    }
}

/// The load-specific branch of [`collect_root_pointers_into`]: search
/// backward for the most recent store to `addr`, first within the load's
/// own block, then by BFS over predecessor blocks. Matches each walked
/// path's behavior rather than stopping at the first match across the
/// whole BFS, since independent predecessor paths may each contribute a
/// distinct root.
fn collect_root_pointers_from_load(function: &Function, load: ValueId, addr: ValueId, roots: &mut HashSet<ValueId>) {
    let Some(block) = function.block_of(load) else {
        return;
    };
    let idx = function.index_in_block(load).expect("placed value must have an index");

    if let Some(store_value) = find_store_backward(&function.block(block).instructions[..idx], function, addr) {
        collect_root_pointers_into(function, store_value, roots);
        return;
    }

    let mut visited = HashSet::new();
    let mut queue: VecDeque<BlockId> = predecessor_blocks(function, block).into();
    while let Some(cur) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        if let Some(store_value) = find_store_backward(&function.block(cur).instructions, function, addr) {
            collect_root_pointers_into(function, store_value, roots);
        } else {
            for pred in predecessor_blocks(function, cur) {
                queue.push_back(pred);
            }
        }
    }
}

/// Find the closest-preceding store to `addr` by scanning `instructions`
/// back to front.
fn find_store_backward(instructions: &[ValueId], function: &Function, addr: ValueId) -> Option<ValueId> {
    instructions.iter().rev().find_map(|&id| match function.kind(id) {
        ValueKind::Store { addr: store_addr, value, .. } if *store_addr == addr => Some(*value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FunctionBuilder;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    /// Build a CFG with one block per (clamped, non-empty) entry of `adj`,
    /// each branching to up to two successors chosen from `adj[i]` modulo
    /// the block count; blocks with no listed successor self-loop.
    fn build_graph(adj: &[Vec<u8>]) -> (Function, Vec<BlockId>) {
        let n = adj.len().clamp(1, 8);
        let mut fb = FunctionBuilder::new("f");
        let mut blocks = vec![fb.entry()];
        for _ in 1..n {
            blocks.push(fb.new_block());
        }
        for (i, block) in blocks.iter().copied().enumerate().take(n) {
            let succs: Vec<BlockId> = adj
                .get(i)
                .into_iter()
                .flatten()
                .map(|&x| blocks[(x as usize) % n])
                .collect();
            match succs.as_slice() {
                [] => fb.br(block, block),
                [only] => fb.br(block, *only),
                [a, b, ..] => {
                    let cond = fb.const_int(1);
                    fb.cond_br(block, cond, *a, *b);
                }
            }
        }
        (fb.build().unwrap(), blocks)
    }

    #[quickcheck]
    fn reachable_matches_fixpoint_closure(adj: Vec<Vec<u8>>) -> TestResult {
        if adj.is_empty() {
            return TestResult::discard();
        }
        let (f, blocks) = build_graph(&adj);
        let n = blocks.len();

        let mut reach = vec![vec![false; n]; n];
        for (i, row) in reach.iter_mut().enumerate() {
            row[i] = true;
        }
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                for succ in f.raw_successors(blocks[i]) {
                    let j = blocks.iter().position(|&b| b == succ).unwrap();
                    for k in 0..n {
                        if reach[j][k] && !reach[i][k] {
                            reach[i][k] = true;
                            changed = true;
                        }
                    }
                }
            }
        }

        for i in 0..n {
            for j in 0..n {
                if is_reachable(&f, blocks[i], blocks[j]) != reach[i][j] {
                    return TestResult::failed();
                }
            }
        }
        TestResult::passed()
    }

    fn diamond() -> (Function, BlockId, BlockId, BlockId, BlockId) {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let left = fb.new_block();
        let right = fb.new_block();
        let join = fb.new_block();
        let cond = fb.const_int(1);
        fb.cond_br(entry, cond, left, right);
        fb.br(left, join);
        fb.br(right, join);
        fb.br(join, join); // self-loop terminator to keep `join` well-formed
        (fb.build().unwrap(), entry, left, right, join)
    }

    #[test]
    fn reachable_reflexive_for_every_block() {
        let (f, entry, left, right, join) = diamond();
        assert!(is_reachable(&f, entry, entry));
        assert!(is_reachable(&f, left, left));
        assert!(is_reachable(&f, right, right));
        assert!(is_reachable(&f, join, join));
    }

    #[test]
    fn reachable_matches_transitive_closure() {
        let (f, entry, left, right, join) = diamond();
        assert!(is_reachable(&f, entry, left));
        assert!(is_reachable(&f, entry, right));
        assert!(is_reachable(&f, entry, join));
        assert!(is_reachable(&f, left, join));
        assert!(!is_reachable(&f, left, right));
        assert!(!is_reachable(&f, join, entry));
    }

    #[test]
    fn constant_idx_true_for_all_constant_indices() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let base = fb.alloca(entry);
        let i0 = fb.const_int(0);
        let i1 = fb.const_int(2);
        let gep = fb.gep(entry, base, &[i0, i1]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();
        assert!(is_constant_idx(&f, gep));
    }

    #[test]
    fn constant_idx_false_for_non_constant_index() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let base = fb.alloca(entry);
        let dyn_idx = fb.alloca(entry); // not a ConstantInt
        let gep = fb.gep(entry, base, &[dyn_idx]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();
        assert!(!is_constant_idx(&f, gep));
    }

    #[test]
    fn parse_access_size_known_tag() {
        let mut fb = FunctionBuilder::new("f");
        let count = fb.const_int(16);
        let dt = fb.const_int(0x4c000101); // char
        fb.br(fb.entry(), fb.entry());
        let f = fb.build().unwrap();
        assert_eq!(parse_access_size(&f, count, dt), 16);
    }

    #[test]
    fn parse_access_size_unknown_tag_is_zero() {
        let mut fb = FunctionBuilder::new("f");
        let count = fb.const_int(16);
        let dt = fb.const_int(0xdead);
        fb.br(fb.entry(), fb.entry());
        let f = fb.build().unwrap();
        assert_eq!(parse_access_size(&f, count, dt), 0);
    }

    #[test]
    fn collect_root_pointers_through_bitcast_and_gep() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let alloc = fb.alloca(entry);
        let cast = fb.bitcast(entry, alloc);
        let idx = fb.const_int(0);
        let gep = fb.gep(entry, cast, &[idx]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();
        let roots = collect_root_pointers(&f, gep);
        assert_eq!(roots, std::iter::once(alloc).collect());
    }

    #[test]
    fn collect_root_pointers_through_stored_handle() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let slot = fb.alloca(entry);
        let target = fb.alloca(entry);
        fb.store(entry, slot, target, Type::Ptr(Box::new(Type::Other)));
        let loaded = fb.load(entry, slot, Type::Ptr(Box::new(Type::Other)));
        fb.br(entry, entry);
        let f = fb.build().unwrap();
        let roots = collect_root_pointers(&f, loaded);
        assert_eq!(roots, std::iter::once(target).collect());
    }
}
