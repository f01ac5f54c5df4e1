//! The race-detection engine: wait identification, guarded region
//! traversal, and the buffer-overlap test. Grounded on
//! `MPINonblockingCall::doDataRaceDetection` and its helpers in
//! `analyzer/src/lib/mpicall.cc`.

use std::collections::{HashSet, VecDeque};

use itertools::Itertools;

use crate::ir::{BlockId, CmpPred, Function, Terminator, ValueId, ValueKind};

use super::classify::{ClassifiedCalls, NonBlockingCall};
use super::matching::is_matched_request;
use super::utils::{self, access_size_from_pointee, is_constant_idx, is_reachable, is_stl_indexed_access};

/// A single confirmed data race: the non-blocking call whose buffer is
/// still pending, and the instruction that accesses it on some path
/// before the matching wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceReport {
    pub nonblocking_call: ValueId,
    pub offending_instruction: ValueId,
}

/// Run the engine over every non-blocking call in `function`, in
/// program order, returning every confirmed race in discovery order.
pub fn detect_races(function: &Function, calls: &ClassifiedCalls) -> Vec<RaceReport> {
    let ids = calls.non_blocking.keys().copied().sorted_by_key(|id| id.0);

    let mut reports = Vec::new();
    for id in ids {
        let n = &calls.non_blocking[&id];
        reports.extend(detect_races_for_call(function, calls, n));
    }
    reports
}

/// Find the wait call(s) that complete `n`'s request.
fn identify_matched_waits(function: &Function, calls: &ClassifiedCalls, n: &NonBlockingCall) -> Vec<ValueId> {
    for id in function.instructions_after(n.call) {
        if let Some(wait) = calls.wait.get(&id) {
            if is_matched_request(function, wait, n.request) {
                return vec![id];
            }
        }
    }

    let mut waits = Vec::new();
    let mut visited = HashSet::new();
    let start = function.block_of(n.call).expect("non-blocking call must be placed");
    let mut queue: VecDeque<BlockId> = utils::successor_blocks(function, start).into();
    while let Some(cur) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        let mut matched_here = false;
        for &id in &function.block(cur).instructions {
            if let Some(wait) = calls.wait.get(&id) {
                if is_matched_request(function, wait, n.request) {
                    waits.push(id);
                    matched_here = true;
                    break;
                }
            }
        }
        if !matched_here {
            for succ in utils::successor_blocks(function, cur) {
                queue.push_back(succ);
            }
        }
    }
    waits
}

/// Branch pruning on `N`'s own terminator. If the condition is
/// `N != 0` (in either operand order), the successor taken when the
/// comparison is true ("the call failed") is removed from `frontier`.
fn prune_failure_branch(function: &Function, block: BlockId, n: &NonBlockingCall, frontier: &mut Vec<BlockId>) {
    let Terminator::CondBr { cond, if_true, .. } = &function.block(block).terminator else {
        return;
    };
    let ValueKind::Cmp { pred: CmpPred::Ne, lhs, rhs } = function.kind(*cond) else {
        return;
    };
    let is_call_vs_zero = |a: ValueId, b: ValueId| a == n.call && function.kind(b).as_constant_int() == Some(0);
    if is_call_vs_zero(*lhs, *rhs) || is_call_vs_zero(*rhs, *lhs) {
        let if_true = *if_true;
        frontier.retain(|&b| b != if_true);
    }
}

/// Successors of `block` admitted into the region frontier toward
/// `wait_block`: only those from which `wait_block` is still reachable.
fn reachable_successors(function: &Function, block: BlockId, wait_block: BlockId) -> Vec<BlockId> {
    utils::successor_blocks(function, block)
        .into_iter()
        .filter(|&succ| is_reachable(function, succ, wait_block))
        .collect()
}

/// Traverse the region `[N, W)` for one matched wait `W`,
/// checking every instruction encountered against `N`'s pending buffer.
fn traverse_region(function: &Function, calls: &ClassifiedCalls, n: &NonBlockingCall, wait: ValueId, wait_ids: &HashSet<ValueId>, reports: &mut Vec<RaceReport>) {
    for id in function.instructions_after(n.call) {
        if wait_ids.contains(&id) {
            return;
        }
        check_instruction(function, calls, n, id, reports);
    }

    let wait_block = function.block_of(wait).expect("wait call must be placed");
    let start = function.block_of(n.call).expect("non-blocking call must be placed");

    let mut frontier = reachable_successors(function, start, wait_block);
    prune_failure_branch(function, start, n, &mut frontier);

    let mut visited = HashSet::new();
    let mut queue: VecDeque<BlockId> = frontier.into();
    while let Some(cur) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        let mut stop = false;
        for &id in &function.block(cur).instructions {
            if wait_ids.contains(&id) {
                stop = true;
                break;
            }
            check_instruction(function, calls, n, id, reports);
        }
        if stop {
            continue;
        }
        for succ in reachable_successors(function, cur, wait_block) {
            queue.push_back(succ);
        }
    }
}

fn detect_races_for_call(function: &Function, calls: &ClassifiedCalls, n: &NonBlockingCall) -> Vec<RaceReport> {
    let waits = identify_matched_waits(function, calls, n);
    let wait_ids: HashSet<ValueId> = waits.iter().copied().collect();

    let mut reports = Vec::new();
    for &wait in &waits {
        traverse_region(function, calls, n, wait, &wait_ids, &mut reports);
    }
    reports
}

/// Determine a candidate `(ptr, size)` to check instruction `id`
/// against `n`'s pending buffer, then run the overlap test.
fn check_instruction(function: &Function, calls: &ClassifiedCalls, n: &NonBlockingCall, id: ValueId, reports: &mut Vec<RaceReport>) {
    let candidate = if n.is_write {
        candidate_for_write(function, calls, n, id)
    } else {
        candidate_for_read(function, calls, id)
    };

    let Some((ptr, size)) = candidate else {
        return;
    };

    if buffer_overlap(function, ptr, size, n.buffer, n.buffer_size) {
        reports.push(RaceReport { nonblocking_call: n.call, offending_instruction: id });
    }
}

/// Candidates for a write (non-blocking receive): loads, stores, and
/// calls whose record names a buffer.
fn candidate_for_write(function: &Function, calls: &ClassifiedCalls, n: &NonBlockingCall, id: ValueId) -> Option<(ValueId, u64)> {
    match function.kind(id) {
        ValueKind::Load { addr, pointee } => Some((*addr, access_size_from_pointee(pointee))),
        ValueKind::Store { addr, pointee, .. } => Some((*addr, access_size_from_pointee(pointee))),
        ValueKind::Call { .. } => {
            if id == n.call && !loop_invariant_buffer(function, n) {
                // `N` revisited inside its own loop body with a buffer
                // address that may vary across iterations: skip rather
                // than risk a false positive against a moving target.
                return None;
            }
            if let Some(nb) = calls.non_blocking.get(&id) {
                return Some((nb.buffer, nb.buffer_size));
            }
            if let Some(bc) = calls.blocking.get(&id) {
                return Some((bc.buffer, bc.buffer_size));
            }
            None
        }
        _ => None,
    }
}

/// Candidates for a read (non-blocking send): only stores and calls
/// whose record marks a write.
fn candidate_for_read(function: &Function, calls: &ClassifiedCalls, id: ValueId) -> Option<(ValueId, u64)> {
    match function.kind(id) {
        ValueKind::Store { addr, pointee, .. } => Some((*addr, access_size_from_pointee(pointee))),
        ValueKind::Call { .. } => calls
            .non_blocking
            .get(&id)
            .filter(|nb| nb.is_write)
            .map(|nb| (nb.buffer, nb.buffer_size)),
        _ => None,
    }
}

/// Approximates whether `n`'s buffer address is loop-invariant, for the
/// case where the traversal wraps back around to `N` itself: a
/// getelementptr buffer with all-constant indices, or an STL-indexed-access
/// call with a constant index, are treated as invariant; anything else is
/// conservatively treated as variant.
fn loop_invariant_buffer(function: &Function, n: &NonBlockingCall) -> bool {
    match function.kind(n.buffer) {
        ValueKind::Gep { .. } => is_constant_idx(function, n.buffer),
        ValueKind::Call { callee: Some(name), args } if is_stl_indexed_access(name) => {
            matches!(args.get(1).map(|&idx| function.kind(idx).as_constant_int()), Some(Some(_)))
        }
        _ => false,
    }
}

/// The original's gep index-by-index comparison, used
/// when both `ptr` and `buffer` are getelementptr nodes with the same
/// operand count.
fn gep_indices_compatible(function: &Function, ptr_operands: &[ValueId], buf_operands: &[ValueId], size: u64, buffer_size: u64) -> bool {
    for (&opd0, &opd1) in ptr_operands[1..].iter().zip(&buf_operands[1..]) {
        if opd0 == opd1 {
            continue;
        }
        let (c0, c1) = (function.kind(opd0).as_constant_int(), function.kind(opd1).as_constant_int());
        if let (Some(v0), Some(v1)) = (c0, c1) {
            if size != 0 && buffer_size != 0 {
                let (v0, v1) = (v0 as u64, v1 as u64);
                let contains = (v0 <= v1 && v1 + buffer_size <= v0 + size) || (v1 <= v0 && v0 + size <= v1 + buffer_size);
                if contains {
                    continue;
                }
            }
        }
        return false;
    }
    true
}

/// The buffer-overlap test.
fn buffer_overlap(function: &Function, ptr: ValueId, size: u64, buffer: ValueId, buffer_size: u64) -> bool {
    if matches!(function.kind(ptr), ValueKind::ConstantNullPtr) {
        return false;
    }

    if let (Some(ptr_operands), Some(buf_operands)) = (function.kind(ptr).gep_operands(), function.kind(buffer).gep_operands()) {
        if ptr_operands.len() == buf_operands.len() {
            if !gep_indices_compatible(function, ptr_operands, buf_operands, size, buffer_size) {
                return false;
            }
            let (base0, base1) = (ptr_operands[0], buf_operands[0]);
            if base0 == base1 {
                return true;
            }
            return match (function.kind(base0).gep_operands(), function.kind(base1).gep_operands()) {
                (Some(b0), Some(b1)) => b0.len() == b1.len() && b0.iter().zip(b1).all(|(a, b)| a == b),
                _ => false,
            };
        }
    }

    let ptr_roots = utils::collect_root_pointers(function, ptr);
    let buffer_roots = utils::collect_root_pointers(function, buffer);
    ptr_roots.intersection(&buffer_roots).any(|&root| !matches!(function.kind(root), ValueKind::ConstantNullPtr))
}
