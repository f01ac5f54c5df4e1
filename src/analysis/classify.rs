//! Recognizes communication calls by name and builds typed records for
//! them. Grounded on `analyzer/src/lib/mpicall.cc`'s three constructors,
//! reworked as a
//! single scanning pass instead of three classes each built from a raw
//! `CallBase`.

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::ir::{Function, ValueId, ValueKind};

use super::utils::{self, access_size_from_pointee, is_blocking_api, is_nonblocking_api, is_wait_api, parse_access_size};

/// A non-blocking send/receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonBlockingCall {
    pub call: ValueId,
    pub callee: String,
    pub buffer: ValueId,
    pub buffer_size: u64,
    pub is_write: bool,
    pub request: ValueId,
}

/// A blocking send/receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingCall {
    pub call: ValueId,
    pub callee: String,
    pub buffer: ValueId,
    pub buffer_size: u64,
    pub is_write: bool,
}

/// The wait-count operand of a [`WaitCall`]: either the implicit literal
/// `1` (`wait`, `wait_any`) or an explicit IR operand (`wait_all`'s first
/// argument). Kept distinct from a plain `ValueId` since the literal `1`
/// is not itself an IR value — the original analysis synthesizes a fresh
/// `ConstantInt` for it rather than reading one out of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCount {
    One,
    Operand(ValueId),
}

impl WaitCount {
    /// The count as a constant, if known.
    pub fn as_constant(&self, function: &Function) -> Option<i64> {
        match self {
            WaitCount::One => Some(1),
            WaitCount::Operand(id) => function.kind(*id).as_constant_int(),
        }
    }
}

/// A completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCall {
    pub call: ValueId,
    pub callee: String,
    pub wait_count: WaitCount,
    pub request: ValueId,
}

/// The three per-function registries built by [`classify_function`],
/// keyed by the originating call's `ValueId` (mirroring the original's
/// `map<CallBase *, ...>` registries).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifiedCalls {
    pub non_blocking: HashMap<ValueId, NonBlockingCall>,
    pub blocking: HashMap<ValueId, BlockingCall>,
    pub wait: HashMap<ValueId, WaitCall>,
}

/// Strip a single outer bitcast from a buffer-start pointer, matching
/// `CI->getArgOperand(0)` followed by one `dyn_cast<BitCastInst>` peel.
fn strip_one_bitcast(function: &Function, id: ValueId) -> ValueId {
    match function.kind(id) {
        ValueKind::Bitcast { operand } => *operand,
        _ => id,
    }
}

/// Scan every call instruction in `function`, in program order, and
/// classify it into the matching registry.
pub fn classify_function(function: &Function) -> ClassifiedCalls {
    let mut calls = ClassifiedCalls::default();

    for block in function.block_ids() {
        for &id in &function.block(block).instructions {
            let ValueKind::Call { callee: Some(callee), args } = function.kind(id) else {
                continue;
            };

            if is_nonblocking_api(callee) {
                if let Some(record) = build_nonblocking(function, id, callee, args) {
                    calls.non_blocking.insert(id, record);
                }
            } else if is_blocking_api(callee) {
                if let Some(record) = build_blocking(function, id, callee, args) {
                    calls.blocking.insert(id, record);
                }
            } else if is_wait_api(callee) {
                if let Some(record) = build_wait(id, callee, args) {
                    calls.wait.insert(id, record);
                }
            }
        }
    }

    calls
}

fn build_nonblocking(function: &Function, call: ValueId, callee: &str, args: &[ValueId]) -> Option<NonBlockingCall> {
    let (&buf, &count, &datatype, &request) = match (args.first(), args.get(1), args.get(2), args.get(6)) {
        (Some(buf), Some(count), Some(datatype), Some(request)) => (buf, count, datatype, request),
        _ => {
            Diagnostic::warning(format!("non-blocking call {callee} has too few arguments")).emit();
            return None;
        }
    };
    Some(NonBlockingCall {
        call,
        callee: callee.to_owned(),
        buffer: strip_one_bitcast(function, buf),
        buffer_size: parse_access_size(function, count, datatype),
        is_write: utils::is_write_api(callee),
        request,
    })
}

fn build_blocking(function: &Function, call: ValueId, callee: &str, args: &[ValueId]) -> Option<BlockingCall> {
    let (&buf, &count, &datatype) = match (args.first(), args.get(1), args.get(2)) {
        (Some(buf), Some(count), Some(datatype)) => (buf, count, datatype),
        _ => {
            Diagnostic::warning(format!("blocking call {callee} has too few arguments")).emit();
            return None;
        }
    };
    Some(BlockingCall {
        call,
        callee: callee.to_owned(),
        buffer: strip_one_bitcast(function, buf),
        buffer_size: parse_access_size(function, count, datatype),
        is_write: utils::is_write_api(callee),
    })
}

fn build_wait(call: ValueId, callee: &str, args: &[ValueId]) -> Option<WaitCall> {
    let (wait_count, request) = match callee {
        "wait" => (WaitCount::One, *args.first()?),
        "wait_all" => (WaitCount::Operand(*args.first()?), *args.get(1)?),
        "wait_any" => (WaitCount::One, *args.get(1)?),
        _ => {
            Diagnostic::warning(format!("unsupported wait call: {callee}")).emit();
            return None;
        }
    };
    Some(WaitCall { call, callee: callee.to_owned(), wait_count, request })
}

/// Access size derived from a pointer's static type, for load/store
/// instructions encountered outside a communication call (re-exported
/// here for callers of this module that don't want to reach into
/// `utils` directly).
pub fn pointee_access_size(ty: &crate::ir::Type) -> u64 {
    access_size_from_pointee(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FunctionBuilder;

    fn isend_args(fb: &mut FunctionBuilder, block: crate::ir::BlockId) -> Vec<ValueId> {
        let buf = fb.alloca(block);
        let count = fb.const_int(16);
        let datatype = fb.const_int(0x4c000405);
        let dest = fb.const_int(0);
        let tag = fb.const_int(0);
        let comm = fb.const_int(0);
        let req = fb.alloca(block);
        vec![buf, count, datatype, dest, tag, comm, req]
    }

    #[test]
    fn classifies_nonblocking_recv() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let args = isend_args(&mut fb, entry);
        let call = fb.call(entry, Some("recv_nb"), &args);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        assert_eq!(calls.non_blocking.len(), 1);
        let record = &calls.non_blocking[&call];
        assert_eq!(record.buffer, args[0]);
        assert_eq!(record.buffer_size, 64);
        assert!(record.is_write);
        assert_eq!(record.request, args[6]);
    }

    #[test]
    fn classifies_blocking_send_as_read() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let buf = fb.alloca(entry);
        let count = fb.const_int(4);
        let datatype = fb.const_int(0x4c000405);
        let call = fb.call(entry, Some("send_blocking"), &[buf, count, datatype]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        let record = &calls.blocking[&call];
        assert_eq!(record.buffer_size, 16);
        assert!(!record.is_write);
    }

    #[test]
    fn classifies_wait_all_with_operand_count() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let n = fb.const_int(2);
        let reqs = fb.alloca(entry);
        let call = fb.call(entry, Some("wait_all"), &[n, reqs]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        let record = &calls.wait[&call];
        assert_eq!(record.wait_count.as_constant(&f), Some(2));
        assert_eq!(record.request, reqs);
    }

    #[test]
    fn classifies_wait_with_implicit_count_one() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let req = fb.alloca(entry);
        let call = fb.call(entry, Some("wait"), &[req]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        let record = &calls.wait[&call];
        assert_eq!(record.wait_count.as_constant(&f), Some(1));
    }

    #[test]
    fn strips_buffer_start_bitcast() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let alloc = fb.alloca(entry);
        let cast = fb.bitcast(entry, alloc);
        let mut args = isend_args(&mut fb, entry);
        args[0] = cast;
        let call = fb.call(entry, Some("send_nb"), &args);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        assert_eq!(calls.non_blocking[&call].buffer, alloc);
    }

    #[test]
    fn ignores_unresolved_indirect_calls() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        fb.call(entry, None, &[]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let calls = classify_function(&f);
        assert!(calls.non_blocking.is_empty() && calls.blocking.is_empty() && calls.wait.is_empty());
    }
}
