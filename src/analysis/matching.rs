//! Decides whether a wait call's request operand refers to the same
//! pending request as a non-blocking call's. Grounded on
//! `MPIWaitCall::isMatchedMPIRequest` in
//! `analyzer/src/lib/mpicall.cc`; the four syntactic rules below are
//! listed in the order the original checks them.

use crate::diagnostics::Diagnostic;
use crate::ir::{Function, ValueId, ValueKind};

use super::classify::WaitCall;
use super::utils::{is_load_from_same_addr, is_stl_indexed_access};

/// True if `wait` refers to the same request as `request` (the pending
/// request operand of a non-blocking call).
///
/// This is intentionally syntactic pattern matching, not data-flow
/// canonicalization: a getelementptr match only compares base pointers,
/// never indices, which is a known, preserved over-approximation.
pub fn is_matched_request(function: &Function, wait: &WaitCall, request: ValueId) -> bool {
    if wait.wait_count.as_constant(function) == Some(1) && wait.request == request {
        return true;
    }

    if let (Some(r_base), Some(q_base)) = (function.kind(request).gep_base(), function.kind(wait.request).gep_base()) {
        if r_base == q_base {
            return true;
        }
    }

    if let Some(q_base) = function.kind(wait.request).gep_base() {
        if is_load_from_same_addr(function, q_base, request) {
            return true;
        }
    }

    if let (ValueKind::Call { callee: Some(r_callee), args: r_args }, ValueKind::Call { callee: Some(q_callee), args: q_args }) =
        (function.kind(request), function.kind(wait.request))
    {
        if is_stl_indexed_access(r_callee) && is_stl_indexed_access(q_callee) {
            if let (Some(&r_container), Some(&q_container)) = (r_args.first(), q_args.first()) {
                if r_container == q_container {
                    return true;
                }
            }
        }
    }

    Diagnostic::warning(format!(
        "unsupported request form when matching wait call {:?} against request {request:?}",
        wait.call
    ))
    .emit();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify::WaitCount;
    use crate::ir::builder::FunctionBuilder;

    #[test]
    fn identity_match_with_count_one() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let req = fb.alloca(entry);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: req, callee: "wait".into(), wait_count: WaitCount::One, request: req };
        assert!(is_matched_request(&f, &wait, req));
    }

    #[test]
    fn count_one_but_different_request_does_not_match() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let req_a = fb.alloca(entry);
        let req_b = fb.alloca(entry);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: req_a, callee: "wait".into(), wait_count: WaitCount::One, request: req_a };
        assert!(!is_matched_request(&f, &wait, req_b));
    }

    #[test]
    fn gep_base_equality_ignores_index_mismatch() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let reqs = fb.alloca(entry);
        let i0 = fb.const_int(0);
        let i1 = fb.const_int(1);
        let r = fb.gep(entry, reqs, &[i0]);
        let q = fb.gep(entry, reqs, &[i1]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: q, callee: "wait_all".into(), wait_count: WaitCount::Operand(i1), request: q };
        assert!(is_matched_request(&f, &wait, r));
    }

    #[test]
    fn matches_through_stored_handle_gep() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let slot = fb.alloca(entry);
        let r = fb.load(entry, slot, crate::ir::Type::Ptr(Box::new(crate::ir::Type::Other)));
        let idx = fb.const_int(0);
        let loaded_base = fb.load(entry, slot, crate::ir::Type::Ptr(Box::new(crate::ir::Type::Other)));
        let q = fb.gep(entry, loaded_base, &[idx]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: q, callee: "wait_all".into(), wait_count: WaitCount::Operand(idx), request: q };
        assert!(is_matched_request(&f, &wait, r));
    }

    #[test]
    fn matches_stl_indexed_access_on_same_container() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let container = fb.alloca(entry);
        let idx_a = fb.const_int(0);
        let idx_b = fb.const_int(1);
        let r = fb.call(entry, Some("_ZNSt6vectorIiSaIiEEixEm"), &[container, idx_a]);
        let q = fb.call(entry, Some("_ZNSt6vectorIiSaIiEEixEm"), &[container, idx_b]);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: q, callee: "wait".into(), wait_count: WaitCount::One, request: q };
        assert!(is_matched_request(&f, &wait, r));
    }

    #[test]
    fn unsupported_form_does_not_match() {
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.entry();
        let r = fb.const_int(0);
        let q = fb.const_int(1);
        fb.br(entry, entry);
        let f = fb.build().unwrap();

        let wait = WaitCall { call: q, callee: "wait".into(), wait_count: WaitCount::One, request: q };
        assert!(!is_matched_request(&f, &wait, r));
    }
}
