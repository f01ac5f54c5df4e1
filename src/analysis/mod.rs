//! The race-detection core: four cooperating components, leaves
//! first. `utils` and `classify` build the facts the engine needs;
//! `matching` decides request equivalence; `engine` ties it together and
//! is the entry point the driver calls once per function.

pub mod classify;
pub mod engine;
pub mod matching;
pub mod utils;

pub use classify::{classify_function, BlockingCall, ClassifiedCalls, NonBlockingCall, WaitCall, WaitCount};
pub use engine::{detect_races, RaceReport};

use crate::ir::Function;

/// Classify `function`'s communication calls and run the engine over
/// them, in one step. The driver's unit of work.
pub fn analyze_function(function: &Function) -> Vec<RaceReport> {
    let calls = classify_function(function);
    if calls.non_blocking.is_empty() {
        return Vec::new();
    }
    detect_races(function, &calls)
}
