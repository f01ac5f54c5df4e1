//! Static data-race detection for non-blocking message-passing programs.
//!
//! The crate is organized bottom-up: [`ir`] is the data model the rest of
//! the crate operates over, [`loader`] and [`ir::builder`] are the two
//! ways to build one, [`analysis`] is the detector itself, and [`driver`]
//! runs it across a set of loaded modules. [`diagnostics`] and
//! [`source_line`] are shared plumbing used throughout.

pub mod analysis;
pub mod diagnostics;
pub mod driver;
pub mod ir;
pub mod loader;
pub mod source_line;

pub use analysis::{analyze_function, detect_races, RaceReport};
pub use diagnostics::{Diagnostic, DiagnosticLevel};
pub use driver::{DriverReport, LocatedRace, RaceDetectConfig};
