//! Report generation for completed runs.

pub mod breakdown;
pub mod emitter;

pub use breakdown::{symbol_breakdown, SymbolBreakdown};
pub use emitter::{render_report, ReportEmitter, ReportError, ReportPaths};
