// 8.0: wagering engine. coordinates placement, margin chains, exposure queries,
// settlement passes and manual corrections over shared in-memory state.

mod core;
mod corrections;
mod placement;
mod queries;
mod results;
mod settlement;

pub use core::Engine;
pub use corrections::CorrectionRequest;
pub use results::{CorrectionResult, EngineError, ErrorKind, Placement};
