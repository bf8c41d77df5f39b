//! Batch processing of one image against every catalog background
//!
//! [`BatchState`] is only changed through [`BatchState::apply`];
//! [`BatchOrchestrator`] owns the state, launches one task per background and
//! publishes every transition on a watch channel.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{BatchOrchestrator, RunHandle};
pub use state::{BatchEvent, BatchRun, BatchState, ProcessedResult, ResultStatus, RunId};
