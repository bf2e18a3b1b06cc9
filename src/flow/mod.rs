//! Email workflow engine.
//!
//! Stages, in order:
//! 1. Classification (fallback: OTHER)
//! 2. Category dispatch: TASK, SIMPLE_INQUIRY or OTHER
//! 3. TASK: department selection, routing with exclusions, availability,
//!    cross-department retrieval and drafting
//! 4. SIMPLE_INQUIRY: draft/validate loop
//! 5. Exactly one sink action

mod drafting;
mod engine;
pub mod log;
mod retrieval;
mod routing;
pub mod state;

pub use engine::{EmailFlow, FlowDeps, RunAction, RunOutcome};
pub use log::RunLog;
pub use state::FlowState;
