//! Email triage data model.
//!
//! Every inbound email flows through the workflow engine in `crate::flow`:
//! 1. Classification: rules fast path, then the classifier
//! 2. Category dispatch: TASK, SIMPLE_INQUIRY or OTHER
//! 3. Routing, retrieval and drafting (TASK) or draft/validate (SIMPLE_INQUIRY)
//! 4. Exactly one sink action: task board, auto-reply or spam webhook

pub mod rules;
pub mod types;
