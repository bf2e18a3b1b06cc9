//! Triage Desk: email triage workflow for a university administrative office.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod flow;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod sink;
