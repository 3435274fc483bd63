//! Core pipeline orchestration and domain logic for vcdossier.
//!
//! This crate ties together the research agents, page fetching, cleaning,
//! LinkedIn providers and the firm store into the per-firm pipeline
//! ([`Pipeline::process_firm`]), batch runs and resumes.

pub mod agents;
pub mod inputs;
pub mod pipeline;
pub mod urls;

#[cfg(test)]
mod testing;

pub use inputs::{find_record, load_firm_records, select_records};
pub use pipeline::{
    BatchSummary, FirmOutcome, FirmStats, Pipeline, PipelineConfig, ProgressReporter,
    SilentProgress,
};
