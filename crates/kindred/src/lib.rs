//! Family-history records, household permissions, tree traversal, and the
//! collaborative contribution review workflow.

pub mod activity;
pub mod audit;
pub mod config;
pub mod content;
pub mod contributions;
pub mod error;
pub mod import;
pub mod messaging;
pub mod records;
pub mod store;
pub mod telemetry;
pub mod tree;
