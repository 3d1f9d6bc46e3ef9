//! relance-core: closure and survival analysis of a firm registry against
//! the state-aid registry.
//!
//! Load → filter → cohort → stages → report. See `pipeline` for the
//! fixed execution order.

pub mod aid;
pub mod cache;
pub mod cohort;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod filter;
pub mod grouping;
pub mod independence;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod rng;
pub mod segment;
pub mod stage;
pub mod stages;
pub mod synth;
pub mod types;
