//! Membership pipeline for lodges.
//!
//! Candidates move through an application pipeline while lodge members and grand-lodge
//! officers cast ballots. [`membership::DecisionEvaluator`] answers whether a stage would
//! currently pass; everything else is record keeping around it.

pub mod config;
pub mod error;
pub mod membership;
pub mod telemetry;
