//! Shared types and constants for the biosim workspace.

pub mod types;

pub use types::{CHEMOSTAT_BULK, SoluteDictionary, SoluteIndex};
