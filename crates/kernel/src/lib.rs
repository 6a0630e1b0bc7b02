//! World Kernel: the registry of bulk reservoirs and computation domains a
//! biofilm simulation runs in.
//!
//! # Invariants
//! - Bulk names are unique within a world; domain names likewise.
//! - Bulks and domains keep configuration order.
//! - The global bulk time constraint never exceeds any single bulk's own.

pub mod bulk;
pub mod config;
pub mod context;
pub mod domain;
pub mod world;

pub use bulk::{Bulk, BulkSolute};
pub use config::{ConfigError, ConfigNode, Protocol};
pub use context::SimContext;
pub use domain::Domain;
pub use world::{BulkTimeHistory, InitDiagnostic, InitPhase, InitReport, World, WorldError};
