//! # regsync testkit
//!
//! Test utilities for regsync.
//!
//! This crate provides:
//! - A temporary registry directory and a ready-wired test engine
//! - A scripted synchronizer that records every call and can be told to
//!   fail or panic for chosen artifacts and phases
//! - An in-memory artifact service
//! - Property-based generators for dependency graphs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regsync_testkit::prelude::*;
//!
//! #[test]
//! fn table_is_created() {
//!     let tables = ScriptedSynchronizer::new("table", "table");
//!     let engine = TestEngine::new(vec![tables.shared()]);
//!     engine.registry.write("/orders.table", "name = ORDERS");
//!     engine.pass();
//!     assert_eq!(tables.log().phase_keys(ArtifactPhase::Create).len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod synchronizer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::synchronizer::*;
    pub use regsync_core::{Artifact, ArtifactLifecycle, ArtifactPhase, DefinitionState};
}

pub use fixtures::*;
pub use generators::*;
pub use synchronizer::*;
