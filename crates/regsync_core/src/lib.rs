//! # regsync core
//!
//! Data model and persistence for the regsync reconciliation engine.
//!
//! This crate provides:
//! - [`Definition`] records, one per registry file, with checksum-based
//!   change tracking
//! - [`Artifact`]s, the typed units synchronizers produce from definitions,
//!   with their lifecycle and phase enums
//! - The [`DefinitionStore`] contract with in-memory and file-backed
//!   implementations
//!
//! ## Key Invariants
//!
//! - A definition's location is its unique key
//! - A definition's checksum always reflects its last loaded content
//! - Definition content is never persisted, only its checksum
//! - An artifact's key is unique within one pass's working set

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod checksum;
mod config;
mod definition;
mod error;
mod store;

pub use artifact::{Artifact, ArtifactLifecycle, ArtifactPhase};
pub use checksum::checksum;
pub use config::StoreConfig;
pub use definition::{Definition, DefinitionState, DEFAULT_DEFINITION_TYPE};
pub use error::{CoreError, CoreResult};
#[cfg(feature = "std")]
pub use store::FileDefinitionStore;
pub use store::{DefinitionStore, MemoryDefinitionStore};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
