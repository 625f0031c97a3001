//! Synchronizer capability interface.
//!
//! A synchronizer handles exactly one artifact type: it claims registry
//! files, parses them into artifacts, realizes those artifacts against its
//! backing system phase by phase, and cleans them up once their source file
//! is gone. The engine never knows what an artifact type means; it only
//! orders artifacts and calls these capabilities.

use crate::error::SyncResult;
use regsync_core::{Artifact, ArtifactLifecycle};
use std::fs::Metadata;
use std::path::Path;

/// Backing service holding the artifacts a synchronizer has registered.
pub trait ArtifactService: Send + Sync {
    /// Returns every artifact currently registered.
    fn get_all(&self) -> SyncResult<Vec<Artifact>>;

    /// Inserts or replaces an artifact.
    fn save(&self, artifact: &Artifact) -> SyncResult<()>;
}

/// A pluggable per-type handler.
///
/// Phase handlers receive the artifact mutably and are expected to move its
/// lifecycle forward (for example `New` → `Created` in [`create`]). Returning
/// an error marks the artifact as failed for that phase; the engine records
/// the failure and persists it through [`set_status`].
///
/// [`create`]: Synchronizer::create
/// [`set_status`]: Synchronizer::set_status
pub trait Synchronizer: Send + Sync {
    /// Name used as the key of the health map.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The artifact type this synchronizer handles.
    fn artifact_type(&self) -> &str;

    /// Returns true if this synchronizer claims the registry file.
    fn accepts_file(&self, path: &Path, metadata: &Metadata) -> bool;

    /// Returns true if this synchronizer handles artifacts of the given type.
    fn accepts_type(&self, artifact_type: &str) -> bool {
        artifact_type == self.artifact_type()
    }

    /// Parses definition content into artifacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed.
    fn parse(&self, location: &str, content: &[u8]) -> SyncResult<Vec<Artifact>>;

    /// Retrieves the already-parsed artifacts for a location.
    fn retrieve(&self, location: &str) -> SyncResult<Vec<Artifact>>;

    /// Returns the backing service.
    fn service(&self) -> &dyn ArtifactService;

    /// Persists the status of an artifact.
    fn set_status(
        &self,
        artifact: &Artifact,
        lifecycle: ArtifactLifecycle,
        message: Option<&str>,
    ) -> SyncResult<()>;

    /// Removes an artifact whose source file no longer exists.
    fn cleanup(&self, artifact: &Artifact) -> SyncResult<()>;

    /// Prepares an artifact before any artifact is created.
    fn prepare(&self, _artifact: &mut Artifact) -> SyncResult<()> {
        Ok(())
    }

    /// Creates an artifact in the backing system.
    fn create(&self, artifact: &mut Artifact) -> SyncResult<()>;

    /// Updates an artifact in the backing system.
    fn update(&self, artifact: &mut Artifact) -> SyncResult<()>;

    /// Starts a runnable artifact.
    fn start(&self, _artifact: &mut Artifact) -> SyncResult<()> {
        Ok(())
    }
}
