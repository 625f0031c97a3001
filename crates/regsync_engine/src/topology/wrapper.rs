//! Pass-scoped graph nodes around artifacts.

use super::{Depletable, TopologyNode};
use crate::error::SyncResult;
use crate::synchronizer::Synchronizer;
use regsync_core::{Artifact, ArtifactLifecycle, ArtifactPhase};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// An artifact paired with the synchronizer that owns it.
///
/// Completing a phase calls the owner's handler and persists the resulting
/// status through [`Synchronizer::set_status`] whenever it changed or the
/// handler failed.
pub struct TopologyWrapper {
    artifact: Artifact,
    synchronizer: Arc<dyn Synchronizer>,
    owner: usize,
}

impl TopologyWrapper {
    /// Wraps an artifact owned by the synchronizer at registration index
    /// `owner`.
    pub fn new(artifact: Artifact, synchronizer: Arc<dyn Synchronizer>, owner: usize) -> Self {
        Self {
            artifact,
            synchronizer,
            owner,
        }
    }

    /// Wraps every `(owner, artifact)` pair of a working set.
    ///
    /// Pairs whose owner index is out of range are dropped.
    pub fn wrap_all<I>(artifacts: I, synchronizers: &[Arc<dyn Synchronizer>]) -> Vec<Self>
    where
        I: IntoIterator<Item = (usize, Artifact)>,
    {
        artifacts
            .into_iter()
            .filter_map(|(owner, artifact)| {
                synchronizers
                    .get(owner)
                    .map(|sync| Self::new(artifact, Arc::clone(sync), owner))
            })
            .collect()
    }

    /// The wrapped artifact.
    #[must_use]
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Registration index of the owning synchronizer.
    #[must_use]
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Marks the artifact as failed in `phase` and persists that status.
    pub fn fail(&mut self, phase: ArtifactPhase, message: impl Into<String>) {
        self.artifact.fail(phase, message);
        self.persist_status();
    }

    fn run_handler(&mut self, phase: ArtifactPhase) -> SyncResult<()> {
        let sync = &self.synchronizer;
        match phase {
            ArtifactPhase::Prepare => sync.prepare(&mut self.artifact),
            ArtifactPhase::Create => sync.create(&mut self.artifact),
            ArtifactPhase::Update => sync.update(&mut self.artifact),
            ArtifactPhase::Start => sync.start(&mut self.artifact),
        }
    }

    fn persist_status(&self) {
        let artifact = &self.artifact;
        if let Err(e) = self
            .synchronizer
            .set_status(artifact, artifact.lifecycle, artifact.message.as_deref())
        {
            warn!(key = %artifact.key, error = %e, "failed to persist artifact status");
        }
    }
}

impl TopologyNode for TopologyWrapper {
    fn id(&self) -> &str {
        &self.artifact.key
    }

    fn dependencies(&self) -> &[String] {
        &self.artifact.dependencies
    }
}

impl Depletable for TopologyWrapper {
    fn complete(&mut self, phase: ArtifactPhase) -> SyncResult<()> {
        let before: (ArtifactLifecycle, bool) = (self.artifact.lifecycle, self.artifact.running);
        self.artifact.phase = Some(phase);

        match self.run_handler(phase) {
            Ok(()) => {
                if before != (self.artifact.lifecycle, self.artifact.running) {
                    debug!(
                        key = %self.artifact.key,
                        phase = %phase,
                        lifecycle = %self.artifact.lifecycle,
                        "artifact advanced"
                    );
                    self.persist_status();
                }
                Ok(())
            }
            Err(e) => {
                self.fail(phase, e.to_string());
                Err(e)
            }
        }
    }
}

impl fmt::Debug for TopologyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyWrapper")
            .field("key", &self.artifact.key)
            .field("synchronizer", &self.synchronizer.name())
            .field("owner", &self.owner)
            .finish()
    }
}
