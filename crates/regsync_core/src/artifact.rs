//! Artifacts: typed units produced from definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage every artifact passes through in one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactPhase {
    /// Preparation before any artifact is created.
    Prepare,
    /// Creation of new artifacts.
    Create,
    /// Update of modified artifacts.
    Update,
    /// Start of runnable artifacts.
    Start,
}

impl ArtifactPhase {
    /// All phases in execution order.
    pub const ALL: [ArtifactPhase; 4] = [
        ArtifactPhase::Prepare,
        ArtifactPhase::Create,
        ArtifactPhase::Update,
        ArtifactPhase::Start,
    ];

    /// Returns the upper-case name used in logs and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArtifactPhase::Prepare => "PREPARE",
            ArtifactPhase::Create => "CREATE",
            ArtifactPhase::Update => "UPDATE",
            ArtifactPhase::Start => "START",
        }
    }
}

impl fmt::Display for ArtifactPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactLifecycle {
    /// Parsed from a new definition.
    New,
    /// Parsed from a modified definition.
    Modified,
    /// Prepared for creation.
    Prepared,
    /// Realized against the backing system.
    Created,
    /// Re-realized after modification.
    Updated,
    /// Running.
    Started,
    /// Removed from the backing system.
    Deleted,
    /// Failed in the given phase.
    Failed(ArtifactPhase),
}

impl ArtifactLifecycle {
    /// Returns true if the artifact has pending changes that require the
    /// lifecycle phases to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, ArtifactLifecycle::New | ArtifactLifecycle::Modified)
    }

    /// Returns true for any phase failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactLifecycle::Failed(_))
    }
}

impl fmt::Display for ArtifactLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLifecycle::New => f.write_str("NEW"),
            ArtifactLifecycle::Modified => f.write_str("MODIFIED"),
            ArtifactLifecycle::Prepared => f.write_str("PREPARED"),
            ArtifactLifecycle::Created => f.write_str("CREATED"),
            ArtifactLifecycle::Updated => f.write_str("UPDATED"),
            ArtifactLifecycle::Started => f.write_str("STARTED"),
            ArtifactLifecycle::Deleted => f.write_str("DELETED"),
            ArtifactLifecycle::Failed(phase) => write!(f, "FAILED_{phase}"),
        }
    }
}

/// A typed, identity-bearing unit derived from one definition.
///
/// Type-specific data lives in the opaque `payload`; behavior is reached
/// through the owning synchronizer, not through the artifact itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable identity, unique within a pass.
    pub key: String,
    /// Artifact name.
    pub name: String,
    /// Artifact type tag.
    pub artifact_type: String,
    /// Location of the source definition.
    pub location: String,
    /// Current lifecycle status.
    pub lifecycle: ArtifactLifecycle,
    /// Phase the artifact was last driven through, if any.
    pub phase: Option<ArtifactPhase>,
    /// Whether the artifact is currently running.
    pub running: bool,
    /// Keys of the artifacts this one requires.
    pub dependencies: Vec<String>,
    /// Last status message.
    pub message: Option<String>,
    /// Synchronizer-specific data.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Artifact {
    /// Creates a new artifact with the default key and lifecycle `New`.
    pub fn new(
        artifact_type: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let artifact_type = artifact_type.into();
        let location = location.into();
        let name = name.into();
        let key = Self::key_for(&artifact_type, &location, &name);

        Self {
            key,
            name,
            artifact_type,
            location,
            lifecycle: ArtifactLifecycle::New,
            phase: None,
            running: false,
            dependencies: Vec::new(),
            message: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Builds the default key from type, location and name.
    #[must_use]
    pub fn key_for(artifact_type: &str, location: &str, name: &str) -> String {
        format!("{artifact_type}:{location}:{name}")
    }

    /// Overrides the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Adds a dependency on another artifact's key.
    #[must_use]
    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.dependencies.push(key.into());
        self
    }

    /// Sets the lifecycle.
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: ArtifactLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Records a phase failure: lifecycle `Failed(phase)` with a message.
    pub fn fail(&mut self, phase: ArtifactPhase, message: impl Into<String>) {
        self.phase = Some(phase);
        self.lifecycle = ArtifactLifecycle::Failed(phase);
        self.message = Some(message.into());
    }
}
