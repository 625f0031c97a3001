//! Registry definitions: one record per source file.

use crate::checksum::checksum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Artifact type assigned to files without an extension.
pub const DEFAULT_DEFINITION_TYPE: &str = "definition";

/// Parse state of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionState {
    /// First sighting of the file; not parsed yet.
    New,
    /// Content checksum changed since the last parse.
    Modified,
    /// Content was parsed into artifacts successfully.
    Parsed,
    /// Parsing failed; not retried until the content changes.
    Broken,
    /// Artifacts of the file were cleaned up after it was removed.
    Deleted,
}

impl DefinitionState {
    /// Returns true if a definition in this state should be parsed or
    /// retrieved when it is collected again with an unchanged checksum.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            DefinitionState::New | DefinitionState::Modified | DefinitionState::Parsed
        )
    }

    /// Returns true if the content has to go through the parser.
    #[must_use]
    pub fn needs_parse(&self) -> bool {
        matches!(self, DefinitionState::New | DefinitionState::Modified)
    }

    /// Returns the upper-case name used in logs and listings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DefinitionState::New => "NEW",
            DefinitionState::Modified => "MODIFIED",
            DefinitionState::Parsed => "PARSED",
            DefinitionState::Broken => "BROKEN",
            DefinitionState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for DefinitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DefinitionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(DefinitionState::New),
            "MODIFIED" => Ok(DefinitionState::Modified),
            "PARSED" => Ok(DefinitionState::Parsed),
            "BROKEN" => Ok(DefinitionState::Broken),
            "DELETED" => Ok(DefinitionState::Deleted),
            other => Err(format!("unknown definition state: {other}")),
        }
    }
}

/// A registry file record with checksum-based change tracking.
///
/// The location is the unique key. The content is held only in memory for
/// the duration of a pass and is never persisted by the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// Registry-relative location, `/`-separated with a leading `/`.
    pub location: String,
    /// File stem.
    pub name: String,
    /// Artifact type tag derived from the file extension.
    pub artifact_type: String,
    /// Raw content, if it was loaded in this pass.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    /// Checksum of the last successfully loaded content.
    pub checksum: String,
    /// Current parse state.
    pub state: DefinitionState,
    /// Last error, if any.
    pub message: Option<String>,
}

impl Definition {
    /// Creates a new definition for freshly loaded content.
    ///
    /// The name and type are derived from the location; the state is `New`.
    pub fn new(location: impl Into<String>, content: Vec<u8>) -> Self {
        let location = location.into();
        let path = Path::new(&location);
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let artifact_type = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_DEFINITION_TYPE.to_string());
        let checksum = checksum(&content);

        Self {
            location,
            name,
            artifact_type,
            content: Some(content),
            checksum,
            state: DefinitionState::New,
            message: None,
        }
    }

    /// Returns the store key of this definition.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.location
    }

    /// Replaces the content, recomputing the checksum.
    ///
    /// Returns true if the checksum changed.
    pub fn replace_content(&mut self, content: Vec<u8>) -> bool {
        let sum = checksum(&content);
        let changed = sum != self.checksum;
        self.checksum = sum;
        self.content = Some(content);
        changed
    }

    /// Sets the state and message together.
    pub fn set_state(&mut self, state: DefinitionState, message: Option<String>) {
        self.state = state;
        self.message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_name_and_type() {
        let def = Definition::new("/shop/orders.table", b"{}".to_vec());
        assert_eq!(def.key(), "/shop/orders.table");
        assert_eq!(def.name, "orders");
        assert_eq!(def.artifact_type, "table");
        assert_eq!(def.state, DefinitionState::New);
        assert_eq!(def.checksum, checksum(b"{}"));
    }

    #[test]
    fn type_defaults_without_extension() {
        let def = Definition::new("/shop/README", Vec::new());
        assert_eq!(def.artifact_type, DEFAULT_DEFINITION_TYPE);
        assert_eq!(def.name, "README");
    }

    #[test]
    fn dotted_directory_does_not_leak_into_type() {
        let def = Definition::new("/shop.v2/orders", Vec::new());
        assert_eq!(def.artifact_type, DEFAULT_DEFINITION_TYPE);
    }

    #[test]
    fn replace_content_reports_change() {
        let mut def = Definition::new("/a.view", b"one".to_vec());
        assert!(!def.replace_content(b"one".to_vec()));
        assert!(def.replace_content(b"two".to_vec()));
        assert_eq!(def.checksum, checksum(b"two"));
    }

    #[test]
    fn state_predicates() {
        assert!(DefinitionState::New.is_pending());
        assert!(DefinitionState::Parsed.is_pending());
        assert!(!DefinitionState::Broken.is_pending());
        assert!(!DefinitionState::Deleted.is_pending());

        assert!(DefinitionState::Modified.needs_parse());
        assert!(!DefinitionState::Parsed.needs_parse());
    }

    #[test]
    fn state_parses_case_insensitive() {
        assert_eq!("broken".parse::<DefinitionState>(), Ok(DefinitionState::Broken));
        assert!("gone".parse::<DefinitionState>().is_err());
        assert_eq!(DefinitionState::Parsed.to_string(), "PARSED");
    }
}
