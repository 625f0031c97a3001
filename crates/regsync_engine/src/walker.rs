//! Registry traversal.

use crate::error::{SyncError, SyncResult};
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Outcome of one walk over the registry.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Number of regular files visited.
    pub visited: usize,
    /// Entries that could not be visited.
    pub errors: Vec<SyncError>,
}

/// Visits every regular file under a registry root.
///
/// Files are visited in file-name order within each directory. An entry
/// that cannot be read (permission denied, broken link, link loop) or whose
/// path is not valid UTF-8 is reported in [`WalkReport::errors`] and the
/// walk continues.
#[derive(Debug, Clone)]
pub struct RegistryWalker {
    root: PathBuf,
    follow_links: bool,
}

impl RegistryWalker {
    /// Creates a walker for a registry root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: true,
        }
    }

    /// Sets whether symbolic links are followed.
    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Returns the registry root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the registry, calling `visit` with each file's path, metadata
    /// and registry location.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root itself is not a readable directory.
    pub fn walk<F>(&self, mut visit: F) -> SyncResult<WalkReport>
    where
        F: FnMut(&Path, &Metadata, &str),
    {
        if !self.root.is_dir() {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("registry root is not a directory: {}", self.root.display()),
            )));
        }

        let mut report = WalkReport::default();
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable registry entry");
                    report.errors.push(e.into());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping registry file without metadata");
                    report.errors.push(e.into());
                    continue;
                }
            };

            let Some(location) = location_of(&self.root, entry.path()) else {
                if entry.path().to_str().is_none() {
                    warn!(path = %entry.path().display(), "skipping registry file with a non UTF-8 name");
                    report.errors.push(SyncError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("registry path is not valid UTF-8: {}", entry.path().display()),
                    )));
                }
                continue;
            };
            trace!(location = %location, "visiting registry file");
            visit(entry.path(), &metadata, &location);
            report.visited += 1;
        }

        Ok(report)
    }
}

/// Returns the registry location of a path: root-stripped, `/`-separated,
/// with a leading `/`. Returns `None` for the root itself, for paths
/// outside it and for paths that are not valid UTF-8.
#[must_use]
pub fn location_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut location = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            location.push('/');
            location.push_str(part.to_str()?);
        }
    }
    if location.is_empty() {
        None
    } else {
        Some(location)
    }
}

/// Resolves a registry location back to a path under the root.
#[must_use]
pub fn path_of(root: &Path, location: &str) -> PathBuf {
    location
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}
