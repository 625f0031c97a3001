//! CLI command implementations.

pub mod inspect;
pub mod purge;
pub mod scan;

use regsync_core::{FileDefinitionStore, StoreConfig};
use std::path::Path;

/// Opens an existing store without fsync on save.
fn open_store(path: &Path) -> Result<FileDefinitionStore, Box<dyn std::error::Error>> {
    let config = StoreConfig::new()
        .create_if_missing(false)
        .sync_on_save(false);
    Ok(FileDefinitionStore::open(path, config)?)
}
