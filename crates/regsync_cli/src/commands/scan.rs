//! Scan command implementation.

use regsync_core::{DefinitionStore, MemoryDefinitionStore};
use regsync_engine::{Collected, DefinitionCollector, RegistryWalker};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One collected registry file.
#[derive(Debug, Serialize)]
pub struct ScannedFile {
    /// Registry location.
    pub location: String,
    /// Extension that claimed the file.
    pub extension: String,
    /// What the next pass would do with it.
    pub outcome: String,
}

/// Scan result.
#[derive(Debug, Serialize)]
pub struct ScanResult {
    /// Registry root.
    pub registry: String,
    /// Files visited by the walk.
    pub visited: usize,
    /// Claimed files in walk order.
    pub files: Vec<ScannedFile>,
    /// Number of claimed files per outcome.
    pub summary: BTreeMap<String, usize>,
    /// Read, walk and store errors.
    pub errors: Vec<String>,
}

/// Runs the scan command.
pub fn run(
    store: Option<&Path>,
    registry: &Path,
    extensions: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = match store {
        Some(path) if path.exists() => {
            let store = super::open_store(path)?;
            scan(&store, registry, extensions)?
        }
        _ => scan(&MemoryDefinitionStore::new(), registry, extensions)?,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Walks `registry` and reconciles every file whose extension is listed
/// against `store`, without writing to it. The first listed extension wins
/// when a file matches more than one.
pub fn scan(
    store: &dyn DefinitionStore,
    registry: &Path,
    extensions: &[String],
) -> Result<ScanResult, Box<dyn std::error::Error>> {
    let extensions: Vec<&str> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .collect();
    let mut collector = DefinitionCollector::new(store, extensions.len()).dry_run();
    let mut files = Vec::new();

    let report = RegistryWalker::new(registry).walk(|path, _metadata, location| {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return;
        };
        let Some(index) = extensions.iter().position(|claimed| *claimed == ext) else {
            return;
        };
        let outcome = collector.collect_file(index, path, location);
        files.push(ScannedFile {
            location: location.to_string(),
            extension: ext.to_string(),
            outcome: outcome.to_string(),
        });
    })?;

    let (_, mut errors) = collector.finish();
    errors.extend(report.errors.iter().map(ToString::to_string));

    let mut summary = BTreeMap::new();
    for file in &files {
        *summary.entry(file.outcome.clone()).or_insert(0) += 1;
    }

    Ok(ScanResult {
        registry: registry.display().to_string(),
        visited: report.visited,
        files,
        summary,
        errors,
    })
}

fn print_text_output(result: &ScanResult) {
    println!("regsync Registry Scan");
    println!("=====================");
    println!();
    println!("Registry: {}", result.registry);
    println!("Visited:  {}", result.visited);
    println!("Claimed:  {}", result.files.len());
    for (outcome, count) in &result.summary {
        println!("  {outcome:<9} {count}");
    }

    let pending: Vec<&ScannedFile> = result
        .files
        .iter()
        .filter(|file| file.outcome != Collected::Pending.to_string())
        .collect();
    if !pending.is_empty() {
        println!();
        println!("Changes:");
        for file in pending {
            println!("  {:<9} {}", file.outcome, file.location);
        }
    }

    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for error in &result.errors {
            println!("  {error}");
        }
    }
}
