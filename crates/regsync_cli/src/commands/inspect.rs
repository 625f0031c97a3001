//! Inspect command implementation.

use regsync_core::{Definition, DefinitionState, DefinitionStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Definition store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Total number of stored definitions.
    pub total: usize,
    /// Number of definitions per state.
    pub by_state: BTreeMap<String, usize>,
    /// Listed definitions, ordered by location.
    pub definitions: Vec<Definition>,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    state: Option<DefinitionState>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(path)?;
    let result = inspect(&store, path, state)?;

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

/// Collects definitions from a store, optionally filtered by state.
pub fn inspect(
    store: &dyn DefinitionStore,
    path: &Path,
    state: Option<DefinitionState>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut all = store.all()?;
    all.sort_by(|a, b| a.location.cmp(&b.location));

    let mut by_state = BTreeMap::new();
    for definition in &all {
        *by_state.entry(definition.state.to_string()).or_insert(0) += 1;
    }

    let total = all.len();
    let definitions = all
        .into_iter()
        .filter(|definition| state.map_or(true, |state| definition.state == state))
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        total,
        by_state,
        definitions,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("regsync Definition Store");
    println!("========================");
    println!();
    println!("Path:  {}", result.path);
    println!("Total: {}", result.total);
    for (state, count) in &result.by_state {
        println!("  {state:<9} {count}");
    }

    if result.definitions.is_empty() {
        return;
    }
    println!();
    println!("Definitions:");
    for definition in &result.definitions {
        println!(
            "  {:<9} {}  [{}] {}",
            definition.state,
            &definition.checksum[..definition.checksum.len().min(12)],
            definition.artifact_type,
            definition.location
        );
        if let Some(message) = &definition.message {
            println!("            {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsync_core::MemoryDefinitionStore;

    fn store() -> MemoryDefinitionStore {
        let store = MemoryDefinitionStore::new();
        let mut parsed = Definition::new("/b.table", b"b".to_vec());
        parsed.set_state(DefinitionState::Parsed, None);
        let mut broken = Definition::new("/a.view", b"a".to_vec());
        broken.set_state(DefinitionState::Broken, Some("bad".into()));
        store.save(&parsed).unwrap();
        store.save(&broken).unwrap();
        store
    }

    #[test]
    fn lists_all_sorted_by_location() {
        let result = inspect(&store(), Path::new("/store"), None).unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.definitions[0].location, "/a.view");
        assert_eq!(result.by_state["BROKEN"], 1);
        assert_eq!(result.by_state["PARSED"], 1);
    }

    #[test]
    fn filters_by_state() {
        let result = inspect(&store(), Path::new("/store"), Some(DefinitionState::Broken)).unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.definitions.len(), 1);
        assert_eq!(result.definitions[0].message.as_deref(), Some("bad"));
    }

    #[test]
    fn json_omits_content() {
        let result = inspect(&store(), Path::new("/store"), None).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["definitions"][0].get("content").is_none());
        assert_eq!(json["definitions"][0]["state"], "Broken");
    }
}
