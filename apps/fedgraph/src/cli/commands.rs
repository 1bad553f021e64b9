//! # CLI Command Implementations

use crate::api;
use fedgraph_core::{
    CacheService, CloseableIterator, Element, FederatedStore, FederationConfig, FederationError,
    FileGraphLibrary, GraphLibrary, JobTracker, Operation, OperationOptions, OperationResult,
    StoreFactory, User, primitives::split_list,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Id of the store every command opens.
pub const STORE_ID: &str = "fedgraph";

/// Maximum size of an elements file (100 MB).
const MAX_ELEMENTS_FILE_SIZE: u64 = 100 * 1024 * 1024;

// =============================================================================
// STORE LOADING
// =============================================================================

/// Where the federation comes from.
#[derive(Debug, Clone, Default)]
pub struct StoreSources {
    pub config: Option<PathBuf>,
    pub library: Option<PathBuf>,
}

impl StoreSources {
    /// Build the federation and register every configured graph.
    pub fn open(&self) -> Result<FederatedStore, FederationError> {
        let config = match &self.config {
            Some(path) => FederationConfig::load(path)?,
            None => FederationConfig::new(),
        };
        let library = match &self.library {
            Some(dir) => Some(Arc::new(FileGraphLibrary::new(dir.clone())?) as Arc<dyn GraphLibrary>),
            None => None,
        };
        FederatedStore::from_config(STORE_ID, config, library, StoreFactory::default())
    }
}

/// Canonicalize and check an input file.
fn validate_file_path(path: &Path) -> Result<PathBuf, FederationError> {
    let canonical = path.canonicalize().map_err(|e| {
        FederationError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(FederationError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| FederationError::Io(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_ELEMENTS_FILE_SIZE {
        return Err(FederationError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_ELEMENTS_FILE_SIZE
        )));
    }
    Ok(canonical)
}

/// Parse a JSON array of elements.
pub fn read_elements(path: &Path) -> Result<Vec<Element>, FederationError> {
    let validated = validate_file_path(path)?;
    let contents = std::fs::read(&validated)
        .map_err(|e| FederationError::Io(format!("Read file: {}", e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| FederationError::Serialization(format!("Invalid elements file: {}", e)))
}

fn options_for(graph_ids: Option<&str>) -> OperationOptions {
    match graph_ids {
        Some(ids) => OperationOptions::on_graphs(split_list(ids)),
        None => OperationOptions::default(),
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server with job tracking enabled.
pub async fn cmd_serve(sources: &StoreSources, host: &str, port: u16) -> Result<(), FederationError> {
    let cache = CacheService::initialise();
    let store = sources.open()?.with_job_tracker(JobTracker::new(&cache)?);

    println!("fedgraph Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Graphs:   {}", store.graph_ids().len());
    println!("  Library:  {}", store.library().name());
    println!();
    println!("Endpoints:");
    println!("  GET    /health            - Health check");
    println!("  GET    /graphs            - List graph ids");
    println!("  POST   /graphs            - Add a graph");
    println!("  DELETE /graphs/{{graph_id}} - Remove a graph");
    println!("  GET    /schema            - Merged schema");
    println!("  GET    /traits            - Common traits");
    println!("  POST   /execute           - Execute an operation");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    let served = api::run_server(&addr, store).await;
    cache.shutdown();
    served
}

// =============================================================================
// REGISTRY COMMANDS
// =============================================================================

/// List graph ids.
pub fn cmd_graphs(sources: &StoreSources, json: bool) -> Result<(), FederationError> {
    let store = sources.open()?;
    let ids = store.graph_ids();

    if json {
        print_json(&serde_json::json!({ "graphIds": ids }));
        return Ok(());
    }

    println!("Graphs ({})", ids.len());
    for graph in store.graphs() {
        println!(
            "  {:<24} kind={}",
            graph.graph_id(),
            graph.properties().kind().unwrap_or("?")
        );
    }
    Ok(())
}

/// Remove a graph from the loaded federation.
pub fn cmd_remove(sources: &StoreSources, json: bool, graph_id: &str) -> Result<(), FederationError> {
    let store = sources.open()?;
    let removed = store.remove(graph_id);

    if json {
        print_json(&serde_json::json!({ "graphId": graph_id, "removed": removed }));
    } else if removed {
        println!("Removed {}; {} graphs remain", graph_id, store.graph_ids().len());
    } else {
        println!("Graph {} is not in the federation", graph_id);
    }
    Ok(())
}

// =============================================================================
// SCHEMA & TRAITS COMMANDS
// =============================================================================

/// Print the merged schema as JSON.
pub fn cmd_schema(sources: &StoreSources) -> Result<(), FederationError> {
    let store = sources.open()?;
    println!("{}", store.schema()?.to_json()?);
    Ok(())
}

/// Print the common traits.
pub fn cmd_traits(sources: &StoreSources, json: bool) -> Result<(), FederationError> {
    let store = sources.open()?;
    let traits = store.traits();

    if json {
        print_json(&serde_json::json!({ "traits": traits }));
        return Ok(());
    }

    println!("Traits ({})", traits.len());
    for t in &traits {
        println!("  {:?}", t);
    }
    Ok(())
}

// =============================================================================
// ELEMENT COMMANDS
// =============================================================================

/// Add elements from a file.
pub fn cmd_add_elements(
    sources: &StoreSources,
    json: bool,
    file: &Path,
    graph_ids: Option<&str>,
) -> Result<(), FederationError> {
    tracing::info!("Adding elements from {:?}", file);
    let elements = read_elements(file)?;
    let count = elements.len();

    let store = sources.open()?;
    let op = Operation::add_elements(elements).with_options(options_for(graph_ids));
    store.execute(&op, &User::default())?;

    if json {
        print_json(&serde_json::json!({ "added": count }));
    } else {
        println!("Added {} elements", count);
    }
    Ok(())
}

/// Print every element.
pub fn cmd_get_all(
    sources: &StoreSources,
    json: bool,
    graph_ids: Option<&str>,
) -> Result<(), FederationError> {
    let store = sources.open()?;
    let op = Operation::get_all_elements().with_options(options_for(graph_ids));
    let mut iter = store
        .execute(&op, &User::default())
        .and_then(OperationResult::into_elements)?;
    let elements: Vec<Element> = iter.by_ref().collect();
    iter.close();

    if json {
        print_json(&serde_json::json!({ "elements": elements }));
        return Ok(());
    }

    println!("Elements ({})", elements.len());
    for element in &elements {
        match element {
            Element::Entity(e) => println!("  entity {} {} {:?}", e.group, e.vertex, e.properties),
            Element::Edge(e) => println!(
                "  edge   {} {} -> {} {:?}",
                e.group, e.source, e.destination, e.properties
            ),
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
