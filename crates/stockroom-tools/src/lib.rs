//! stockroom-tools - Agent-facing surface of the product catalog
//!
//! Agents reach the catalog only through the generic tool interface here:
//! a tool name plus JSON input in, text out.

pub mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use stockroom_catalog::ProductDb;

pub use tools::products::{LoadProductsTool, ProductLookupTool, ProductTitlesTool};
pub use tools::{
    check_input, input_schema, ParamKind, ToolCallError, ToolDefinition, ToolHandler, ToolParam,
    ToolRegistry,
};

/// Build a registry holding every product tool
pub fn product_registry(snapshot_path: impl Into<PathBuf>, db: ProductDb) -> ToolRegistry {
    let snapshot_path = snapshot_path.into();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(LoadProductsTool::new(snapshot_path.clone())));
    registry.register(Arc::new(ProductLookupTool::new(snapshot_path)));
    registry.register(Arc::new(ProductTitlesTool::new(db)));
    registry
}
