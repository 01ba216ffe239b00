//! The `Queryer` capability (§6): the one operation a downstream location must support, and the
//! request it receives.

use std::sync::Arc;

use apollo_compiler::ast::Document;
use serde_json_bytes::Map;
use serde_json_bytes::Value;

use crate::error::ExecError;

/// What the executor sends a queryer for one plan step.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query_string: Arc<str>,
    pub query_document: Arc<Document>,
    pub variables: Map<serde_json_bytes::ByteString, Value>,
}

/// A downstream location's ability to answer one operation (§6). The gateway itself implements
/// this trait for the synthetic `internal` location (gateway-level fields, introspection).
#[async_trait::async_trait]
pub trait Queryer: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<Value, ExecError>;
}

/// A resolved table of queryers, one per location name known to the unified schema, consulted by
/// the executor when dispatching a step (§4.3 step 2).
pub type QueryerTable = std::collections::HashMap<Arc<str>, Arc<dyn Queryer>>;
