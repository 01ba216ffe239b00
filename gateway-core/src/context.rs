//! `ExecutionContext` (§3, §6): the per-request bundle threaded through planning, caching, and
//! execution — query text, variables, the operation name to select, and the request's
//! cancellation handle.

use std::sync::Arc;

use serde_json_bytes::Map;
use serde_json_bytes::Value;
use tokio_util::sync::CancellationToken;

/// Everything a single client request carries through `get_plans` and `execute` (§4.5).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub query: String,
    pub operation_name: Option<Arc<str>>,
    pub variables: Map<serde_json_bytes::ByteString, Value>,
    /// A SHA-256 hex fingerprint supplied by the caller, or `None` when it has not been computed
    /// yet (§4.4 "automatic persisted query" negotiation).
    pub fingerprint: Option<Arc<str>>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Map::new(),
            fingerprint: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_variables(mut self, variables: Map<serde_json_bytes::ByteString, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<Arc<str>>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
