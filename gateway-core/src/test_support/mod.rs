//! An in-memory [`Queryer`] test double (§8 "Ambient addition — test tooling"), the crate's
//! scaled-down analogue of the teacher's `mockall`/`httpmock`-based subgraph doubles: records every
//! call it receives and answers with a canned response keyed by query string.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json_bytes::Value;

use crate::error::ExecError;
use crate::queryer::QueryRequest;
use crate::queryer::Queryer;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub query_string: String,
    pub variables: Value,
}

/// Returns a canned [`Value`] or [`ExecError`] for each query string it's taught, and records
/// every call it receives so tests can assert on call count and order.
#[derive(Default)]
pub struct MockQueryer {
    responses: Mutex<std::collections::HashMap<String, Result<Value, ExecError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockQueryer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Teach this queryer to answer `query_string` with `response` the next (and every
    /// subsequent) time it is asked.
    pub fn on(self, query_string: impl Into<String>, response: Value) -> Self {
        self.responses.lock().insert(query_string.into(), Ok(response));
        self
    }

    pub fn on_error(self, query_string: impl Into<String>, error: ExecError) -> Self {
        self.responses.lock().insert(query_string.into(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Queryer for MockQueryer {
    async fn query(&self, request: QueryRequest) -> Result<Value, ExecError> {
        let variables = Value::Object(request.variables.clone());
        self.calls.lock().push(RecordedCall {
            query_string: request.query_string.to_string(),
            variables,
        });

        match self.responses.lock().get(request.query_string.as_ref()) {
            Some(result) => result.clone(),
            None => Err(ExecError::Queryer {
                location: Arc::from("mock"),
                message: format!("MockQueryer was not taught a response for: {}", request.query_string),
            }),
        }
    }
}
