//! Request and response middleware (§6 "Middleware capabilities"). Request middlewares observe
//! the plan list before execution begins; response middlewares observe a fully stitched, scrubbed
//! response and may mutate it in place (§5 "Ordering guarantees").

use gateway_federation::plan::PlanList;
use serde_json_bytes::Value;

use crate::context::ExecutionContext;
use crate::error::GatewayError;

/// Runs before planning results are handed to the executor. Returning `Err` aborts the request
/// before any downstream call is made (§7 "Propagation policy").
#[async_trait::async_trait]
pub trait RequestMiddleware: Send + Sync {
    async fn on_request(&self, ctx: &ExecutionContext, plans: &PlanList) -> Result<(), GatewayError>;
}

/// Runs once the executor has produced a fully stitched, scrubbed response. May mutate `response`
/// in place; an error replaces `data` with an error list rather than returning partial data
/// (§7 "Propagation policy", scenario 6).
#[async_trait::async_trait]
pub trait ResponseMiddleware: Send + Sync {
    async fn on_response(&self, ctx: &ExecutionContext, response: &mut Value) -> Result<(), GatewayError>;
}
