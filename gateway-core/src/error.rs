//! Error kinds produced by the executor, the plan cache, and the gateway facade.
//!
//! Mirrors `gateway_federation::error`'s one-enum-per-phase shape: [`ExecError`] is what
//! [`crate::executor::ParallelExecutor`] fails with, [`CacheError`] is what
//! [`crate::cache::PlanCache::retrieve`] fails with, and [`GatewayError`] is the top-level enum the
//! facade returns, composing the others via `#[from]` the same way the teacher's `FederationError`
//! wraps `SingleFederationError`/`CompositionError`.

use std::sync::Arc;

use gateway_federation::error::MergeError;
use gateway_federation::error::PlanError;
use gateway_federation::plan::InsertionPoint;
use gateway_federation::plan::error_path;

/// Why a single step's queryer call, or the stitching of its result, failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("queryer at location \"{location}\" failed: {message}")]
    Queryer { location: Arc<str>, message: String },

    #[error("list element at \"{path}\" is missing the id required to address its child step")]
    StitchMissing { path: String },

    #[error("result at \"{path}\" did not have the shape the plan expected: {reason}")]
    StitchShape { path: String, reason: String },

    #[error("request was canceled")]
    Canceled,
}

impl ExecError {
    /// Render this failure as a `GraphQLError.path` segment list (§6), when one is known.
    pub fn path_hint(&self, insertion_point: &InsertionPoint) -> Vec<apollo_compiler::Name> {
        error_path(insertion_point)
    }
}

/// Why [`crate::cache::PlanCache::retrieve`] could not produce a plan list.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Cache miss with no query text supplied: the caller must resend with the full operation
    /// text (§4.4, §7). Recoverable — the HTTP layer negotiates an APQ retry from this.
    #[error("PersistedQueryNotFound")]
    PersistedQueryNotFound,

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// The top-level error the [`crate::gateway::Gateway`] facade returns.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Schema(#[from] MergeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("request middleware rejected the request: {0}")]
    RequestMiddleware(String),

    #[error("response middleware failed: {0}")]
    ResponseMiddleware(String),

    #[error("document declares more than one operation and none was selected by name")]
    AmbiguousOperation,

    #[error("operation named \"{0}\" was not found in the compiled plan list")]
    OperationNotFound(Arc<str>),
}
