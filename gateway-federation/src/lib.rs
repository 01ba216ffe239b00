//! Schema merging, field-location indexing, and query planning for a GraphQL gateway.
//!
//! This crate owns everything that can be computed ahead of a request reaching a downstream
//! service: reducing a set of subgraph schemas into one [`merge::UnifiedSchema`], and splitting an
//! incoming operation against it into a [`plan::Plan`] tree of per-location steps. Executing that
//! tree against real `Queryer`s is `gateway-core`'s job.

pub mod error;
pub mod location_map;
pub mod merge;
pub mod plan;
pub mod selection;
