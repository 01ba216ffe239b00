//! Parallel execution, response stitching, plan caching, and the gateway facade.
//!
//! This crate consumes the plans `gateway_federation` compiles and turns them into actual
//! responses: the [`executor::ParallelExecutor`] dispatches a plan's steps against real
//! [`queryer::Queryer`]s and stitches their results, the [`cache::PlanCache`] avoids recompiling a
//! plan for every request, and [`gateway::Gateway`] is the single entry point an embedder talks to.

pub mod cache;
pub mod context;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod middleware;
pub mod queryer;
pub mod stitch;
pub mod test_support;
