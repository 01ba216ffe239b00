//! The Plan Cache (§4.4): at-most-once plan compilation per fingerprint, with TTL eviction.
//!
//! At-most-once compilation is a single-flight pattern — a map from fingerprint to an in-progress
//! [`futures::future::Shared`] compilation future — the idiomatic Rust answer to "many callers ask
//! for the same not-yet-ready value at once", conceptually the same request-coalescing the
//! teacher's own caches do even though the concrete cache crate differs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::Shared;
use gateway_federation::error::PlanError;
use gateway_federation::plan::PlanList;
use gateway_federation::plan::planner::QueryPlanner;
use parking_lot::Mutex;
use sha2::Digest;
use sha2::Sha256;

use crate::context::ExecutionContext;
use crate::error::CacheError;

pub type Fingerprint = Arc<str>;

type CompileFuture = Shared<Pin<Box<dyn Future<Output = Result<Arc<PlanList>, PlanError>> + Send>>>;

fn fingerprint_of(query: &str) -> Fingerprint {
    let digest = Sha256::digest(query.as_bytes());
    Arc::from(format!("{digest:x}"))
}

struct CacheEntry {
    plans: Arc<PlanList>,
    last_used: Mutex<Instant>,
}

/// Replaceable plan-compilation strategy behind the gateway facade (§6 "Cache capability").
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Resolve `ctx`'s query to a [`PlanList`], using `planner` to compile on a miss. When `ctx`
    /// carried no fingerprint and one is computed here, it is written back onto `ctx` (§4.4
    /// "the fingerprint is a pointer").
    async fn retrieve(&self, ctx: &mut ExecutionContext, planner: &QueryPlanner) -> Result<Arc<PlanList>, CacheError>;
}

/// Always recompiles; installed via `withNoQueryPlanCache` (§4.5).
#[derive(Default)]
pub struct NoCache;

#[async_trait::async_trait]
impl Cache for NoCache {
    async fn retrieve(&self, ctx: &mut ExecutionContext, planner: &QueryPlanner) -> Result<Arc<PlanList>, CacheError> {
        let plans = planner.plan(&ctx.query).await?;
        Ok(Arc::new(plans))
    }
}

/// A TTL-evicting, single-flight plan cache (§4.4, §5).
pub struct AutomaticPlanCache {
    entries: Arc<DashMap<Fingerprint, CacheEntry>>,
    in_flight: DashMap<Fingerprint, CompileFuture>,
    ttl: Duration,
    armed: Arc<Mutex<bool>>,
}

impl AutomaticPlanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            in_flight: DashMap::new(),
            ttl,
            armed: Arc::new(Mutex::new(false)),
        }
    }

    /// (Re)arm the TTL sweeper if it isn't already scheduled (§4.4 "TTL eviction", §9's
    /// `parking_lot::Mutex<bool>` armed-flag design).
    fn touch_sweeper(&self) {
        let mut armed = self.armed.lock();
        if *armed {
            return;
        }
        *armed = true;
        drop(armed);

        let entries = Arc::clone(&self.entries);
        let armed_flag = Arc::clone(&self.armed);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let cutoff = Instant::now();
            entries.retain(|_, entry| cutoff.duration_since(*entry.last_used.lock()) < ttl);
            *armed_flag.lock() = false;
        });
    }

    async fn compile(&self, planner: &QueryPlanner, query: String, fingerprint: Fingerprint) -> Result<Arc<PlanList>, PlanError> {
        if let Some(existing) = self.in_flight.get(&fingerprint) {
            return existing.clone().await;
        }

        let planner = planner.clone();
        let fut: Pin<Box<dyn Future<Output = Result<Arc<PlanList>, PlanError>> + Send>> = Box::pin(async move {
            planner.plan(&query).await.map(Arc::new)
        });
        let shared = fut.shared();
        self.in_flight.insert(fingerprint.clone(), shared.clone());

        let result = shared.await;
        self.in_flight.remove(&fingerprint);
        result
    }
}

#[async_trait::async_trait]
impl Cache for AutomaticPlanCache {
    async fn retrieve(&self, ctx: &mut ExecutionContext, planner: &QueryPlanner) -> Result<Arc<PlanList>, CacheError> {
        if let Some(fingerprint) = ctx.fingerprint.clone() {
            if let Some(entry) = self.entries.get(&fingerprint) {
                *entry.last_used.lock() = Instant::now();
                self.touch_sweeper();
                return Ok(Arc::clone(&entry.plans));
            }

            if ctx.query.is_empty() {
                return Err(CacheError::PersistedQueryNotFound);
            }

            let plans = self.compile(planner, ctx.query.clone(), fingerprint.clone()).await?;
            self.entries.insert(
                fingerprint,
                CacheEntry {
                    plans: Arc::clone(&plans),
                    last_used: Mutex::new(Instant::now()),
                },
            );
            self.touch_sweeper();
            return Ok(plans);
        }

        let fingerprint = fingerprint_of(&ctx.query);
        let plans = self.compile(planner, ctx.query.clone(), fingerprint.clone()).await?;
        self.entries.insert(
            fingerprint.clone(),
            CacheEntry {
                plans: Arc::clone(&plans),
                last_used: Mutex::new(Instant::now()),
            },
        );
        self.touch_sweeper();
        ctx.fingerprint = Some(fingerprint);
        Ok(plans)
    }
}

/// The replaceable cache a [`crate::gateway::Gateway`] holds: either variant the distilled spec
/// names directly (§4.5 `withNoQueryPlanCache`/`withAutomaticQueryPlanCache`), or a caller-supplied
/// one via `withQueryPlanCache`.
pub enum PlanCache {
    Automatic(AutomaticPlanCache),
    None(NoCache),
    Custom(Arc<dyn Cache>),
}

#[async_trait::async_trait]
impl Cache for PlanCache {
    async fn retrieve(&self, ctx: &mut ExecutionContext, planner: &QueryPlanner) -> Result<Arc<PlanList>, CacheError> {
        match self {
            PlanCache::Automatic(cache) => cache.retrieve(ctx, planner).await,
            PlanCache::None(cache) => cache.retrieve(ctx, planner).await,
            PlanCache::Custom(cache) => cache.retrieve(ctx, planner).await,
        }
    }
}

impl Default for PlanCache {
    /// The "default long" TTL named throughout the spec: one hour (§4.5).
    fn default() -> Self {
        PlanCache::Automatic(AutomaticPlanCache::new(Duration::from_secs(3600)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use gateway_federation::merge::RemoteSchema;
    use gateway_federation::merge::merge;
    use apollo_compiler::ast::Document;

    use super::*;

    fn planner() -> QueryPlanner {
        let schema = RemoteSchema::new(
            "url1",
            Document::parse("type Query { allUsers: [String!]! }", "url1.graphql").unwrap(),
        );
        let unified = merge(&[schema]).unwrap();
        QueryPlanner::new(Arc::new(unified))
    }

    #[tokio::test]
    async fn scenario_4_automatic_persisted_query_lifecycle() {
        let cache = AutomaticPlanCache::new(Duration::from_millis(50));
        let planner = planner();

        let mut empty_lookup = ExecutionContext::new("").with_fingerprint("deadbeef");
        let miss = cache.retrieve(&mut empty_lookup, &planner).await;
        assert!(matches!(miss, Err(CacheError::PersistedQueryNotFound)));

        let mut compile = ExecutionContext::new("{ allUsers }").with_fingerprint("deadbeef");
        cache.retrieve(&mut compile, &planner).await.unwrap();

        let mut cached_lookup = ExecutionContext::new("").with_fingerprint("deadbeef");
        let hit = cache.retrieve(&mut cached_lookup, &planner).await.unwrap();
        assert_eq!(hit.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        // A hit after the TTL elapsed should have evicted the entry and treated it as a miss.
        let mut after_ttl = ExecutionContext::new("").with_fingerprint("deadbeef");
        let evicted = cache.retrieve(&mut after_ttl, &planner).await;
        assert!(matches!(evicted, Err(CacheError::PersistedQueryNotFound)));
    }

    #[tokio::test]
    async fn retrieve_without_a_fingerprint_writes_one_back() {
        let cache = AutomaticPlanCache::new(Duration::from_secs(60));
        let planner = planner();
        let mut ctx = ExecutionContext::new("{ allUsers }");
        assert!(ctx.fingerprint.is_none());
        cache.retrieve(&mut ctx, &planner).await.unwrap();
        assert!(ctx.fingerprint.is_some());
    }

    #[tokio::test]
    async fn no_cache_invokes_the_planner_every_time() {
        let cache = NoCache;
        let planner = planner();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let mut ctx = ExecutionContext::new("{ allUsers }");
            cache.retrieve(&mut ctx, &planner).await.unwrap();
            calls.fetch_add(1, Ordering::Relaxed);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
