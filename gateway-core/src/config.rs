//! `GatewayConfig` (§4.5 ambient addition): the typed, `serde`-(de)serializable configuration
//! surface for the gateway's tunables. Parsing this from a file or an environment schema is left
//! to an embedder, following the teacher's `configuration` crate's habit of keeping the typed
//! struct decoupled from the file format that populates it.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Default TTL a cached plan survives without being retrieved again (§4.4).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(4).expect("4 is nonzero")
}

fn default_queue_capacity() -> NonZeroUsize {
    NonZeroUsize::new(64).expect("64 is nonzero")
}

fn default_channel_capacity() -> NonZeroUsize {
    NonZeroUsize::new(64).expect("64 is nonzero")
}

/// Tunables for a [`crate::gateway::Gateway`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// How long an entry survives in the plan cache without being retrieved again (§4.4).
    #[serde(with = "humantime_serde_duration")]
    pub cache_ttl: Duration,

    /// Worker count for the query planner's bounded work-queue pool (§5).
    pub planner_worker_count: NonZeroUsize,

    /// Capacity of the planner's work queue; should be at least the fan-out of any one selection
    /// set the gateway expects to plan (§5).
    pub planner_queue_capacity: NonZeroUsize,

    /// Capacity of the bounded channel the executor's step tasks submit completions through
    /// (§4.3 "Stitcher").
    pub executor_channel_capacity: NonZeroUsize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
            planner_worker_count: default_worker_count(),
            planner_queue_capacity: default_queue_capacity(),
            executor_channel_capacity: default_channel_capacity(),
        }
    }
}

/// `Duration` has no native human-readable serde representation; this module keeps the wire
/// format (seconds, as an integer) decoupled from the in-memory type.
mod humantime_serde_duration {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
