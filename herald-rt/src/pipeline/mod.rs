//! Ordered interception hooks around send, receive, dead-letter, and error
//! paths, plus the resolved-target cache used by batch send.

pub mod middleware;
pub mod targets;

pub use middleware::{ChainOutcome, Middleware, MiddlewareChain, MiddlewareDecision};
pub use targets::{
    group_by_target, ResolvedTarget, TargetCache, DEFAULT_MAX_CONCURRENT_BATCHES,
    DIRECT_SEND_THRESHOLD,
};
