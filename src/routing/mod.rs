//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → matcher.rs (path prefix + POST gates)
//!     → [body buffered by the middleware]
//!     → classifier.rs (JSON field → routing key → destination)
//!     → Return: Forward(destination) or PassThrough(reason)
//!
//! Classifier Compilation (at startup):
//!     RedirectConfig
//!     → Default blank fields
//!     → Parse every destination URL (fail fast)
//!     → Freeze as immutable Classifier
//! ```
//!
//! # Design Decisions
//! - Classifier compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same decision
//! - Exact mapping wins, default destination is the only fallback

pub mod classifier;
pub mod matcher;

pub use classifier::{Classifier, Destination, FieldValue, InterceptDecision, PassReason};
pub use matcher::{Matcher, MethodMatcher, PathPrefixMatcher};
