//! Type inference: the search context, recursion guard, and engine.

pub mod context;
pub mod engine;
pub mod guard;

pub use context::{SearchContext, SearchScope};
pub use engine::InferenceEngine;
pub use guard::{GuardKey, GuardToken, RecursionGuard};
