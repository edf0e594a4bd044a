//! Type intelligence for Lua workspaces.
//!
//! The crate indexes annotated Lua sources into a stub index and document
//! model, infers expression types through a tiered, generation-validated
//! cache, flattens class hierarchies with cycle-safe traversal, and exposes
//! a small debugger bridge for shipping the bootstrap script to a debuggee.
//!
//! Everything is owned explicitly: a [`Workspace`] service object holds the
//! shared state, and each query threads a [`SearchContext`] through the
//! inference layer. There are no process-global caches.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod indexing;
pub mod infer;
pub mod logging;
pub mod parsing;
pub mod types;

pub use cache::{ClassHierarchyCache, ClassHierarchyInfo, ExpirationAwareCache, TypeCache};
pub use config::Settings;
pub use error::{IntelError, IntelResult};
pub use index::{DocumentModel, StubIndex};
pub use indexing::{IndexStats, Workspace};
pub use infer::{InferenceEngine, SearchContext, SearchScope};
pub use types::{CancelToken, FileId, LuaType, NodeId, NodeRef, TypeKey};
