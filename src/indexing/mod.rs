//! Workspace indexing: file discovery and the service that owns the
//! document model and caches.

pub mod walker;
pub mod workspace;

pub use walker::FileWalker;
pub use workspace::{IndexStats, Workspace};
