//! Cache tiers for inference results and class hierarchies.

pub mod expiring;
pub mod hierarchy;
pub mod tiered;

pub use expiring::ExpirationAwareCache;
pub use hierarchy::{ClassDef, ClassDefProvider, ClassHierarchyCache, ClassHierarchyInfo};
pub use tiered::{LocalTypeCache, TypeCache, local_cache};
