//! Tiered type cache.
//!
//! Tier 1 is a small strict-LRU map owned by the request's `SearchContext`;
//! tier 2 is the project-shared `ExpirationAwareCache`. A tier-2 hit is
//! promoted into tier 1 before it is returned. Values in tier 2 carry the
//! generation of the parse they were inferred against; a mismatch against
//! the document model's current generation is a miss and drops the entry.
//!
//! The `Unknown` sentinel is never written to either tier: a negative
//! inference may become positive once more files are indexed, and caching it
//! would poison every downstream caller until the TTL ran out.
//!
//! There is deliberately no third tier delegating to an automatic
//! dependency-tracking layer. Populating such a tier re-enters the inference
//! call that is populating it; the cache write path must stay a plain map
//! insert.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cache::ExpirationAwareCache;
use crate::config::CacheConfig;
use crate::index::DocumentModel;
use crate::types::{LuaType, TypeKey};

/// A tier-2 value plus the generation stamp of the parse it came from.
#[derive(Debug, Clone)]
struct CachedType {
    ty: LuaType,
    generation: u64,
}

/// Request-scoped tier 1. Strict LRU with a small capacity.
pub type LocalTypeCache = LruCache<TypeKey, LuaType>;

pub fn local_cache(capacity: usize) -> LocalTypeCache {
    LruCache::new(NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1"))
}

/// Shared tier 2 plus the promotion/write-back rules.
pub struct TypeCache {
    shared: ExpirationAwareCache<TypeKey, CachedType>,
}

impl TypeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            shared: ExpirationAwareCache::new(
                config.tier2_capacity,
                Duration::from_secs(config.tier2_ttl_secs),
                Duration::from_secs(config.sweep_cooldown_secs),
            ),
        }
    }

    /// Tiered lookup: tier 1, then validated tier 2 with promotion.
    pub fn get(
        &self,
        local: &mut LocalTypeCache,
        model: &DocumentModel,
        key: &TypeKey,
    ) -> Option<LuaType> {
        if let Some(ty) = local.get(key) {
            tracing::trace!(target: "cache", "tier-1 hit for {key:?}");
            return Some(ty.clone());
        }

        let cached = self.shared.get(key)?;
        if model.generation(key.file) != Some(cached.generation) {
            // inferred against a parse that no longer exists
            self.shared.remove(key);
            return None;
        }

        tracing::trace!(target: "cache", "tier-2 hit for {key:?}, promoting");
        local.put(*key, cached.ty.clone());
        Some(cached.ty)
    }

    /// Write a successful inference through both tiers. Sentinel values are
    /// dropped, and a value for a file the model no longer knows is dropped
    /// too (nothing could ever validate it).
    pub fn put(
        &self,
        local: &mut LocalTypeCache,
        model: &DocumentModel,
        key: TypeKey,
        ty: &LuaType,
    ) {
        if ty.is_unknown() {
            return;
        }
        let Some(generation) = model.generation(key.file) else {
            return;
        };

        local.put(key, ty.clone());
        self.shared.put(
            key,
            CachedType {
                ty: ty.clone(),
                generation,
            },
        );
    }

    pub fn shared_len(&self) -> usize {
        self.shared.len()
    }

    pub fn clear(&self) {
        self.shared.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::decl::{ExprShape, FileDecls};
    use crate::types::{NodeId, Range};
    use std::path::Path;

    fn config() -> CacheConfig {
        CacheConfig::default()
    }

    fn model_with_file(path: &str) -> (DocumentModel, crate::types::FileId) {
        let model = DocumentModel::new();
        let mut decls = FileDecls::default();
        decls.push_expr(ExprShape::NumberLit, Range::new(1, 0, 1, 1));
        let (file, _, _) = model.update(Path::new(path), "h1".to_string(), decls);
        (model, file)
    }

    #[test]
    fn test_roundtrip_and_promotion() {
        let cache = TypeCache::new(&config());
        let (model, file) = model_with_file("a.lua");
        let key = TypeKey::new(file, NodeId(0), 0);

        let mut local = local_cache(4);
        cache.put(&mut local, &model, key, &LuaType::Number);
        assert_eq!(cache.get(&mut local, &model, &key), Some(LuaType::Number));

        // a fresh request (empty tier 1) still hits tier 2 and promotes
        let mut fresh = local_cache(4);
        assert_eq!(cache.get(&mut fresh, &model, &key), Some(LuaType::Number));
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_unknown_sentinel_never_cached() {
        let cache = TypeCache::new(&config());
        let (model, file) = model_with_file("a.lua");
        let key = TypeKey::new(file, NodeId(0), 0);
        let mut local = local_cache(4);

        cache.put(&mut local, &model, key, &LuaType::Unknown);
        assert_eq!(local.len(), 0);
        assert_eq!(cache.shared_len(), 0);
        assert_eq!(cache.get(&mut local, &model, &key), None);
    }

    #[test]
    fn test_generation_mismatch_is_a_miss() {
        let cache = TypeCache::new(&config());
        let (model, file) = model_with_file("a.lua");
        let key = TypeKey::new(file, NodeId(0), 0);
        let mut local = local_cache(4);

        cache.put(&mut local, &model, key, &LuaType::String);

        // re-index drops the tier-2 entry on next read
        let mut decls = FileDecls::default();
        decls.push_expr(ExprShape::StringLit, Range::new(1, 0, 1, 1));
        model.update(Path::new("a.lua"), "h2".to_string(), decls);

        let mut fresh = local_cache(4);
        assert_eq!(cache.get(&mut fresh, &model, &key), None);
        assert_eq!(cache.shared_len(), 0);
    }

    #[test]
    fn test_tier1_strict_lru() {
        let (model, file) = model_with_file("a.lua");
        let cache = TypeCache::new(&config());
        let mut local = local_cache(100);

        for i in 0..150u32 {
            let key = TypeKey::new(file, NodeId(i), 0);
            cache.put(&mut local, &model, key, &LuaType::Number);
        }

        assert_eq!(local.len(), 100);
        // the 100 most recently inserted survive
        for i in 50..150u32 {
            assert!(local.contains(&TypeKey::new(file, NodeId(i), 0)), "missing node {i}");
        }
        for i in 0..50u32 {
            assert!(!local.contains(&TypeKey::new(file, NodeId(i), 0)), "node {i} should be evicted");
        }
    }

    #[test]
    fn test_ret_index_is_part_of_the_key() {
        let cache = TypeCache::new(&config());
        let (model, file) = model_with_file("a.lua");
        let mut local = local_cache(4);

        cache.put(
            &mut local,
            &model,
            TypeKey::new(file, NodeId(0), 0),
            &LuaType::Number,
        );
        cache.put(
            &mut local,
            &model,
            TypeKey::new(file, NodeId(0), 1),
            &LuaType::String,
        );

        assert_eq!(
            cache.get(&mut local, &model, &TypeKey::new(file, NodeId(0), 0)),
            Some(LuaType::Number)
        );
        assert_eq!(
            cache.get(&mut local, &model, &TypeKey::new(file, NodeId(0), 1)),
            Some(LuaType::String)
        );
    }
}
