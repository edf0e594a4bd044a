//! Class hierarchy resolution and caching.
//!
//! A hierarchy snapshot is built iteratively with an explicit work stack and
//! a visited set, so cyclic inheritance (`A : B : A`, or a class reaching
//! itself through an alias chain) terminates instead of recursing. The
//! queried class is expanded first and members merge first-wins, which makes
//! the most-derived declaration shadow everything above it.
//!
//! Snapshots are cached by class name together with a fingerprint of every
//! (file, generation) pair that contributed members. A fingerprint mismatch
//! on lookup forces a rebuild; `invalidate` additionally cascades to every
//! cached entry whose superclass chain contains the invalidated name.

use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{IntelError, IntelResult};
use crate::parsing::decl::MemberDecl;
use crate::types::{CancelToken, CompactString, FileId};

/// One class definition record as the stub index sees it: the contribution
/// of a single file to a class (annotation declaration and/or code-defined
/// methods).
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: CompactString,
    pub superclass: Option<CompactString>,
    pub fields: Vec<MemberDecl>,
    pub methods: Vec<MemberDecl>,
    pub file: FileId,
    pub generation: u64,
}

/// Source of class definitions, implemented by the stub index.
///
/// `class_defs` distinguishes confirmed absence (`Ok` with an empty vec)
/// from transient unavailability (`Err(IndexNotReady)`); the hierarchy
/// builder folds the latter into absence but never absorbs `Cancelled`.
pub trait ClassDefProvider {
    fn class_defs(&self, name: &str) -> IntelResult<Vec<ClassDef>>;

    /// Current generation stamp of a file, `None` when the file is gone.
    fn file_stamp(&self, file: FileId) -> Option<u64>;
}

/// Flattened view of a class and all of its ancestors.
#[derive(Debug, Clone)]
pub struct ClassHierarchyInfo {
    pub name: CompactString,
    /// Ancestor names from direct superclass to root, self excluded.
    pub superclasses: Vec<CompactString>,
    /// Merged methods; a name resolves to its most-derived declaration.
    pub methods: IndexMap<CompactString, MemberDecl>,
    /// Merged fields, same precedence rule.
    pub fields: IndexMap<CompactString, MemberDecl>,
    /// (file, generation) of every contributing parse, for staleness checks.
    pub fingerprint: Vec<(FileId, u64)>,
}

impl ClassHierarchyInfo {
    /// Look up a member by name, methods first.
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.methods.get(name).or_else(|| self.fields.get(name))
    }

    pub fn member_count(&self) -> usize {
        self.methods.len() + self.fields.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberDecl> {
        self.methods.values().chain(self.fields.values())
    }
}

struct HierarchyEntry {
    info: Arc<ClassHierarchyInfo>,
    refreshed_at: Instant,
}

/// Size-bounded cache of hierarchy snapshots.
pub struct ClassHierarchyCache {
    entries: DashMap<CompactString, HierarchyEntry>,
    capacity: usize,
}

impl ClassHierarchyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Cached or freshly built hierarchy for `name`. `Ok(None)` means the
    /// class cannot be resolved at all right now.
    pub fn get(
        &self,
        name: &str,
        provider: &dyn ClassDefProvider,
        cancel: &CancelToken,
    ) -> IntelResult<Option<Arc<ClassHierarchyInfo>>> {
        cancel.check()?;

        if let Some(mut entry) = self.entries.get_mut(name) {
            if self.is_fresh(&entry.info, provider) {
                entry.refreshed_at = Instant::now();
                tracing::trace!(target: "hierarchy", "hit for {name}");
                return Ok(Some(entry.info.clone()));
            }
        }
        // stale or missing; drop any stale entry before rebuilding
        self.entries.remove(name);

        let Some(info) = self.build(name, provider, cancel)? else {
            return Ok(None);
        };
        let info = Arc::new(info);

        self.entries.insert(
            name.into(),
            HierarchyEntry {
                info: info.clone(),
                refreshed_at: Instant::now(),
            },
        );
        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }

        Ok(Some(info))
    }

    /// Remove `name` and every cached hierarchy that inherits from it.
    /// Conservative: over-invalidation is fine, under-invalidation is not.
    pub fn invalidate(&self, name: &str) {
        self.entries.retain(|class, entry| {
            class.as_ref() != name
                && !entry
                    .info
                    .superclasses
                    .iter()
                    .any(|super_name| super_name.as_ref() == name)
        });
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, info: &ClassHierarchyInfo, provider: &dyn ClassDefProvider) -> bool {
        info.fingerprint
            .iter()
            .all(|(file, generation)| provider.file_stamp(*file) == Some(*generation))
    }

    /// Iterative build: pop a class, merge its members unless already
    /// shadowed, push its unvisited superclass, repeat. The visited set
    /// guarantees termination on any input graph.
    fn build(
        &self,
        name: &str,
        provider: &dyn ClassDefProvider,
        cancel: &CancelToken,
    ) -> IntelResult<Option<ClassHierarchyInfo>> {
        let mut visited: Vec<CompactString> = Vec::new();
        let mut stack: Vec<CompactString> = vec![name.into()];
        let mut superclasses: Vec<CompactString> = Vec::new();
        let mut methods: IndexMap<CompactString, MemberDecl> = IndexMap::new();
        let mut fields: IndexMap<CompactString, MemberDecl> = IndexMap::new();
        let mut fingerprint: Vec<(FileId, u64)> = Vec::new();
        let mut root_resolved = false;

        while let Some(current) = stack.pop() {
            cancel.check()?;

            if visited.contains(&current) {
                continue;
            }
            visited.push(current.clone());

            let defs = match provider.class_defs(&current) {
                Ok(defs) => defs,
                Err(IntelError::Cancelled) => return Err(IntelError::Cancelled),
                Err(e) if e.is_transient() => {
                    tracing::debug!(target: "hierarchy", "{current} unavailable: {e}");
                    continue;
                }
                Err(e) => {
                    // partial-success policy: this class's members are simply
                    // missing from the merged result
                    tracing::warn!(target: "hierarchy", "skipping {current}: {e}");
                    continue;
                }
            };

            if defs.is_empty() {
                continue;
            }
            if current.as_ref() == name {
                root_resolved = true;
            }

            let mut superclass: Option<CompactString> = None;
            for def in defs {
                fingerprint.push((def.file, def.generation));
                for method in def.methods {
                    if !methods.contains_key(&method.name) {
                        methods.insert(method.name.clone(), method);
                    }
                }
                for field in def.fields {
                    if !fields.contains_key(&field.name) {
                        fields.insert(field.name.clone(), field);
                    }
                }
                if superclass.is_none() {
                    superclass = def.superclass;
                }
            }

            if let Some(super_name) = superclass {
                if !visited.contains(&super_name) {
                    superclasses.push(super_name.clone());
                    stack.push(super_name);
                }
            }
        }

        if !root_resolved {
            return Ok(None);
        }

        fingerprint.sort_unstable();
        fingerprint.dedup();

        tracing::debug!(
            target: "hierarchy",
            "built {name}: {} ancestors, {} members",
            superclasses.len(),
            methods.len() + fields.len()
        );

        Ok(Some(ClassHierarchyInfo {
            name: name.into(),
            superclasses,
            methods,
            fields,
            fingerprint,
        }))
    }

    /// Same batch policy as the expiring cache: drop the least recently
    /// refreshed quartile, or enough to get back under capacity.
    fn evict_oldest(&self) {
        let mut stamped: Vec<(CompactString, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.refreshed_at))
            .collect();

        let len = stamped.len();
        let overflow = len.saturating_sub(self.capacity);
        let batch = (len / 4).max(overflow).max(1);

        stamped.sort_by_key(|(_, stamp)| *stamp);
        for (key, _) in stamped.into_iter().take(batch) {
            self.entries.remove(&key);
        }
    }
}
