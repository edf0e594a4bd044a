//! Per-request search context.
//!
//! One `SearchContext` is created at the root of an inference request and
//! passed down explicitly through every nested call. Nested inference on the
//! same request therefore shares the tier-1 cache and the recursion guard by
//! construction — there is no ambient thread-local stack to keep balanced.

use std::collections::HashSet;
use std::rc::Rc;

use crate::cache::{LocalTypeCache, local_cache};
use crate::config::CacheConfig;
use crate::error::IntelResult;
use crate::infer::guard::RecursionGuard;
use crate::types::{CancelToken, FileId};

/// Which files a request is allowed to see.
#[derive(Debug, Clone, Default)]
pub enum SearchScope {
    #[default]
    Everything,
    Files(HashSet<FileId>),
}

impl SearchScope {
    pub fn contains(&self, file: FileId) -> bool {
        match self {
            SearchScope::Everything => true,
            SearchScope::Files(files) => files.contains(&file),
        }
    }
}

/// Scope object for one top-level inference request.
pub struct SearchContext {
    /// Stub-only mode: answer purely from caches, skip stub-index lookups.
    dumb: bool,
    /// Which value of a multi-return expression is being asked for.
    ret_index: Option<usize>,
    scope: SearchScope,
    local_types: LocalTypeCache,
    guard: Rc<RecursionGuard>,
    cancel: CancelToken,
}

impl SearchContext {
    pub fn new(config: &CacheConfig, cancel: CancelToken) -> Self {
        Self {
            dumb: false,
            ret_index: None,
            scope: SearchScope::Everything,
            local_types: local_cache(config.tier1_capacity),
            guard: RecursionGuard::new(),
            cancel,
        }
    }

    pub fn dumb(mut self) -> Self {
        self.dumb = true;
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_ret_index(mut self, index: usize) -> Self {
        self.ret_index = Some(index);
        self
    }

    pub fn is_dumb(&self) -> bool {
        self.dumb
    }

    pub fn ret_index(&self) -> Option<usize> {
        self.ret_index
    }

    /// Swap out the multi-return index for a nested inference, returning the
    /// previous value so the caller can restore it.
    pub fn take_ret_index(&mut self) -> Option<usize> {
        self.ret_index.take()
    }

    pub fn set_ret_index(&mut self, index: Option<usize>) {
        self.ret_index = index;
    }

    pub fn scope(&self) -> &SearchScope {
        &self.scope
    }

    pub fn guard(&self) -> &Rc<RecursionGuard> {
        &self.guard
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn check_cancelled(&self) -> IntelResult<()> {
        self.cancel.check()
    }

    pub fn local_types_mut(&mut self) -> &mut LocalTypeCache {
        &mut self.local_types
    }
}
