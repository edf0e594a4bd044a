//! Re-entry protection for recursive resolution.
//!
//! The guard is owned by the request context, not by a thread-local: the set
//! of in-flight keys travels with the `SearchContext` that is threaded
//! through every inference call. Termination on cyclic input (`alias of
//! alias`, `class extends itself transitively`) comes from refusing to enter
//! a key twice and handing back a neutral result instead.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::types::{CompactString, TypeKey};

/// Identity of one in-flight resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuardKey {
    Class(CompactString),
    Alias(CompactString),
    Node(TypeKey),
}

/// Set of resolutions currently being expanded in one request.
///
/// A key can be held at most once at any time. Use [`RecursionGuard::enter`]
/// to acquire a [`GuardToken`]; the token releases the key when dropped, so
/// release happens on every exit path, early `?` returns and panics included.
#[derive(Debug, Default)]
pub struct RecursionGuard {
    in_flight: RefCell<HashSet<GuardKey>>,
}

impl RecursionGuard {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Try to mark `key` as in flight. Returns `None` when the key is
    /// already being expanded, which the caller must treat as "answer with
    /// the neutral sentinel, do not recurse".
    pub fn enter(self: &Rc<Self>, key: GuardKey) -> Option<GuardToken> {
        if !self.in_flight.borrow_mut().insert(key.clone()) {
            tracing::trace!(target: "infer", "recursion guard refused {key:?}");
            return None;
        }
        Some(GuardToken {
            guard: Rc::clone(self),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &GuardKey) -> bool {
        self.in_flight.borrow().contains(key)
    }

    pub fn depth(&self) -> usize {
        self.in_flight.borrow().len()
    }
}

/// RAII release of a guard key.
pub struct GuardToken {
    guard: Rc<RecursionGuard>,
    key: GuardKey,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.guard.in_flight.borrow_mut().remove(&self.key);
    }
}
