//! Core identifier and type-model types.
//!
//! `NodeRef` carries the generation of the parse that produced it; resolving
//! one against the document model fails once the file has been re-indexed.
//! This replaces GC-cleared soft references with an explicit validity check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{IntelError, IntelResult};

/// Compact string used for names held long-term in caches.
pub type CompactString = Box<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

impl FileId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

/// Index of a declaration/expression node within one parsed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Reference to a node in a specific parse of a file.
///
/// `generation` is the document model's generation counter at parse time.
/// A mismatch against the current generation means the reference is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub file: FileId,
    pub node: NodeId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u16,
    pub end_line: u32,
    pub end_column: u16,
}

impl Range {
    pub fn new(start_line: u32, start_column: u16, end_line: u32, end_column: u16) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// Cache key for one inferred type.
///
/// The multi-return index is part of the key: the second value of `f()` and
/// the first value of `f()` at the same call node must not collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub file: FileId,
    pub node: NodeId,
    pub ret_index: u8,
}

impl TypeKey {
    pub fn new(file: FileId, node: NodeId, ret_index: u8) -> Self {
        Self {
            file,
            node,
            ret_index,
        }
    }
}

/// An inferred Lua type.
///
/// `Unknown` is the neutral sentinel: it is what guarded re-entry and failed
/// lookups produce, and it is never written into any cache tier.
#[derive(Debug, Clone, PartialEq)]
pub enum LuaType {
    Unknown,
    Any,
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function(FunctionType),
    Class(CompactString),
    Union(Vec<LuaType>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionType {
    pub params: Vec<CompactString>,
    pub returns: Vec<LuaType>,
}

impl LuaType {
    pub fn class(name: &str) -> Self {
        LuaType::Class(name.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, LuaType::Unknown)
    }

    /// Return type at `index` when this is a function, Unknown otherwise.
    pub fn return_at(&self, index: usize) -> LuaType {
        match self {
            LuaType::Function(f) => f.returns.get(index).cloned().unwrap_or(LuaType::Unknown),
            _ => LuaType::Unknown,
        }
    }
}

impl fmt::Display for LuaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaType::Unknown => write!(f, "unknown"),
            LuaType::Any => write!(f, "any"),
            LuaType::Nil => write!(f, "nil"),
            LuaType::Boolean => write!(f, "boolean"),
            LuaType::Number => write!(f, "number"),
            LuaType::String => write!(f, "string"),
            LuaType::Table => write!(f, "table"),
            LuaType::Function(func) => {
                write!(f, "fun({})", func.params.join(", "))?;
                if !func.returns.is_empty() {
                    let rets: Vec<String> = func.returns.iter().map(|t| t.to_string()).collect();
                    write!(f, ": {}", rets.join(", "))?;
                }
                Ok(())
            }
            LuaType::Class(name) => write!(f, "{name}"),
            LuaType::Union(parts) => {
                let rendered: Vec<String> = parts.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", rendered.join("|"))
            }
        }
    }
}

/// A type as written in an annotation, before resolution.
///
/// Names are resolved lazily against aliases and classes at inference time;
/// a `TypeRef` itself never holds a resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Any,
    Fun { returns: Vec<TypeRef> },
    Union(Vec<TypeRef>),
    Name(CompactString),
}

/// Cooperative cancellation signal, shared with the host.
///
/// Long-running operations check it before starting the next unit of work
/// (the next class in a hierarchy walk, the next nested inference).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Propagate cancellation as an error.
    pub fn check(&self) -> IntelResult<()> {
        if self.is_cancelled() {
            Err(IntelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_rejects_zero() {
        assert!(FileId::new(0).is_none());
        assert_eq!(FileId::new(7).unwrap().value(), 7);
    }

    #[test]
    fn test_return_at() {
        let f = LuaType::Function(FunctionType {
            params: vec![],
            returns: vec![LuaType::Number, LuaType::String],
        });
        assert_eq!(f.return_at(0), LuaType::Number);
        assert_eq!(f.return_at(1), LuaType::String);
        assert_eq!(f.return_at(2), LuaType::Unknown);
        assert_eq!(LuaType::Nil.return_at(0), LuaType::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(LuaType::class("Player").to_string(), "Player");
        assert_eq!(
            LuaType::Union(vec![LuaType::Number, LuaType::Nil]).to_string(),
            "number|nil"
        );
        let f = LuaType::Function(FunctionType {
            params: vec!["self".into(), "dt".into()],
            returns: vec![LuaType::Boolean],
        });
        assert_eq!(f.to_string(), "fun(self, dt): boolean");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(IntelError::Cancelled)));
        // clones observe the same flag
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
