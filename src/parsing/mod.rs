//! Source parsing and the declaration model it produces.

pub mod decl;
pub mod lua;

pub use decl::{AliasDecl, ClassDecl, ExprNode, ExprShape, FileDecls, MemberDecl, MemberKind};
pub use lua::LuaSourceParser;
