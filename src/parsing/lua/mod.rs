//! Lua front end: tree-sitter parsing plus the EmmyLua annotation dialect.
//!
//! [`parser`] lowers source files into [`crate::parsing::decl::FileDecls`];
//! [`annotation`] handles the `---@` comment grammar the lowering relies on.

pub mod annotation;
pub mod parser;

pub use annotation::{Annotation, parse_annotation, parse_type_ref};
pub use parser::LuaSourceParser;
