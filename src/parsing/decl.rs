//! Declarations extracted from one parsed Lua file.
//!
//! The parser lowers the tree-sitter CST into these flat records; everything
//! downstream (stub index, hierarchy cache, inference) works on them and
//! never touches the CST again. Expression nodes keep only the shape needed
//! to infer a type, addressed by their `NodeId` within the file.

use std::collections::HashMap;

use crate::types::{CompactString, NodeId, Range, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

/// One declared member of a class.
#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub name: CompactString,
    pub kind: MemberKind,
    /// Class the member was declared on (not where it is ultimately found
    /// after hierarchy merging).
    pub owner: CompactString,
    /// Annotated type, when present.
    pub ty: Option<TypeRef>,
    pub range: Range,
}

impl MemberDecl {
    pub fn field(name: &str, owner: &str, ty: Option<TypeRef>, range: Range) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field,
            owner: owner.into(),
            ty,
            range,
        }
    }

    pub fn method(name: &str, owner: &str, ty: Option<TypeRef>, range: Range) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            owner: owner.into(),
            ty,
            range,
        }
    }
}

/// A `---@class Name : Super` declaration with its annotated fields.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: CompactString,
    pub superclass: Option<CompactString>,
    pub fields: Vec<MemberDecl>,
    pub range: Range,
}

/// A `---@alias Name Target` declaration.
#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: CompactString,
    pub target: TypeRef,
}

/// The inferable shape of one expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprShape {
    NilLit,
    BoolLit,
    NumberLit,
    StringLit,
    TableCtor,
    /// A function definition; returns come from `---@return` annotations.
    FunctionDef {
        params: Vec<CompactString>,
        returns: Vec<TypeRef>,
    },
    /// Reference to a name resolved local-first, then global, then class.
    NameRef(CompactString),
    /// A call of another expression node in the same file.
    Call { callee: NodeId },
    /// Member access `base.member` / `base:member`.
    Index { base: NodeId, member: CompactString },
    /// Expression pinned by a `---@type` annotation.
    Annotated(TypeRef),
    /// `setmetatable(_, Meta)` with an identifier metatable argument.
    Setmeta { meta: CompactString },
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    pub id: NodeId,
    pub shape: ExprShape,
    pub range: Range,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct FileDecls {
    pub classes: Vec<ClassDecl>,
    pub aliases: Vec<AliasDecl>,
    /// Methods defined in code (`function Owner:name()` / `function Owner.name()`),
    /// owner-qualified; the stub index attaches them to class records.
    pub methods: Vec<MemberDecl>,
    /// Expression arena, indexed by `NodeId`.
    pub exprs: Vec<ExprNode>,
    /// Local declarations: name to the node of its initializer.
    pub locals: HashMap<CompactString, NodeId>,
    /// Global assignments in this file: name to the assigned node.
    pub globals: Vec<(CompactString, NodeId)>,
}

impl FileDecls {
    pub fn expr(&self, id: NodeId) -> Option<&ExprNode> {
        self.exprs.get(id.value() as usize)
    }

    /// Append an expression node and return its id.
    pub fn push_expr(&mut self, shape: ExprShape, range: Range) -> NodeId {
        let id = NodeId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { id, shape, range });
        id
    }

    /// Names of all classes this file contributes to, declarations and
    /// code-defined methods alike. Used for hierarchy invalidation when the
    /// file is re-indexed.
    pub fn contributed_classes(&self) -> Vec<CompactString> {
        let mut names: Vec<CompactString> = self.classes.iter().map(|c| c.name.clone()).collect();
        for method in &self.methods {
            if !names.contains(&method.owner) {
                names.push(method.owner.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_expr_assigns_sequential_ids() {
        let mut decls = FileDecls::default();
        let range = Range::new(1, 0, 1, 4);
        let a = decls.push_expr(ExprShape::NumberLit, range);
        let b = decls.push_expr(ExprShape::StringLit, range);
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
        assert_eq!(decls.expr(b).unwrap().shape, ExprShape::StringLit);
        assert!(decls.expr(NodeId(2)).is_none());
    }

    #[test]
    fn test_contributed_classes_dedupes() {
        let mut decls = FileDecls::default();
        let range = Range::new(1, 0, 1, 4);
        decls.classes.push(ClassDecl {
            name: "Player".into(),
            superclass: None,
            fields: vec![],
            range,
        });
        decls
            .methods
            .push(MemberDecl::method("update", "Player", None, range));
        decls
            .methods
            .push(MemberDecl::method("draw", "Sprite", None, range));

        let contributed = decls.contributed_classes();
        assert_eq!(contributed.len(), 2);
        assert!(contributed.contains(&"Player".into()));
        assert!(contributed.contains(&"Sprite".into()));
    }
}
