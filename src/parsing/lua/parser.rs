//! Tree-sitter based Lua parser.
//!
//! Lowers the CST into [`FileDecls`]: class and alias declarations from
//! annotation comments, owner-qualified method definitions, and a flat
//! expression arena for everything inference needs. The CST is dropped as
//! soon as the file is lowered.

use tree_sitter::{Node, Parser};

use crate::error::{IntelError, IntelResult};
use crate::parsing::decl::{ClassDecl, ExprShape, FileDecls, MemberDecl};
use crate::parsing::lua::annotation::{Annotation, parse_annotation};
use crate::types::{CompactString, NodeId, Range, TypeRef};

pub struct LuaSourceParser {
    parser: Parser,
}

impl LuaSourceParser {
    pub fn new() -> IntelResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_lua::LANGUAGE.into())
            .map_err(|e| IntelError::Grammar {
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    /// Parse a file's source and extract its declarations. Syntax errors do
    /// not fail the parse; tree-sitter recovers and we lower what it could
    /// make sense of.
    pub fn parse(&mut self, code: &str) -> IntelResult<FileDecls> {
        let tree = self
            .parser
            .parse(code, None)
            .ok_or_else(|| IntelError::Grammar {
                reason: "parser returned no tree".to_string(),
            })?;

        let mut decls = FileDecls::default();
        let root = tree.root_node();
        let mut pending: Vec<Annotation> = Vec::new();

        for child in root.children(&mut root.walk()) {
            if child.kind() == "comment" {
                let text = &code[child.byte_range()];
                match parse_annotation(text) {
                    Some(ann) => pending.push(ann),
                    // A plain comment ends the annotation block; the block's
                    // class and alias declarations still count.
                    None => {
                        let batch = std::mem::take(&mut pending);
                        self.apply_declarations(&batch, None, &mut decls);
                    }
                }
                continue;
            }
            let batch = std::mem::take(&mut pending);
            self.process_statement(child, code, batch, &mut decls);
        }

        // A trailing annotation block with no statement after it still
        // declares classes and aliases.
        if !pending.is_empty() {
            self.apply_declarations(&pending, None, &mut decls);
        }

        Ok(decls)
    }

    fn process_statement(
        &self,
        node: Node,
        code: &str,
        batch: Vec<Annotation>,
        decls: &mut FileDecls,
    ) {
        let class_name = self.apply_declarations(&batch, Some(&node), decls);

        match node.kind() {
            "function_declaration" => {
                self.process_function_declaration(node, code, &batch, decls);
            }
            "variable_declaration" => {
                self.process_local(node, code, &batch, class_name, decls);
            }
            "assignment_statement" => {
                self.process_global_assignment(node, code, &batch, class_name, decls);
            }
            _ => {}
        }
    }

    /// Record the batch's `@class` and `@alias` declarations. Returns the
    /// declared class name, if any, so the annotated statement can bind a
    /// variable to it.
    fn apply_declarations(
        &self,
        batch: &[Annotation],
        node: Option<&Node>,
        decls: &mut FileDecls,
    ) -> Option<CompactString> {
        let mut class_name = None;
        for ann in batch {
            match ann {
                Annotation::Class { name, superclass } => {
                    let fields = batch
                        .iter()
                        .filter_map(|a| match a {
                            Annotation::Field { name: fname, ty } => Some(MemberDecl::field(
                                fname,
                                name,
                                Some(ty.clone()),
                                node.map_or_else(Range::default, range_of),
                            )),
                            _ => None,
                        })
                        .collect();
                    decls.classes.push(ClassDecl {
                        name: name.clone(),
                        superclass: superclass.clone(),
                        fields,
                        range: node.map_or_else(Range::default, range_of),
                    });
                    class_name = Some(name.clone());
                }
                Annotation::Alias { name, target } => {
                    decls.aliases.push(crate::parsing::decl::AliasDecl {
                        name: name.clone(),
                        target: target.clone(),
                    });
                }
                _ => {}
            }
        }
        class_name
    }

    fn process_function_declaration(
        &self,
        node: Node,
        code: &str,
        batch: &[Annotation],
        decls: &mut FileDecls,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let returns = annotated_returns(batch);

        match name_node.kind() {
            // function Owner:method() / function Owner.helper()
            "method_index_expression" | "dot_index_expression" => {
                let member_field = if name_node.kind() == "method_index_expression" {
                    "method"
                } else {
                    "field"
                };
                let (Some(table), Some(member)) = (
                    name_node.child_by_field_name("table"),
                    name_node.child_by_field_name(member_field),
                ) else {
                    return;
                };
                if table.kind() != "identifier" {
                    return;
                }
                let owner = &code[table.byte_range()];
                let member_name = &code[member.byte_range()];
                let ty = returns.map(|returns| TypeRef::Fun { returns });
                decls
                    .methods
                    .push(MemberDecl::method(member_name, owner, ty, range_of(&node)));
            }
            // function foo() at file scope, or local function foo()
            "identifier" => {
                let name: CompactString = code[name_node.byte_range()].into();
                let params = param_names(&node, code);
                let id = decls.push_expr(
                    ExprShape::FunctionDef {
                        params,
                        returns: returns.unwrap_or_default(),
                    },
                    range_of(&node),
                );
                if is_local_declaration(&node) {
                    decls.locals.insert(name, id);
                } else {
                    decls.globals.push((name, id));
                }
            }
            _ => {}
        }
    }

    /// `local a, b = x, y` with optional annotations applying to the first
    /// declared name.
    fn process_local(
        &self,
        node: Node,
        code: &str,
        batch: &[Annotation],
        class_name: Option<CompactString>,
        decls: &mut FileDecls,
    ) {
        let Some(assign) = child_of_kind(&node, "assignment_statement") else {
            // `local x` without an initializer.
            if let Some(list) = child_of_kind(&node, "variable_list") {
                for (i, var) in identifiers_in(&list, code).into_iter().enumerate() {
                    let shape = self.pinned_shape(i, batch, &class_name);
                    let id = decls.push_expr(
                        shape.unwrap_or(ExprShape::NilLit),
                        range_of(&node),
                    );
                    decls.locals.insert(var, id);
                }
            }
            return;
        };
        for (name, id) in self.lower_assignment(assign, code, batch, &class_name, decls) {
            decls.locals.insert(name, id);
        }
    }

    fn process_global_assignment(
        &self,
        node: Node,
        code: &str,
        batch: &[Annotation],
        class_name: Option<CompactString>,
        decls: &mut FileDecls,
    ) {
        for (name, id) in self.lower_assignment(node, code, batch, &class_name, decls) {
            decls.globals.push((name, id));
        }
    }

    /// Lower one `variable_list = expression_list` pair. Names without a
    /// lowerable initializer are skipped; the resolver then reports them
    /// unknown rather than guessing.
    fn lower_assignment(
        &self,
        assign: Node,
        code: &str,
        batch: &[Annotation],
        class_name: &Option<CompactString>,
        decls: &mut FileDecls,
    ) -> Vec<(CompactString, NodeId)> {
        let Some(var_list) = child_of_kind(&assign, "variable_list") else {
            return Vec::new();
        };
        let values: Vec<Node> = child_of_kind(&assign, "expression_list")
            .map(|list| list.named_children(&mut list.walk()).collect())
            .unwrap_or_default();

        let mut bound = Vec::new();
        let mut value_index = 0usize;
        for var in var_list.named_children(&mut var_list.walk()) {
            // Index targets (`t.x = ...`) are not tracked as file bindings.
            if var.kind() != "identifier" {
                value_index += 1;
                continue;
            }
            let name: CompactString = code[var.byte_range()].into();
            let pinned = self.pinned_shape(value_index, batch, class_name);
            let id = match pinned {
                Some(shape) => Some(decls.push_expr(shape, range_of(&var))),
                None => values
                    .get(value_index)
                    .and_then(|value| lower_expr(*value, code, decls)),
            };
            if let Some(id) = id {
                bound.push((name, id));
            }
            value_index += 1;
        }
        bound
    }

    /// Annotation that pins the type of the `index`-th declared name:
    /// a `---@class` binds the first name to the class, a `---@type` pins
    /// the first name to the written type.
    fn pinned_shape(
        &self,
        index: usize,
        batch: &[Annotation],
        class_name: &Option<CompactString>,
    ) -> Option<ExprShape> {
        if index != 0 {
            return None;
        }
        if let Some(class) = class_name {
            return Some(ExprShape::Annotated(TypeRef::Name(class.clone())));
        }
        batch.iter().rev().find_map(|ann| match ann {
            Annotation::Type(ty) => Some(ExprShape::Annotated(ty.clone())),
            _ => None,
        })
    }
}

/// Lower one expression node into the arena. Returns `None` for shapes we
/// do not model (binary operators, varargs, ...), leaving the binding
/// untracked.
fn lower_expr(node: Node, code: &str, decls: &mut FileDecls) -> Option<NodeId> {
    let range = range_of(&node);
    let shape = match node.kind() {
        "nil" => ExprShape::NilLit,
        "true" | "false" => ExprShape::BoolLit,
        "number" => ExprShape::NumberLit,
        "string" => ExprShape::StringLit,
        "table_constructor" => ExprShape::TableCtor,
        "function_definition" => ExprShape::FunctionDef {
            params: param_names(&node, code),
            returns: Vec::new(),
        },
        "identifier" => ExprShape::NameRef(code[node.byte_range()].into()),
        "parenthesized_expression" => {
            let inner = node.named_children(&mut node.walk()).next()?;
            return lower_expr(inner, code, decls);
        }
        "function_call" => {
            if let Some(meta) = setmetatable_target(&node, code) {
                ExprShape::Setmeta { meta }
            } else {
                let callee_node = node.child_by_field_name("name")?;
                let callee = lower_expr(callee_node, code, decls)?;
                ExprShape::Call { callee }
            }
        }
        "dot_index_expression" => {
            let base_node = node.child_by_field_name("table")?;
            let member = node.child_by_field_name("field")?;
            let base = lower_expr(base_node, code, decls)?;
            ExprShape::Index {
                base,
                member: code[member.byte_range()].into(),
            }
        }
        "method_index_expression" => {
            let base_node = node.child_by_field_name("table")?;
            let member = node.child_by_field_name("method")?;
            let base = lower_expr(base_node, code, decls)?;
            ExprShape::Index {
                base,
                member: code[member.byte_range()].into(),
            }
        }
        _ => return None,
    };
    Some(decls.push_expr(shape, range))
}

/// `setmetatable(t, Meta)` with an identifier metatable argument.
fn setmetatable_target(call: &Node, code: &str) -> Option<CompactString> {
    let name = call.child_by_field_name("name")?;
    if name.kind() != "identifier" || &code[name.byte_range()] != "setmetatable" {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let second = args.named_children(&mut args.walk()).nth(1)?;
    if second.kind() != "identifier" {
        return None;
    }
    Some(code[second.byte_range()].into())
}

fn annotated_returns(batch: &[Annotation]) -> Option<Vec<TypeRef>> {
    batch.iter().rev().find_map(|ann| match ann {
        Annotation::Return(returns) => Some(returns.clone()),
        _ => None,
    })
}

fn param_names(func: &Node, code: &str) -> Vec<CompactString> {
    let Some(params) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    params
        .named_children(&mut params.walk())
        .filter(|p| p.kind() == "identifier")
        .map(|p| code[p.byte_range()].into())
        .collect()
}

fn is_local_declaration(node: &Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == "local")
}

fn child_of_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn identifiers_in(list: &Node, code: &str) -> Vec<CompactString> {
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|c| c.kind() == "identifier")
        .map(|c| code[c.byte_range()].into())
        .collect()
}

fn range_of(node: &Node) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::new(
        start.row as u32,
        start.column as u16,
        end.row as u32,
        end.column as u16,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::decl::MemberKind;

    fn parse(code: &str) -> FileDecls {
        LuaSourceParser::new().unwrap().parse(code).unwrap()
    }

    #[test]
    fn test_class_annotation_binds_local() {
        let decls = parse(
            r#"
---@class Player : Entity
---@field hp number
---@field name string
local Player = {}
"#,
        );
        assert_eq!(decls.classes.len(), 1);
        let class = &decls.classes[0];
        assert_eq!(class.name, "Player".into());
        assert_eq!(class.superclass, Some("Entity".into()));
        assert_eq!(class.fields.len(), 2);

        let id = decls.locals[&CompactString::from("Player")];
        assert_eq!(
            decls.expr(id).unwrap().shape,
            ExprShape::Annotated(TypeRef::Name("Player".into()))
        );
    }

    #[test]
    fn test_method_definitions_attach_to_owner() {
        let decls = parse(
            r#"
---@return number
function Player:damage(amount)
    return amount
end

function Player.helper()
end
"#,
        );
        assert_eq!(decls.methods.len(), 2);
        assert_eq!(decls.methods[0].name, "damage".into());
        assert_eq!(decls.methods[0].owner, "Player".into());
        assert_eq!(decls.methods[0].kind, MemberKind::Method);
        assert_eq!(
            decls.methods[0].ty,
            Some(TypeRef::Fun {
                returns: vec![TypeRef::Number]
            })
        );
        assert_eq!(decls.methods[1].name, "helper".into());
        assert!(decls.methods[1].ty.is_none());
    }

    #[test]
    fn test_local_literals_lowered() {
        let decls = parse(
            r#"
local n = 42
local s = "hi"
local b = true
local t = {}
local nothing = nil
"#,
        );
        let shape = |name: &str| {
            let id = decls.locals[&CompactString::from(name)];
            decls.expr(id).unwrap().shape.clone()
        };
        assert_eq!(shape("n"), ExprShape::NumberLit);
        assert_eq!(shape("s"), ExprShape::StringLit);
        assert_eq!(shape("b"), ExprShape::BoolLit);
        assert_eq!(shape("t"), ExprShape::TableCtor);
        assert_eq!(shape("nothing"), ExprShape::NilLit);
    }

    #[test]
    fn test_setmetatable_recognized() {
        let decls = parse("local obj = setmetatable({}, Player)\n");
        let id = decls.locals[&CompactString::from("obj")];
        assert_eq!(
            decls.expr(id).unwrap().shape,
            ExprShape::Setmeta {
                meta: "Player".into()
            }
        );
    }

    #[test]
    fn test_call_and_index_shapes() {
        let decls = parse(
            r#"
local p = Player.new()
local hp = p.hp
"#,
        );
        let p = decls.locals[&CompactString::from("p")];
        let ExprShape::Call { callee } = decls.expr(p).unwrap().shape.clone() else {
            panic!("expected call shape");
        };
        let ExprShape::Index { base, member } = decls.expr(callee).unwrap().shape.clone() else {
            panic!("expected index callee");
        };
        assert_eq!(member, CompactString::from("new"));
        assert_eq!(
            decls.expr(base).unwrap().shape,
            ExprShape::NameRef("Player".into())
        );

        let hp = decls.locals[&CompactString::from("hp")];
        let ExprShape::Index { member, .. } = decls.expr(hp).unwrap().shape.clone() else {
            panic!("expected index shape");
        };
        assert_eq!(member, CompactString::from("hp"));
    }

    #[test]
    fn test_type_annotation_pins_local() {
        let decls = parse(
            r#"
---@type Player
local current = get_current()
"#,
        );
        let id = decls.locals[&CompactString::from("current")];
        assert_eq!(
            decls.expr(id).unwrap().shape,
            ExprShape::Annotated(TypeRef::Name("Player".into()))
        );
    }

    #[test]
    fn test_alias_collected_without_statement() {
        let decls = parse("---@alias Id number\n");
        assert_eq!(decls.aliases.len(), 1);
        assert_eq!(decls.aliases[0].name, "Id".into());
        assert_eq!(decls.aliases[0].target, TypeRef::Number);
    }

    #[test]
    fn test_global_assignment_and_function() {
        let decls = parse(
            r#"
score = 0
function reset()
end
"#,
        );
        assert!(
            decls
                .globals
                .iter()
                .any(|(name, _)| *name == CompactString::from("score"))
        );
        let (_, id) = decls
            .globals
            .iter()
            .find(|(name, _)| *name == CompactString::from("reset"))
            .expect("global function recorded");
        assert!(matches!(
            decls.expr(*id).unwrap().shape,
            ExprShape::FunctionDef { .. }
        ));
    }

    #[test]
    fn test_local_function_is_local() {
        let decls = parse("local function helper(a, b)\nend\n");
        let id = decls.locals[&CompactString::from("helper")];
        let ExprShape::FunctionDef { params, .. } = decls.expr(id).unwrap().shape.clone() else {
            panic!("expected function shape");
        };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_plain_comment_breaks_annotation_block() {
        let decls = parse(
            r#"
---@class Ghost
-- just a note
local x = 1
"#,
        );
        // The class is still declared when its block ends.
        assert_eq!(decls.classes.len(), 1);
        let id = decls.locals[&CompactString::from("x")];
        assert_eq!(decls.expr(id).unwrap().shape, ExprShape::NumberLit);
    }
}
