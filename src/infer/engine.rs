//! The inference entry point.
//!
//! `InferenceEngine::infer` is the single path every caller goes through:
//! tiered cache lookup, then recursion-guarded evaluation of the recorded
//! expression shape, then write-back of successful results through both
//! cache tiers. Stale node references and not-ready stub lookups degrade to
//! `Unknown`; only cancellation surfaces as an error.

use crate::cache::{ClassHierarchyCache, ClassHierarchyInfo, TypeCache};
use crate::error::{IntelError, IntelResult};
use crate::index::{DocumentModel, IndexView, StubIndex};
use crate::infer::context::SearchContext;
use crate::infer::guard::GuardKey;
use crate::parsing::decl::{ExprShape, MemberKind};
use crate::types::{FunctionType, LuaType, NodeRef, TypeKey, TypeRef};
use std::sync::Arc;

pub struct InferenceEngine<'a> {
    model: &'a DocumentModel,
    stubs: &'a StubIndex,
    types: &'a TypeCache,
    hierarchy: &'a ClassHierarchyCache,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(
        model: &'a DocumentModel,
        stubs: &'a StubIndex,
        types: &'a TypeCache,
        hierarchy: &'a ClassHierarchyCache,
    ) -> Self {
        Self {
            model,
            stubs,
            types,
            hierarchy,
        }
    }

    /// Infer the type of a node. Always cache-first; the successful result
    /// (never the `Unknown` sentinel) is written back through both tiers.
    pub fn infer(&self, ctx: &mut SearchContext, node: NodeRef) -> IntelResult<LuaType> {
        ctx.check_cancelled()?;

        let key = TypeKey::new(
            node.file,
            node.node,
            ctx.ret_index().unwrap_or(0).min(u8::MAX as usize) as u8,
        );
        if let Some(ty) = self.types.get(ctx.local_types_mut(), self.model, &key) {
            return Ok(ty);
        }

        // re-entry on the node currently being inferred answers Unknown
        // instead of recursing
        let Some(_token) = ctx.guard().enter(GuardKey::Node(key)) else {
            return Ok(LuaType::Unknown);
        };

        let ty = self.evaluate(ctx, node)?;
        self.types.put(ctx.local_types_mut(), self.model, key, &ty);
        Ok(ty)
    }

    /// Flattened hierarchy for a class name, for member resolution and
    /// completion surfaces.
    pub fn members_of(
        &self,
        ctx: &SearchContext,
        class: &str,
    ) -> IntelResult<Option<Arc<ClassHierarchyInfo>>> {
        if ctx.is_dumb() {
            return Ok(None);
        }
        let view = IndexView::new(self.stubs, self.model);
        self.hierarchy.get(class, &view, ctx.cancel())
    }

    fn evaluate(&self, ctx: &mut SearchContext, node: NodeRef) -> IntelResult<LuaType> {
        // a ref whose generation no longer matches is a plain miss
        let Some(expr) = self.model.expr(node) else {
            return Ok(LuaType::Unknown);
        };

        match expr.shape {
            ExprShape::NilLit => Ok(LuaType::Nil),
            ExprShape::BoolLit => Ok(LuaType::Boolean),
            ExprShape::NumberLit => Ok(LuaType::Number),
            ExprShape::StringLit => Ok(LuaType::String),
            ExprShape::TableCtor => Ok(LuaType::Table),
            ExprShape::Annotated(ref annotated) => self.resolve_type_ref(ctx, annotated),
            ExprShape::FunctionDef {
                ref params,
                ref returns,
            } => {
                let mut resolved = Vec::with_capacity(returns.len());
                for ret in returns {
                    resolved.push(self.resolve_type_ref(ctx, ret)?);
                }
                Ok(LuaType::Function(FunctionType {
                    params: params.clone(),
                    returns: resolved,
                }))
            }
            ExprShape::NameRef(ref name) => self.resolve_name(ctx, node, name),
            ExprShape::Call { callee } => {
                let callee_ref = NodeRef {
                    file: node.file,
                    node: callee,
                    generation: node.generation,
                };
                // the multi-return index applies to this call's result, not
                // to the callee expression itself
                let ret_index = ctx.take_ret_index();
                let callee_ty = self.infer(ctx, callee_ref);
                ctx.set_ret_index(ret_index);
                Ok(callee_ty?.return_at(ret_index.unwrap_or(0)))
            }
            ExprShape::Index { base, ref member } => {
                let base_ref = NodeRef {
                    file: node.file,
                    node: base,
                    generation: node.generation,
                };
                let ret_index = ctx.take_ret_index();
                let base_ty = self.infer(ctx, base_ref);
                ctx.set_ret_index(ret_index);
                match base_ty? {
                    LuaType::Class(class) => self.member_type(ctx, &class, member),
                    _ => Ok(LuaType::Unknown),
                }
            }
            ExprShape::Setmeta { ref meta } => {
                if self.is_known_class(ctx, meta)? {
                    Ok(LuaType::Class(meta.clone()))
                } else {
                    Ok(LuaType::Unknown)
                }
            }
        }
    }

    /// Resolve a name: local declaration first, then indexed globals, then
    /// class names.
    fn resolve_name(
        &self,
        ctx: &mut SearchContext,
        from: NodeRef,
        name: &str,
    ) -> IntelResult<LuaType> {
        if let Some(decls) = self.model.decls_for(from) {
            if let Some(&init) = decls.locals.get(name) {
                let init_ref = NodeRef {
                    file: from.file,
                    node: init,
                    generation: from.generation,
                };
                return self.infer(ctx, init_ref);
            }
        }

        if ctx.is_dumb() {
            return Ok(LuaType::Unknown);
        }

        match self.stubs.global(name) {
            Ok(Some(global)) => {
                if !ctx.scope().contains(global.file) {
                    return Ok(LuaType::Unknown);
                }
                // a stale global ref resolves to Unknown inside infer
                let ret_index = ctx.take_ret_index();
                let ty = self.infer(ctx, global);
                ctx.set_ret_index(ret_index);
                let ty = ty?;
                if !ty.is_unknown() {
                    return Ok(ty);
                }
            }
            Ok(None) => {}
            Err(IntelError::IndexNotReady) => return Ok(LuaType::Unknown),
            Err(e) => return Err(e),
        }

        if self.is_known_class(ctx, name)? {
            return Ok(LuaType::class(name));
        }
        Ok(LuaType::Unknown)
    }

    /// Member lookup through the flattened hierarchy. Methods without an
    /// annotated signature still surface as functions.
    fn member_type(
        &self,
        ctx: &mut SearchContext,
        class: &str,
        member: &str,
    ) -> IntelResult<LuaType> {
        let Some(info) = self.members_of(ctx, class)? else {
            return Ok(LuaType::Unknown);
        };
        let Some(decl) = info.member(member) else {
            return Ok(LuaType::Unknown);
        };
        match (&decl.ty, decl.kind) {
            (Some(annotated), _) => self.resolve_type_ref(ctx, annotated),
            (None, MemberKind::Method) => Ok(LuaType::Function(FunctionType::default())),
            (None, MemberKind::Field) => Ok(LuaType::Unknown),
        }
    }

    /// Resolve an annotation-level type reference. Alias chains are guarded
    /// so that `alias of alias` cycles answer Unknown instead of looping.
    pub fn resolve_type_ref(
        &self,
        ctx: &mut SearchContext,
        type_ref: &TypeRef,
    ) -> IntelResult<LuaType> {
        match type_ref {
            TypeRef::Nil => Ok(LuaType::Nil),
            TypeRef::Boolean => Ok(LuaType::Boolean),
            TypeRef::Number => Ok(LuaType::Number),
            TypeRef::String => Ok(LuaType::String),
            TypeRef::Table => Ok(LuaType::Table),
            TypeRef::Any => Ok(LuaType::Any),
            TypeRef::Fun { returns } => {
                let mut resolved = Vec::with_capacity(returns.len());
                for ret in returns {
                    resolved.push(self.resolve_type_ref(ctx, ret)?);
                }
                Ok(LuaType::Function(FunctionType {
                    params: Vec::new(),
                    returns: resolved,
                }))
            }
            TypeRef::Union(parts) => {
                let mut resolved = Vec::with_capacity(parts.len());
                for part in parts {
                    let ty = self.resolve_type_ref(ctx, part)?;
                    if !ty.is_unknown() && !resolved.contains(&ty) {
                        resolved.push(ty);
                    }
                }
                match resolved.len() {
                    0 => Ok(LuaType::Unknown),
                    1 => Ok(resolved.pop().expect("len checked")),
                    _ => Ok(LuaType::Union(resolved)),
                }
            }
            TypeRef::Name(name) => {
                let Some(_token) = ctx.guard().enter(GuardKey::Alias(name.clone())) else {
                    return Ok(LuaType::Unknown);
                };

                if !ctx.is_dumb() {
                    match self.stubs.alias(name) {
                        Ok(Some(target)) => return self.resolve_type_ref(ctx, &target),
                        Ok(None) => {}
                        Err(IntelError::IndexNotReady) => return Ok(LuaType::Unknown),
                        Err(e) => return Err(e),
                    }
                }

                if self.is_known_class(ctx, name)? {
                    Ok(LuaType::Class(name.clone()))
                } else {
                    Ok(LuaType::Unknown)
                }
            }
        }
    }

    fn is_known_class(&self, ctx: &SearchContext, name: &str) -> IntelResult<bool> {
        if ctx.is_dumb() {
            return Ok(false);
        }
        match self.stubs.is_class(name) {
            Ok(known) => Ok(known),
            Err(IntelError::IndexNotReady) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
