//! The workspace service: owns the document model, stub index, and caches,
//! and drives (re-)indexing of Lua sources through them.
//!
//! All intelligence queries go through a [`Workspace`] plus an explicit
//! [`SearchContext`]; nothing here is process-global.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::cache::{ClassHierarchyCache, ClassHierarchyInfo, TypeCache};
use crate::config::Settings;
use crate::error::{IntelError, IntelResult};
use crate::index::{DocumentModel, StubIndex};
use crate::indexing::walker::FileWalker;
use crate::infer::{InferenceEngine, SearchContext};
use crate::parsing::lua::LuaSourceParser;
use crate::types::{CancelToken, CompactString, LuaType, NodeRef};

/// Outcome of an [`Workspace::index_directory`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Workspace {
    settings: Arc<Settings>,
    model: DocumentModel,
    stubs: StubIndex,
    types: TypeCache,
    hierarchy: ClassHierarchyCache,
    parser: Mutex<LuaSourceParser>,
}

impl Workspace {
    pub fn new(settings: Arc<Settings>) -> IntelResult<Self> {
        let types = TypeCache::new(&settings.cache);
        let hierarchy = ClassHierarchyCache::new(settings.cache.hierarchy_capacity);
        Ok(Self {
            settings,
            model: DocumentModel::new(),
            stubs: StubIndex::new(),
            types,
            hierarchy,
            parser: Mutex::new(LuaSourceParser::new()?),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn stubs(&self) -> &StubIndex {
        &self.stubs
    }

    pub fn hierarchy(&self) -> &ClassHierarchyCache {
        &self.hierarchy
    }

    /// A fresh search context configured from this workspace's settings.
    pub fn search_context(&self, cancel: CancelToken) -> SearchContext {
        let mut ctx = SearchContext::new(&self.settings.cache, cancel);
        if !self.stubs.is_ready() {
            ctx = ctx.dumb();
        }
        ctx
    }

    /// Index every Lua file under `root`. Files that fail to parse are
    /// logged and counted, not fatal; cancellation aborts the run.
    pub fn index_directory(&self, root: &Path, cancel: &CancelToken) -> IntelResult<IndexStats> {
        let walker = FileWalker::new(Arc::clone(&self.settings));
        let mut stats = IndexStats::default();

        for path in walker.walk(root) {
            cancel.check()?;
            match self.index_file(&path) {
                Ok(true) => stats.indexed += 1,
                Ok(false) => stats.skipped += 1,
                Err(IntelError::Cancelled) => return Err(IntelError::Cancelled),
                Err(e) => {
                    tracing::warn!(target: "index", "failed to index {}: {e}", path.display());
                    stats.failed += 1;
                }
            }
        }

        self.stubs.set_ready(true);
        tracing::info!(
            target: "index",
            "indexed {} files ({} unchanged, {} failed) under {}",
            stats.indexed,
            stats.skipped,
            stats.failed,
            root.display()
        );
        Ok(stats)
    }

    /// Index one file from disk. Returns `false` when the content hash is
    /// unchanged and the file was skipped.
    pub fn index_file(&self, path: &Path) -> IntelResult<bool> {
        let content = std::fs::read_to_string(path).map_err(|e| IntelError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.index_source(path, &content)
    }

    /// Index one file from in-memory content, as the host does on document
    /// edits. Bumps the file's generation, replaces its stub contributions,
    /// and cascades hierarchy invalidation over every class the old or new
    /// parse contributes to.
    pub fn index_source(&self, path: &Path, content: &str) -> IntelResult<bool> {
        let hash = content_hash(content);
        if self.model.content_hash(path).as_deref() == Some(hash.as_str()) {
            return Ok(false);
        }

        let decls = self.parser.lock().parse(content)?;
        let (file, generation, previous) = self.model.update(path, hash, decls);
        let current = self
            .model
            .decls(file)
            .ok_or(IntelError::UnknownFile { file })?;

        self.stubs.apply_file(file, generation, &current);

        let mut touched: Vec<CompactString> = current.contributed_classes();
        if let Some(previous) = previous {
            for name in previous.contributed_classes() {
                if !touched.contains(&name) {
                    touched.push(name);
                }
            }
        }
        for class in &touched {
            self.hierarchy.invalidate(class);
        }

        // Inferred types can depend on declarations from any file, so a
        // re-parse anywhere invalidates the shared tier wholesale. The
        // hierarchy cache is finer-grained and only dropped per class above.
        self.types.clear();

        Ok(true)
    }

    /// Infer the type of an expression node.
    pub fn infer(&self, ctx: &mut SearchContext, node: NodeRef) -> IntelResult<LuaType> {
        self.engine().infer(ctx, node)
    }

    /// Infer the type of a file-level global by name.
    pub fn infer_global(&self, ctx: &mut SearchContext, name: &str) -> IntelResult<LuaType> {
        match self.stubs.global(name) {
            Ok(Some(node)) => self.infer(ctx, node),
            Ok(None) => Ok(LuaType::Unknown),
            Err(e) if e.is_transient() => Ok(LuaType::Unknown),
            Err(e) => Err(e),
        }
    }

    /// Flattened hierarchy for a class, or `None` when it is unknown.
    pub fn members_of(
        &self,
        ctx: &SearchContext,
        class: &str,
    ) -> IntelResult<Option<Arc<ClassHierarchyInfo>>> {
        self.engine().members_of(ctx, class)
    }

    pub fn class_names(&self) -> IntelResult<Vec<CompactString>> {
        self.stubs.class_names()
    }

    pub fn file_count(&self) -> usize {
        self.model.file_count()
    }

    fn engine(&self) -> InferenceEngine<'_> {
        InferenceEngine::new(&self.model, &self.stubs, &self.types, &self.hierarchy)
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(Settings::default())).unwrap()
    }

    fn ctx(ws: &Workspace) -> SearchContext {
        ws.search_context(CancelToken::new())
    }

    #[test]
    fn test_index_source_skips_unchanged_content() {
        let ws = workspace();
        let path = Path::new("game/player.lua");
        assert!(ws.index_source(path, "local x = 1").unwrap());
        assert!(!ws.index_source(path, "local x = 1").unwrap());
        assert!(ws.index_source(path, "local x = 2").unwrap());
        assert_eq!(ws.file_count(), 1);
    }

    #[test]
    fn test_index_directory_populates_and_marks_ready() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("player.lua"),
            "---@class Player\nlocal Player = {}\nfunction Player:jump() end\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();

        let ws = workspace();
        let stats = ws
            .index_directory(dir.path(), &CancelToken::new())
            .unwrap();
        assert_eq!(stats.indexed, 1);
        assert!(ws.stubs().is_ready());
        assert_eq!(ws.class_names().unwrap(), vec!["Player".into()]);
    }

    #[test]
    fn test_reindex_invalidates_hierarchy() {
        let ws = workspace();
        let path = Path::new("entity.lua");
        ws.index_source(path, "---@class Entity\n---@field hp number\nlocal Entity = {}\n")
            .unwrap();
        ws.stubs().set_ready(true);

        let ctx = ctx(&ws);
        let info = ws.members_of(&ctx, "Entity").unwrap().unwrap();
        assert!(info.member("hp").is_some());
        assert_eq!(ws.hierarchy().len(), 1);

        ws.index_source(path, "---@class Entity\n---@field mp number\nlocal Entity = {}\n")
            .unwrap();
        assert_eq!(ws.hierarchy().len(), 0);

        let info = ws.members_of(&ctx, "Entity").unwrap().unwrap();
        assert!(info.member("hp").is_none());
        assert!(info.member("mp").is_some());
    }

    #[test]
    fn test_infer_global_through_workspace() {
        let ws = workspace();
        ws.index_source(Path::new("init.lua"), "score = 42\n").unwrap();
        ws.stubs().set_ready(true);

        let mut ctx = ctx(&ws);
        assert_eq!(ws.infer_global(&mut ctx, "score").unwrap(), LuaType::Number);
        assert_eq!(
            ws.infer_global(&mut ctx, "missing").unwrap(),
            LuaType::Unknown
        );
    }

    #[test]
    fn test_queries_before_ready_degrade() {
        let ws = workspace();
        ws.index_source(Path::new("init.lua"), "score = 42\n").unwrap();

        // Not ready: context comes up dumb, lookups report nothing found.
        let mut ctx = ctx(&ws);
        assert!(ctx.is_dumb());
        assert_eq!(ws.infer_global(&mut ctx, "score").unwrap(), LuaType::Unknown);
        assert!(ws.members_of(&ctx, "Player").unwrap().is_none());
    }

    #[test]
    fn test_cancelled_directory_walk_propagates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.lua"), "local a = 1").unwrap();

        let ws = workspace();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            ws.index_directory(dir.path(), &cancel),
            Err(IntelError::Cancelled)
        ));
    }
}
