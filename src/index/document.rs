//! Document model: the owning arena for parsed files.
//!
//! Each file entry carries a generation stamp, bumped on every re-index.
//! `NodeRef`s minted during a parse embed that generation; resolving a ref
//! against a newer generation fails, which is how stale references are
//! detected without any GC involvement. Readers take the lock briefly and
//! clone out `Arc<FileDecls>` snapshots, so inference never holds the lock
//! across work.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::parsing::decl::{ExprNode, FileDecls};
use crate::types::{FileId, NodeRef};

#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    /// Hex digest of the indexed content, used to skip unchanged files.
    content_hash: String,
    generation: u64,
    decls: Arc<FileDecls>,
}

/// Arena of parsed files with per-file generation stamps.
#[derive(Debug, Default)]
pub struct DocumentModel {
    files: RwLock<HashMap<FileId, FileEntry>>,
    path_ids: RwLock<HashMap<PathBuf, FileId>>,
    next_file_id: AtomicU32,
    next_generation: AtomicU64,
}

impl DocumentModel {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            path_ids: RwLock::new(HashMap::new()),
            next_file_id: AtomicU32::new(1),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Get or allocate the id for `path`.
    pub fn file_id(&self, path: &Path) -> FileId {
        if let Some(id) = self.path_ids.read().get(path) {
            return *id;
        }
        let mut ids = self.path_ids.write();
        *ids.entry(path.to_path_buf()).or_insert_with(|| {
            let raw = self.next_file_id.fetch_add(1, Ordering::Relaxed);
            FileId::new(raw).expect("file id counter starts at 1")
        })
    }

    /// Install a fresh parse of `path`, bumping the file's generation.
    ///
    /// Returns the file id, the new generation, and the declarations of the
    /// previous parse (if any) so the caller can invalidate dependent caches.
    pub fn update(
        &self,
        path: &Path,
        content_hash: String,
        decls: FileDecls,
    ) -> (FileId, u64, Option<Arc<FileDecls>>) {
        let file = self.file_id(path);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let previous = self.files.write().insert(
            file,
            FileEntry {
                path: path.to_path_buf(),
                content_hash,
                generation,
                decls: Arc::new(decls),
            },
        );

        tracing::debug!(
            target: "index",
            "installed {} as {:?} generation {generation}",
            path.display(),
            file
        );

        (file, generation, previous.map(|entry| entry.decls))
    }

    /// Current generation of a file, `None` when unknown.
    pub fn generation(&self, file: FileId) -> Option<u64> {
        self.files.read().get(&file).map(|entry| entry.generation)
    }

    /// Hash of the content currently indexed for `path`.
    pub fn content_hash(&self, path: &Path) -> Option<String> {
        let id = *self.path_ids.read().get(path)?;
        self.files
            .read()
            .get(&id)
            .map(|entry| entry.content_hash.clone())
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.files.read().get(&file).map(|entry| entry.path.clone())
    }

    /// Snapshot of the current declarations of a file.
    pub fn decls(&self, file: FileId) -> Option<Arc<FileDecls>> {
        self.files.read().get(&file).map(|entry| entry.decls.clone())
    }

    /// Declarations of the parse a `NodeRef` was minted against. Fails on
    /// generation mismatch: the ref outlived its parse.
    pub fn decls_for(&self, node: NodeRef) -> Option<Arc<FileDecls>> {
        let files = self.files.read();
        let entry = files.get(&node.file)?;
        if entry.generation != node.generation {
            return None;
        }
        Some(entry.decls.clone())
    }

    /// Resolve a node reference to its expression, validating the generation.
    pub fn expr(&self, node: NodeRef) -> Option<ExprNode> {
        self.decls_for(node)?.expr(node.node).cloned()
    }

    /// Build a currently-valid reference to a node in `file`.
    pub fn node_ref(&self, file: FileId, node: crate::types::NodeId) -> Option<NodeRef> {
        let generation = self.generation(file)?;
        Some(NodeRef {
            file,
            node,
            generation,
        })
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}
