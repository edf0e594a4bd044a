//! File system walker for discovering Lua sources to index.
//!
//! Traversal respects .gitignore rules plus the ignore patterns from the
//! configuration, and skips hidden files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::Settings;

pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walk a directory and yield the Lua files to index.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false);

        // Configured ignore patterns become exclusion overrides.
        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &self.settings.indexing.ignore_patterns {
            if let Err(e) = override_builder.add(&format!("!{pattern}")) {
                tracing::warn!(target: "index", "invalid ignore pattern '{pattern}': {e}");
            }
        }
        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                if name.starts_with('.') {
                    return None;
                }
                if path.extension().and_then(|e| e.to_str()) == Some("lua") {
                    Some(path.to_path_buf())
                } else {
                    None
                }
            })
    }

    /// Count files that would be indexed (useful for dry runs).
    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).count()
    }
}
