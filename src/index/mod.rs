//! Document model and stub index: the lookup layer behind the caches.

pub mod document;
pub mod stub;

pub use document::DocumentModel;
pub use stub::StubIndex;

use crate::cache::{ClassDef, ClassDefProvider};
use crate::error::IntelResult;
use crate::types::FileId;

/// Borrowed view combining the stub index with the document model, so the
/// hierarchy cache can resolve classes and validate file stamps through one
/// provider seam.
pub struct IndexView<'a> {
    pub stubs: &'a StubIndex,
    pub model: &'a DocumentModel,
}

impl<'a> IndexView<'a> {
    pub fn new(stubs: &'a StubIndex, model: &'a DocumentModel) -> Self {
        Self { stubs, model }
    }
}

impl ClassDefProvider for IndexView<'_> {
    fn class_defs(&self, name: &str) -> IntelResult<Vec<ClassDef>> {
        self.stubs.class_defs(name)
    }

    fn file_stamp(&self, file: FileId) -> Option<u64> {
        self.model.generation(file)
    }
}
