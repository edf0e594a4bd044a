//! Stub index: name-keyed lookup tables over the indexed files.
//!
//! This is the fallback tier behind the type caches. Lookups made before the
//! initial population has finished return `IndexNotReady` ("dumb mode"),
//! which callers treat as a normal not-found, never as a failure. All tables
//! are concurrent maps; re-indexing a file first purges that file's previous
//! contributions, then applies the new ones.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::ClassDef;
use crate::error::{IntelError, IntelResult};
use crate::parsing::decl::{FileDecls, MemberDecl};
use crate::types::{CompactString, FileId, NodeRef, TypeRef};

/// One file's contribution to a class: its annotation declaration and/or the
/// methods it defines on that class.
#[derive(Debug, Clone)]
struct ClassContribution {
    file: FileId,
    generation: u64,
    superclass: Option<CompactString>,
    fields: Vec<MemberDecl>,
    methods: Vec<MemberDecl>,
}

#[derive(Debug, Default)]
pub struct StubIndex {
    classes: DashMap<CompactString, Vec<ClassContribution>>,
    aliases: DashMap<CompactString, (TypeRef, FileId)>,
    globals: DashMap<CompactString, NodeRef>,
    ready: AtomicBool,
}

impl StubIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave or enter dumb mode. While not ready, all lookups return
    /// `IndexNotReady`.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn check_ready(&self) -> IntelResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(IntelError::IndexNotReady)
        }
    }

    /// Drop everything a file previously contributed. Called before
    /// re-applying a fresh parse of the same file.
    pub fn purge_file(&self, file: FileId) {
        self.classes.retain(|_, contributions| {
            contributions.retain(|c| c.file != file);
            !contributions.is_empty()
        });
        self.aliases.retain(|_, (_, owner)| *owner != file);
        self.globals.retain(|_, node| node.file != file);
    }

    /// Apply one file's declarations at the given generation.
    pub fn apply_file(&self, file: FileId, generation: u64, decls: &FileDecls) {
        self.purge_file(file);

        for class in &decls.classes {
            self.classes.entry(class.name.clone()).or_default().push(
                ClassContribution {
                    file,
                    generation,
                    superclass: class.superclass.clone(),
                    fields: class.fields.clone(),
                    methods: Vec::new(),
                },
            );
        }

        // code-defined methods attach to this file's contribution for their
        // owner, creating a declaration-less contribution when the class is
        // annotated elsewhere
        for method in &decls.methods {
            let mut contributions = self.classes.entry(method.owner.clone()).or_default();
            match contributions.iter_mut().find(|c| c.file == file) {
                Some(contribution) => contribution.methods.push(method.clone()),
                None => contributions.push(ClassContribution {
                    file,
                    generation,
                    superclass: None,
                    fields: Vec::new(),
                    methods: vec![method.clone()],
                }),
            }
        }

        for alias in &decls.aliases {
            self.aliases
                .insert(alias.name.clone(), (alias.target.clone(), file));
        }

        for (name, node) in &decls.globals {
            self.globals.insert(
                name.clone(),
                NodeRef {
                    file,
                    node: *node,
                    generation,
                },
            );
        }
    }

    /// All definition records for a class name. `Ok` with an empty vec is
    /// confirmed absence.
    pub fn class_defs(&self, name: &str) -> IntelResult<Vec<ClassDef>> {
        self.check_ready()?;
        let Some(contributions) = self.classes.get(name) else {
            return Ok(Vec::new());
        };
        Ok(contributions
            .iter()
            .map(|c| ClassDef {
                name: name.into(),
                superclass: c.superclass.clone(),
                fields: c.fields.clone(),
                methods: c.methods.clone(),
                file: c.file,
                generation: c.generation,
            })
            .collect())
    }

    pub fn is_class(&self, name: &str) -> IntelResult<bool> {
        self.check_ready()?;
        Ok(self.classes.contains_key(name))
    }

    pub fn alias(&self, name: &str) -> IntelResult<Option<TypeRef>> {
        self.check_ready()?;
        Ok(self.aliases.get(name).map(|entry| entry.0.clone()))
    }

    /// Node assigned to a global name. The returned ref may be stale; the
    /// caller must validate it against the document model before trusting it.
    pub fn global(&self, name: &str) -> IntelResult<Option<NodeRef>> {
        self.check_ready()?;
        Ok(self.globals.get(name).map(|node| *node))
    }

    /// Class names, sorted. For listings and completion surfaces.
    pub fn class_names(&self) -> IntelResult<Vec<CompactString>> {
        self.check_ready()?;
        let mut names: Vec<CompactString> =
            self.classes.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn clear(&self) {
        self.classes.clear();
        self.aliases.clear();
        self.globals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::decl::ClassDecl;
    use crate::types::Range;

    fn decls_with_class(name: &str, superclass: Option<&str>) -> FileDecls {
        let mut decls = FileDecls::default();
        decls.classes.push(ClassDecl {
            name: name.into(),
            superclass: superclass.map(|s| s.into()),
            fields: vec![MemberDecl::field(
                "hp",
                name,
                Some(TypeRef::Number),
                Range::new(1, 0, 1, 1),
            )],
            range: Range::new(1, 0, 1, 1),
        });
        decls
    }

    fn file(raw: u32) -> FileId {
        FileId::new(raw).unwrap()
    }

    #[test]
    fn test_dumb_mode_lookups() {
        let stubs = StubIndex::new();
        stubs.apply_file(file(1), 1, &decls_with_class("Player", None));
        assert!(matches!(
            stubs.class_defs("Player"),
            Err(IntelError::IndexNotReady)
        ));
        stubs.set_ready(true);
        assert_eq!(stubs.class_defs("Player").unwrap().len(), 1);
    }

    #[test]
    fn test_absent_is_ok_empty() {
        let stubs = StubIndex::new();
        stubs.set_ready(true);
        assert!(stubs.class_defs("Nothing").unwrap().is_empty());
        assert!(!stubs.is_class("Nothing").unwrap());
    }

    #[test]
    fn test_methods_attach_across_files() {
        let stubs = StubIndex::new();
        stubs.set_ready(true);
        stubs.apply_file(file(1), 1, &decls_with_class("Player", None));

        // second file defines a method on the same class
        let mut other = FileDecls::default();
        other.methods.push(MemberDecl::method(
            "update",
            "Player",
            None,
            Range::new(3, 0, 3, 1),
        ));
        stubs.apply_file(file(2), 2, &other);

        let defs = stubs.class_defs("Player").unwrap();
        assert_eq!(defs.len(), 2);
        assert!(defs.iter().any(|d| d.methods.iter().any(|m| m.name.as_ref() == "update")));
    }

    #[test]
    fn test_reindex_purges_previous_contribution() {
        let stubs = StubIndex::new();
        stubs.set_ready(true);
        stubs.apply_file(file(1), 1, &decls_with_class("Player", Some("Entity")));
        stubs.apply_file(file(1), 2, &decls_with_class("Enemy", None));

        assert!(stubs.class_defs("Player").unwrap().is_empty());
        let defs = stubs.class_defs("Enemy").unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].generation, 2);
    }

    #[test]
    fn test_class_names_sorted() {
        let stubs = StubIndex::new();
        stubs.set_ready(true);
        stubs.apply_file(file(1), 1, &decls_with_class("Zed", None));
        stubs.apply_file(file(2), 1, &decls_with_class("Ant", None));
        let names = stubs.class_names().unwrap();
        assert_eq!(names, vec!["Ant".into(), "Zed".into()] as Vec<CompactString>);
    }
}
