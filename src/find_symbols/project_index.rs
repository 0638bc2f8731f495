//! Per-project index of type declarations.
//!
//! The dependent-type finder only resolves a candidate type against the
//! semantic model when one of the simple names in its inheritance clause
//! matches a type it is looking for. This index answers "which types list
//! `Name` in their inheritance clause?" without touching every document.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::{DocumentId, ProjectId, SymbolId};
use crate::hir::{Solution, SymbolKind, TypeKind};
use crate::syntax::fold_case;

use super::cache::SnapshotCache;

/// A type declared in source, with the simple names of its inheritance clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaredTypeInfo {
    pub symbol: SymbolId,
    pub name: SmolStr,
    pub type_kind: TypeKind,
    pub inheritance_names: Vec<SmolStr>,
}

#[derive(Clone, Debug, Default)]
pub struct ProjectIndex {
    /// Classes with no base class in their inheritance clause; they derive
    /// from `System.Object` implicitly.
    classes_deriving_from_object: FxHashMap<DocumentId, Vec<DeclaredTypeInfo>>,
    structs: FxHashMap<DocumentId, Vec<DeclaredTypeInfo>>,
    enums: FxHashMap<DocumentId, Vec<DeclaredTypeInfo>>,
    delegates: FxHashMap<DocumentId, Vec<DeclaredTypeInfo>>,
    /// Inheritance-clause simple name -> declarations naming it.
    by_inheritance_name: FxHashMap<SmolStr, Vec<(DocumentId, DeclaredTypeInfo)>>,
}

/// Project indexes per solution snapshot.
#[derive(Default)]
pub struct ProjectIndexCache {
    entries: SnapshotCache<ProjectId, Arc<ProjectIndex>>,
}

impl ProjectIndex {
    /// The cached index for `project`, built on first use.
    pub fn get(
        solution: &Solution,
        project: ProjectId,
        cache: &ProjectIndexCache,
    ) -> Arc<ProjectIndex> {
        cache
            .entries
            .get_or_insert_with(solution, project, || Arc::new(Self::build(solution, project)))
    }

    pub fn build(solution: &Solution, project: ProjectId) -> Self {
        let mut index = Self::default();
        let Some(project) = solution.project(project) else {
            return index;
        };
        let case_sensitive = project.language.is_case_sensitive();

        for &document in &project.documents {
            let mut declared: Vec<SymbolId> = solution
                .declared_symbols(document)
                .filter(|&s| solution.symbol(s).kind == SymbolKind::Type)
                .collect();
            declared.sort_unstable();

            for symbol in declared {
                let data = solution.symbol(symbol);
                let Some(type_kind) = data.type_kind else {
                    continue;
                };
                let inheritance_names: Vec<SmolStr> = data
                    .base_type
                    .iter()
                    .chain(&data.interfaces)
                    .map(|&t| fold_case(&solution.symbol(t).name, case_sensitive))
                    .collect();
                let info = DeclaredTypeInfo {
                    symbol,
                    name: data.name.clone(),
                    type_kind,
                    inheritance_names,
                };

                for name in &info.inheritance_names {
                    index
                        .by_inheritance_name
                        .entry(name.clone())
                        .or_default()
                        .push((document, info.clone()));
                }
                let bucket = match type_kind {
                    TypeKind::Class if data.base_type.is_none() => {
                        Some(&mut index.classes_deriving_from_object)
                    }
                    TypeKind::Struct => Some(&mut index.structs),
                    TypeKind::Enum => Some(&mut index.enums),
                    TypeKind::Delegate => Some(&mut index.delegates),
                    TypeKind::Class | TypeKind::Interface => None,
                };
                if let Some(bucket) = bucket {
                    bucket.entry(document).or_default().push(info);
                }
            }
        }

        index
    }

    /// Declarations whose inheritance clause mentions `name`.
    pub fn types_with_inheritance_name(&self, name: &str) -> &[(DocumentId, DeclaredTypeInfo)] {
        self.by_inheritance_name
            .get(name)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Declarations that implicitly derive from the well-known base type
    /// with key `key` (`T:System.Object`, `T:System.ValueType`, ...).
    pub fn implicit_derivations<'a>(
        &'a self,
        key: &str,
    ) -> impl Iterator<Item = &'a DeclaredTypeInfo> + use<'a> {
        let bucket = match key {
            "T:System.Object" => Some(&self.classes_deriving_from_object),
            "T:System.ValueType" => Some(&self.structs),
            "T:System.Enum" => Some(&self.enums),
            "T:System.MulticastDelegate" | "T:System.Delegate" => Some(&self.delegates),
            _ => None,
        };
        bucket.into_iter().flat_map(|b| b.values().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{Language, SolutionBuilder};

    #[test]
    fn test_inheritance_names_are_indexed() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project("P");
        let d = b.add_document(
            p,
            "Shapes.cs",
            "interface IShape {} class Shape : IShape {} class Circle : Shape {} struct Point {}",
        );
        let ishape = b.declare_type(d, "IShape", TypeKind::Interface).id();
        let shape = b.declare_type(d, "Shape", TypeKind::Class).implements(ishape).id();
        let circle = b.declare_type(d, "Circle", TypeKind::Class).base_type(shape).id();
        b.declare_type(d, "Point", TypeKind::Struct);
        let solution = b.build().unwrap();

        let index = ProjectIndex::build(&solution, p);
        let shapes: Vec<SymbolId> = index
            .types_with_inheritance_name("Shape")
            .iter()
            .map(|(_, info)| info.symbol)
            .collect();
        assert_eq!(shapes, vec![circle]);
        assert_eq!(index.types_with_inheritance_name("IShape")[0].1.symbol, shape);

        let objects: Vec<&str> = index
            .implicit_derivations("T:System.Object")
            .map(|info| info.name.as_str())
            .collect();
        assert_eq!(objects, vec!["Shape"]);
        assert_eq!(index.implicit_derivations("T:System.ValueType").count(), 1);
    }

    #[test]
    fn test_case_insensitive_projects_normalize_names() {
        let mut b = SolutionBuilder::new();
        let p = b.add_project_with_language("VbLib", Language::VisualBasic);
        let d = b.add_document(
            p,
            "Shapes.vb",
            "Class Shape End Class Class Circle Inherits Shape End Class",
        );
        let shape = b.declare_type(d, "Shape", TypeKind::Class).id();
        b.declare_type(d, "Circle", TypeKind::Class).base_type(shape);
        let solution = b.build().unwrap();

        let cache = ProjectIndexCache::default();
        let index = ProjectIndex::get(&solution, p, &cache);
        assert_eq!(index.types_with_inheritance_name("shape").len(), 1);
        assert!(Arc::ptr_eq(&index, &ProjectIndex::get(&solution, p, &cache)));
    }
}
