//! Project dependency graph.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::ProjectId;

/// Directed graph of project-to-project references.
///
/// Built once per solution snapshot. The topological order lists every
/// project after all of the projects it references; projects with no
/// ordering constraint between them keep their insertion order.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    references: FxHashMap<ProjectId, Vec<ProjectId>>,
    referenced_by: FxHashMap<ProjectId, Vec<ProjectId>>,
    topological: Vec<ProjectId>,
}

impl DependencyGraph {
    /// Build the graph; returns the offending project if references form a cycle.
    pub fn new<'a>(
        projects: impl IntoIterator<Item = (ProjectId, &'a [ProjectId])>,
    ) -> Result<Self, ProjectId> {
        let mut graph = Self::default();
        let mut order = Vec::new();
        for (project, refs) in projects {
            order.push(project);
            graph.references.insert(project, refs.to_vec());
            graph.referenced_by.entry(project).or_default();
            for &target in refs {
                graph.referenced_by.entry(target).or_default().push(project);
            }
        }

        // Depth-first post-order; `in_progress` catches back edges.
        let mut done = IndexSet::new();
        let mut in_progress = FxHashSet::default();
        for &root in &order {
            if done.contains(&root) {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            in_progress.insert(root);
            while let Some((project, next_child)) = stack.pop() {
                let children = graph.direct_references(project);
                if let Some(&child) = children.get(next_child) {
                    stack.push((project, next_child + 1));
                    if done.contains(&child) {
                        continue;
                    }
                    if !in_progress.insert(child) {
                        return Err(child);
                    }
                    stack.push((child, 0));
                } else {
                    in_progress.remove(&project);
                    done.insert(project);
                }
            }
        }

        graph.topological = done.into_iter().collect();
        Ok(graph)
    }

    pub fn direct_references(&self, project: ProjectId) -> &[ProjectId] {
        self.references.get(&project).map_or(&[][..], Vec::as_slice)
    }

    /// Every project `project` depends on, directly or transitively (excluding itself).
    pub fn transitive_dependencies(&self, project: ProjectId) -> FxHashSet<ProjectId> {
        Self::closure(project, |p| self.direct_references(p))
    }

    /// Every project that depends on `project`, directly or transitively (excluding itself).
    pub fn transitively_dependent_projects(&self, project: ProjectId) -> FxHashSet<ProjectId> {
        Self::closure(project, |p| {
            self.referenced_by.get(&p).map_or(&[][..], Vec::as_slice)
        })
    }

    pub fn depends_on(&self, project: ProjectId, dependency: ProjectId) -> bool {
        project == dependency || self.transitive_dependencies(project).contains(&dependency)
    }

    /// All projects, each after everything it references.
    pub fn topologically_sorted(&self) -> &[ProjectId] {
        &self.topological
    }

    fn closure<'g>(
        start: ProjectId,
        edges: impl Fn(ProjectId) -> &'g [ProjectId],
    ) -> FxHashSet<ProjectId> {
        let mut seen = FxHashSet::default();
        let mut stack = edges(start).to_vec();
        while let Some(project) = stack.pop() {
            if project != start && seen.insert(project) {
                stack.extend_from_slice(edges(project));
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u32) -> ProjectId {
        ProjectId::new(id)
    }

    fn chain() -> DependencyGraph {
        // p2 -> p1 -> p0, p3 -> p0
        let refs: Vec<(ProjectId, Vec<ProjectId>)> = vec![
            (p(2), vec![p(1)]),
            (p(0), vec![]),
            (p(1), vec![p(0)]),
            (p(3), vec![p(0)]),
        ];
        DependencyGraph::new(refs.iter().map(|(id, r)| (*id, r.as_slice()))).unwrap()
    }

    #[test]
    fn test_topological_order_respects_references() {
        let graph = chain();
        assert_eq!(graph.topologically_sorted(), &[p(0), p(1), p(2), p(3)]);
    }

    #[test]
    fn test_transitive_closures() {
        let graph = chain();

        let deps = graph.transitive_dependencies(p(2));
        assert_eq!(deps, [p(0), p(1)].into_iter().collect::<FxHashSet<_>>());

        let dependents = graph.transitively_dependent_projects(p(0));
        assert_eq!(dependents, [p(1), p(2), p(3)].into_iter().collect::<FxHashSet<_>>());

        assert!(graph.depends_on(p(2), p(0)));
        assert!(!graph.depends_on(p(3), p(1)));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let refs: Vec<(ProjectId, Vec<ProjectId>)> =
            vec![(p(0), vec![p(1)]), (p(1), vec![p(0)])];
        let result = DependencyGraph::new(refs.iter().map(|(id, r)| (*id, r.as_slice())));
        assert!(result.is_err());
    }
}
