//! Module dependency graph construction
//!
//! Builds dependency edges, rejects cycles and fixes the
//! deterministic build order used by the image builder.

use crate::error::ResolutionError;
use protolith_core::{Finding, ModuleManifest, ModuleRef};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Module identifier (module name; one version per name survives resolution)
pub type ModuleId = String;

/// A module selected by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub reference: ModuleRef,
    pub manifest: ModuleManifest,

    /// Dependency names in declaration order
    pub dependencies: Vec<ModuleId>,

    /// Dependency hops from the nearest root (roots are 0)
    pub distance: usize,
}

/// Immutable, acyclic module graph
#[derive(Debug, Clone, Serialize)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, ResolvedModule>,

    roots: Vec<ModuleId>,

    /// Dependencies before dependents
    order: Vec<ModuleId>,

    /// Non-fatal resolution findings (tolerated version skew)
    warnings: Vec<Finding>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

impl ModuleGraph {
    /// Build a graph from selected manifests
    ///
    /// `manifests` must hold every module reachable from `roots`. Roots are
    /// visited sorted by name and dependencies in declaration order, so the
    /// depth-first post-order is deterministic.
    pub fn from_manifests(
        roots: &[ModuleId],
        manifests: BTreeMap<ModuleId, ModuleManifest>,
        warnings: Vec<Finding>,
    ) -> Result<Self, ResolutionError> {
        let mut roots: Vec<ModuleId> = roots.to_vec();
        roots.sort();
        roots.dedup();

        let mut edges: BTreeMap<ModuleId, Vec<ModuleId>> = BTreeMap::new();
        for (name, manifest) in &manifests {
            let mut deps: Vec<ModuleId> = Vec::new();
            for dep in &manifest.dependencies {
                if !deps.contains(&dep.name) {
                    deps.push(dep.name.clone());
                }
            }
            edges.insert(name.clone(), deps);
        }

        let order = topological_order(&roots, &edges)?;

        let distances = distances(&roots, &edges);
        let mut modules = BTreeMap::new();

        for name in &order {
            let manifest = manifests.get(name).cloned().ok_or_else(|| {
                ResolutionError::unavailable(name, protolith_source::SourceError::NotFound(name.clone()))
            })?;
            let dependencies = edges.get(name).cloned().unwrap_or_default();

            modules.insert(
                name.clone(),
                ResolvedModule {
                    reference: manifest.module.clone(),
                    manifest,
                    dependencies,
                    distance: distances.get(name).copied().unwrap_or(0),
                },
            );
        }

        Ok(Self {
            modules,
            roots,
            order,
            warnings,
        })
    }

    /// Root module names, sorted
    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.roots.iter().any(|r| r == name)
    }

    /// Deterministic build order: dependencies before dependents
    pub fn build_order(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn module(&self, name: &str) -> Option<&ResolvedModule> {
        self.modules.get(name)
    }

    /// Modules in build order
    pub fn modules(&self) -> impl Iterator<Item = &ResolvedModule> {
        self.order.iter().filter_map(|name| self.modules.get(name))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Hops from the nearest root
    pub fn distance(&self, name: &str) -> Option<usize> {
        self.modules.get(name).map(|m| m.distance)
    }

    pub fn warnings(&self) -> &[Finding] {
        &self.warnings
    }
}

/// Depth-first three-color traversal; post-order is the build order
fn topological_order(
    roots: &[ModuleId],
    edges: &BTreeMap<ModuleId, Vec<ModuleId>>,
) -> Result<Vec<ModuleId>, ResolutionError> {
    fn visit(
        name: &ModuleId,
        edges: &BTreeMap<ModuleId, Vec<ModuleId>>,
        marks: &mut BTreeMap<ModuleId, Mark>,
        stack: &mut Vec<ModuleId>,
        order: &mut Vec<ModuleId>,
    ) -> Result<(), ResolutionError> {
        match marks.get(name).copied().unwrap_or(Mark::White) {
            Mark::Black => return Ok(()),
            Mark::Gray => {
                // The edge closes a cycle: report it from the gray node back to itself
                let start = stack.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle: Vec<ModuleId> = stack[start..].to_vec();
                cycle.push(name.clone());
                return Err(ResolutionError::CyclicDependency { cycle });
            }
            Mark::White => {}
        }

        marks.insert(name.clone(), Mark::Gray);
        stack.push(name.clone());

        for dep in edges.get(name).map(Vec::as_slice).unwrap_or_default() {
            visit(dep, edges, marks, stack, order)?;
        }

        stack.pop();
        marks.insert(name.clone(), Mark::Black);
        order.push(name.clone());
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    let mut order = Vec::new();

    for root in roots {
        visit(root, edges, &mut marks, &mut stack, &mut order)?;
    }

    Ok(order)
}

/// BFS hop counts from the roots
fn distances(roots: &[ModuleId], edges: &BTreeMap<ModuleId, Vec<ModuleId>>) -> BTreeMap<ModuleId, usize> {
    let mut distances = BTreeMap::new();
    let mut queue = VecDeque::new();

    for root in roots {
        distances.insert(root.clone(), 0);
        queue.push_back(root.clone());
    }

    while let Some(current) = queue.pop_front() {
        let next = distances[&current] + 1;
        for dep in edges.get(&current).map(Vec::as_slice).unwrap_or_default() {
            if !distances.contains_key(dep) {
                distances.insert(dep.clone(), next);
                queue.push_back(dep.clone());
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolith_core::Dependency;

    fn manifest(name: &str, deps: &[&str]) -> (ModuleId, ModuleManifest) {
        let mut manifest = ModuleManifest::new(ModuleRef::local(name));
        for dep in deps {
            manifest = manifest.with_dependency(Dependency::any(*dep));
        }
        (name.to_string(), manifest)
    }

    fn graph(roots: &[&str], modules: &[(&str, &[&str])]) -> Result<ModuleGraph, ResolutionError> {
        let manifests = modules.iter().map(|(n, d)| manifest(n, d)).collect();
        let roots: Vec<ModuleId> = roots.iter().map(|r| r.to_string()).collect();
        ModuleGraph::from_manifests(&roots, manifests, Vec::new())
    }

    #[test]
    fn dependencies_come_first() {
        let graph = graph(
            &["app"],
            &[("app", &["api", "common"]), ("api", &["common"]), ("common", &[])],
        )
        .unwrap();

        assert_eq!(graph.build_order(), &["common", "api", "app"]);
        assert_eq!(graph.distance("app"), Some(0));
        assert_eq!(graph.distance("common"), Some(1));
    }

    #[test]
    fn ties_follow_declaration_order() {
        let graph = graph(&["app"], &[("app", &["zeta", "alpha"]), ("zeta", &[]), ("alpha", &[])]).unwrap();
        assert_eq!(graph.build_order(), &["zeta", "alpha", "app"]);
    }

    #[test]
    fn cycle_names_every_member() {
        let result = graph(&["a"], &[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        assert_eq!(
            result.unwrap_err(),
            ResolutionError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let result = graph(&["a"], &[("a", &["a"])]);
        assert!(matches!(result, Err(ResolutionError::CyclicDependency { .. })));
    }
}
