//! Module graph resolution
//!
//! Walks declared dependencies breadth-first from the root modules. Every
//! level's manifests are fetched concurrently and joined before the next
//! level starts. Once discovery is done, one version per module name is
//! selected (highest wins, root modules always win for their own name) and
//! the graph is built from the selected manifests only.

use crate::error::ResolutionError;
use crate::graph::{ModuleGraph, ModuleId};
use futures::future::try_join_all;
use protolith_core::{CancellationToken, Finding, ModuleManifest, ModuleRef, Severity, DEPENDENCY_VERSION_SKEW};
use protolith_source::SourceProvider;
use semver::{Version, VersionReq};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;

/// Race `future` against the cancellation token
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = T>,
) -> Result<T, ResolutionError> {
    if cancel.is_cancelled() {
        return Err(ResolutionError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResolutionError::Cancelled),
        output = future => Ok(output),
    }
}

/// Resolve the module graph reachable from `roots`
pub async fn resolve(
    roots: &[ModuleRef],
    provider: &dyn SourceProvider,
    cancel: &CancellationToken,
) -> Result<ModuleGraph, ResolutionError> {
    let mut resolver = Resolver::new(provider, cancel);
    resolver.discover(roots).await?;
    resolver.into_graph(roots)
}

/// Discovery state for one resolution pass
struct Resolver<'a> {
    provider: &'a dyn SourceProvider,
    cancel: &'a CancellationToken,

    /// Every manifest seen, by name then reference
    candidates: BTreeMap<String, BTreeMap<ModuleRef, ModuleManifest>>,

    /// (name, constraint) -> reference the provider picked
    picks: BTreeMap<(String, String), ModuleRef>,

    /// Root references by name
    roots: BTreeMap<String, ModuleRef>,
}

impl<'a> Resolver<'a> {
    fn new(provider: &'a dyn SourceProvider, cancel: &'a CancellationToken) -> Self {
        Self {
            provider,
            cancel,
            candidates: BTreeMap::new(),
            picks: BTreeMap::new(),
            roots: BTreeMap::new(),
        }
    }

    async fn discover(&mut self, roots: &[ModuleRef]) -> Result<(), ResolutionError> {
        for root in roots {
            self.roots.insert(root.name.clone(), root.clone());
        }

        let mut frontier: Vec<ModuleRef> = self.roots.values().cloned().collect();

        while !frontier.is_empty() {
            let provider = self.provider;
            let manifests = cancellable(
                self.cancel,
                try_join_all(frontier.iter().map(|module| async move {
                    provider
                        .manifest(module)
                        .await
                        .map_err(|e| ResolutionError::unavailable(module, e))
                })),
            )
            .await??;

            // Constraints not yet mapped to a reference
            let mut pending: Vec<(String, VersionReq)> = Vec::new();
            for manifest in &manifests {
                for dep in &manifest.dependencies {
                    let key = (dep.name.clone(), dep.version.to_string());
                    if self.roots.contains_key(&dep.name) || self.picks.contains_key(&key) {
                        continue;
                    }
                    if !pending.iter().any(|(n, v)| *n == dep.name && *v == dep.version) {
                        pending.push((dep.name.clone(), dep.version.clone()));
                    }
                }
            }

            for manifest in manifests {
                self.candidates
                    .entry(manifest.module.name.clone())
                    .or_default()
                    .insert(manifest.module.clone(), manifest);
            }

            let picked = cancellable(
                self.cancel,
                try_join_all(pending.iter().map(|(name, constraint)| async move {
                    provider
                        .resolve_module(name, constraint)
                        .await
                        .map_err(|e| ResolutionError::unavailable(format!("{} {}", name, constraint), e))
                })),
            )
            .await??;

            let mut next = Vec::new();
            for ((name, constraint), module) in pending.into_iter().zip(picked) {
                self.picks.insert((name, constraint.to_string()), module.clone());
                let known = self
                    .candidates
                    .get(&module.name)
                    .map(|c| c.contains_key(&module))
                    .unwrap_or(false);
                if !known && !next.contains(&module) {
                    next.push(module);
                }
            }
            frontier = next;
        }

        Ok(())
    }

    /// Reference a dependency edge of `manifest` points at before selection
    fn requested(&self, dep_name: &str, constraint: &VersionReq) -> Option<&ModuleRef> {
        self.roots
            .get(dep_name)
            .or_else(|| self.picks.get(&(dep_name.to_string(), constraint.to_string())))
    }

    fn manifest(&self, module: &ModuleRef) -> Option<&ModuleManifest> {
        self.candidates.get(&module.name).and_then(|c| c.get(module))
    }

    /// Pick one reference per name among `considered`
    fn select(&self, considered: &BTreeMap<String, BTreeSet<ModuleRef>>) -> BTreeMap<String, ModuleRef> {
        considered
            .iter()
            .filter_map(|(name, refs)| {
                let winner = match self.roots.get(name) {
                    Some(root) => Some(root),
                    None => refs.iter().max_by(|a, b| a.version.cmp(&b.version)),
                };
                winner.map(|w| (name.clone(), w.clone()))
            })
            .collect()
    }

    /// References requested by modules reachable from the roots under `winners`
    fn reachable_requests(
        &self,
        winners: &BTreeMap<String, ModuleRef>,
    ) -> BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>> {
        let mut requests: BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>> = BTreeMap::new();
        let mut queue: VecDeque<&ModuleRef> = self.roots.values().collect();
        let mut seen = BTreeSet::new();

        for root in self.roots.values() {
            requests.entry(root.name.clone()).or_default().insert(root.clone(), Vec::new());
        }

        while let Some(module) = queue.pop_front() {
            if !seen.insert(module.name.clone()) {
                continue;
            }
            let Some(manifest) = self.manifest(module) else { continue };

            for dep in &manifest.dependencies {
                if let Some(requested) = self.requested(&dep.name, &dep.version) {
                    requests
                        .entry(dep.name.clone())
                        .or_default()
                        .entry(requested.clone())
                        .or_default()
                        .push(module.to_string());
                }
                if let Some(winner) = winners.get(&dep.name) {
                    queue.push_back(winner);
                }
            }
        }

        requests
    }

    fn into_graph(self, roots: &[ModuleRef]) -> Result<ModuleGraph, ResolutionError> {
        let mut considered: BTreeMap<String, BTreeSet<ModuleRef>> = self
            .candidates
            .iter()
            .map(|(name, refs)| (name.clone(), refs.keys().cloned().collect()))
            .collect();

        // Drop candidates only requested through losing versions, until stable
        let mut requests = BTreeMap::new();
        let mut observed: BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>> = BTreeMap::new();
        let mut converged = false;
        for _ in 0..=self.candidates.len() {
            let winners = self.select(&considered);
            requests = self.reachable_requests(&winners);
            merge_requests(&mut observed, &requests);

            let next: BTreeMap<String, BTreeSet<ModuleRef>> = requests
                .iter()
                .map(|(name, refs)| (name.clone(), refs.keys().cloned().collect()))
                .collect();
            if next == considered {
                converged = true;
                break;
            }
            considered = next;
        }

        // Selection flips between versions when a losing version is the only
        // path to one of its own rivals
        if !converged {
            return Err(self.unstable_selection(&observed));
        }

        let winners = self.select(&considered);
        for winner in winners.values() {
            let Some(manifest) = self.manifest(winner) else { continue };
            if manifest.dependencies.iter().any(|d| !winners.contains_key(&d.name)) {
                return Err(self.unstable_selection(&observed));
            }
        }
        let mut warnings = Vec::new();
        let mut manifests = BTreeMap::new();

        for (name, winner) in &winners {
            let requested = requests.get(name).cloned().unwrap_or_default();
            if !self.roots.contains_key(name) {
                if let Some(warning) = self.check_versions(name, winner, &requested)? {
                    warnings.push(warning);
                }
            }

            let manifest = self.manifest(winner).cloned().ok_or_else(|| {
                ResolutionError::unavailable(winner, protolith_source::SourceError::NotFound(winner.to_string()))
            })?;
            manifests.insert(name.clone(), manifest);
        }

        let root_names: Vec<ModuleId> = roots.iter().map(|r| r.name.clone()).collect();
        ModuleGraph::from_manifests(&root_names, manifests, warnings)
    }

    /// Conflict for the first non-root name that was ever requested at more than one version
    fn unstable_selection(&self, observed: &BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>>) -> ResolutionError {
        observed
            .iter()
            .find(|(name, refs)| refs.len() > 1 && !self.roots.contains_key(*name))
            .or_else(|| observed.iter().find(|(_, refs)| refs.len() > 1))
            .map(|(name, refs)| version_conflict(name, refs))
            .unwrap_or_else(|| ResolutionError::VersionConflict {
                module: observed.keys().next().cloned().unwrap_or_default(),
                versions: Vec::new(),
                required_by: Vec::new(),
            })
    }

    /// Diamond check for one module name
    fn check_versions(
        &self,
        name: &str,
        winner: &ModuleRef,
        requested: &BTreeMap<ModuleRef, Vec<String>>,
    ) -> Result<Option<Finding>, ResolutionError> {
        if requested.len() <= 1 {
            return Ok(None);
        }

        let conflict = || version_conflict(name, requested);

        // Without versions there is no order to pick from
        let Some(winning) = winner.version.as_ref() else {
            return Err(conflict());
        };
        let mut losers: Vec<&Version> = Vec::new();
        for other in requested.keys().filter(|r| *r != winner) {
            match &other.version {
                Some(version) => losers.push(version),
                None => return Err(conflict()),
            }
        }

        let incompatible: Vec<&Version> = losers
            .into_iter()
            .filter(|loser| !caret_compatible(loser, winning))
            .collect();
        if incompatible.is_empty() {
            return Ok(None);
        }

        let declared = self.manifest(winner).and_then(|m| m.compatibility.as_ref());
        match declared {
            Some(range) if incompatible.iter().all(|v| range.matches(v)) => {
                let versions: Vec<String> = incompatible.iter().map(|v| v.to_string()).collect();
                Ok(Some(Finding::new(
                    DEPENDENCY_VERSION_SKEW,
                    Severity::Warn,
                    format!(
                        "{} resolved to {} although {} was also required; {} declares compatibility with {}",
                        name,
                        winning,
                        versions.join(", "),
                        winner,
                        range
                    ),
                )))
            }
            _ => Err(conflict()),
        }
    }
}

fn version_conflict(name: &str, requested: &BTreeMap<ModuleRef, Vec<String>>) -> ResolutionError {
    ResolutionError::VersionConflict {
        module: name.to_string(),
        versions: requested.keys().map(|r| r.to_string()).collect(),
        required_by: requested.values().flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
    }
}

/// Union `requests` into `observed`, keeping requesters unique
fn merge_requests(
    observed: &mut BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>>,
    requests: &BTreeMap<String, BTreeMap<ModuleRef, Vec<String>>>,
) {
    for (name, refs) in requests {
        let entry = observed.entry(name.clone()).or_default();
        for (reference, requesters) in refs {
            let known = entry.entry(reference.clone()).or_default();
            for requester in requesters {
                if !known.contains(requester) {
                    known.push(requester.clone());
                }
            }
        }
    }
}

/// Whether `newer` satisfies `^older`
fn caret_compatible(older: &Version, newer: &Version) -> bool {
    VersionReq::parse(&format!("^{}", older))
        .map(|req| req.matches(newer))
        .unwrap_or(false)
}
