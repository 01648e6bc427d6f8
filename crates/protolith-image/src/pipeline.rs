//! Resolve, fetch, parse and build in one pass
//!
//! Module files are fetched concurrently once the graph is known. A
//! cancelled or failed run never yields a partial image.

use crate::builder::build;
use crate::error::BuildErrors;
use crate::image::Image;
use crate::parse::{ParseError, SchemaParser};
use crate::tree::{DeclarationTree, FileId};
use futures::future::try_join_all;
use protolith_core::{CancellationToken, Finding, ModuleRef};
use protolith_graph::{cancellable, resolve, ModuleGraph, ResolutionError};
use protolith_source::{SourceFile, SourceProvider};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Build failed:\n{0}")]
    Build(#[from] BuildErrors),

    #[error("Build cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Resolution(ResolutionError::Cancelled))
    }
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct WorkspaceBuild {
    pub graph: ModuleGraph,
    pub image: Image,
}

impl WorkspaceBuild {
    /// Non-fatal resolution findings
    pub fn warnings(&self) -> &[Finding] {
        self.graph.warnings()
    }
}

/// Resolve `roots`, fetch every module's files and build the image
pub async fn build_workspace(
    roots: &[ModuleRef],
    provider: &dyn SourceProvider,
    parser: &dyn SchemaParser,
    cancel: &CancellationToken,
) -> Result<WorkspaceBuild, PipelineError> {
    let graph = resolve(roots, provider, cancel).await?;

    let modules: Vec<ModuleRef> = graph
        .build_order()
        .iter()
        .filter_map(|name| graph.module(name))
        .map(|m| m.reference.clone())
        .collect();

    let fetches = modules.iter().map(|module| async move {
        provider
            .list_files(module)
            .await
            .map(|files| (module.clone(), files))
            .map_err(|e| ResolutionError::unavailable(module, e))
    });
    let fetched: Vec<(ModuleRef, Vec<SourceFile>)> = cancellable(cancel, try_join_all(fetches))
        .await
        .map_err(|_| PipelineError::Cancelled)??;

    let mut trees = BTreeMap::new();
    for (module, files) in fetched {
        for file in files {
            let syntax = parser.parse(&file)?;
            let id = FileId::new(module.clone(), file.path.clone());
            trees.insert(id.clone(), DeclarationTree::build(id, file.digest, &syntax));
        }
    }

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let image = build(&graph, trees)?;
    Ok(WorkspaceBuild { graph, image })
}
