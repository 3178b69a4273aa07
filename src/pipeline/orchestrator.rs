//! Batch orchestration over the refinement loop.

use log::{debug, info};

use crate::codegen::{ArtifactGenerator, ArtifactRefiner};
use crate::domain::{ArtifactSpec, RefinementResult};
use crate::error::Result;
use crate::frames::FrameSampler;
use crate::refine::RefinementLoop;
use crate::sandbox::ExecutionSandbox;

/// Runs the refinement loop over a batch of specs, one at a time, in order
pub struct PipelineOrchestrator<G: ?Sized, R: ?Sized, S: ?Sized, F: ?Sized> {
    refinement: RefinementLoop<G, R, S, F>,
}

impl<G, R, S, F> PipelineOrchestrator<G, R, S, F>
where
    G: ArtifactGenerator + ?Sized,
    R: ArtifactRefiner + ?Sized,
    S: ExecutionSandbox + ?Sized,
    F: FrameSampler + ?Sized,
{
    pub fn new(refinement: RefinementLoop<G, R, S, F>) -> Self {
        Self { refinement }
    }

    /// One result per refinable spec, in input order.
    ///
    /// Specs without a generation target are skipped. An artifact that never
    /// renders is reported in its result and does not stop the batch;
    /// generation and persistence errors do.
    pub async fn run_batch(&self, specs: &[ArtifactSpec], max_iterations: u32) -> Result<Vec<RefinementResult>> {
        let mut results = Vec::with_capacity(specs.len());

        for spec in specs {
            if !spec.is_refinable() {
                debug!("Skipping {}: no animation script", spec.chapter);
                continue;
            }
            results.push(self.refinement.run(spec, max_iterations).await?);
        }

        let rendered = results.iter().filter(|r| r.success).count();
        info!("Batch done: {}/{} artifacts rendered", rendered, results.len());
        Ok(results)
    }
}
