//! Refinement loop - generate, execute, evaluate, refine.
//!
//! One `RefinementLoop` drives a single artifact through at most
//! `max_iterations` sandbox executions. Each execution appends one Attempt
//! to the trace; a missing execution tool aborts without recording anything.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use super::workspace::ArtifactWorkspace;
use crate::codegen::{ArtifactGenerator, ArtifactRefiner, RefinementRequest};
use crate::domain::{ArtifactSpec, Attempt, RefinementResult, RefinementTrace};
use crate::error::{RenderError, Result};
use crate::frames::{DEFAULT_STRIDE, FrameSample, FrameSampler};
use crate::sandbox::{ExecutionOutput, ExecutionSandbox};

/// Where the loop is between two steps
enum LoopState {
    Generate,
    Execute { iteration: u32, code: String },
    Evaluate { iteration: u32, code: String, output: ExecutionOutput },
    Refine { iteration: u32, request: RefinementRequest },
    Done(Finish),
}

/// Why the loop stopped
enum Finish {
    Succeeded,
    Exhausted,
    Aborted(String),
}

/// Bounded generate/execute/evaluate/refine cycle for one artifact
pub struct RefinementLoop<G: ?Sized, R: ?Sized, S: ?Sized, F: ?Sized> {
    generator: Arc<G>,
    refiner: Arc<R>,
    sandbox: Arc<S>,
    sampler: Arc<F>,
    workspace: ArtifactWorkspace,
    frame_stride: u32,
}

impl<G, R, S, F> RefinementLoop<G, R, S, F>
where
    G: ArtifactGenerator + ?Sized,
    R: ArtifactRefiner + ?Sized,
    S: ExecutionSandbox + ?Sized,
    F: FrameSampler + ?Sized,
{
    pub fn new(generator: Arc<G>, refiner: Arc<R>, sandbox: Arc<S>, sampler: Arc<F>, workspace: ArtifactWorkspace) -> Self {
        Self {
            generator,
            refiner,
            sandbox,
            sampler,
            workspace,
            frame_stride: DEFAULT_STRIDE,
        }
    }

    /// Sample every `stride`-th frame of partial renders
    pub fn with_frame_stride(mut self, stride: u32) -> Self {
        self.frame_stride = stride.max(1);
        self
    }

    /// Run the loop and return the final summary
    pub async fn run(&self, spec: &ArtifactSpec, max_iterations: u32) -> Result<RefinementResult> {
        self.run_traced(spec, max_iterations).await.map(|(result, _)| result)
    }

    /// Run the loop and return the summary together with every Attempt
    pub async fn run_traced(&self, spec: &ArtifactSpec, max_iterations: u32) -> Result<(RefinementResult, RefinementTrace)> {
        if max_iterations == 0 {
            return Err(RenderError::InvalidState("max_iterations must be at least 1".to_string()));
        }

        let path = self.workspace.reserve(spec)?;
        let mut trace = RefinementTrace::new();
        let mut state = LoopState::Generate;

        info!("Refining {} (max {} iterations) at {}", spec.chapter, max_iterations, path.display());

        let finish = loop {
            state = match state {
                LoopState::Generate => {
                    let code = match self.generator.generate(spec).await {
                        Ok(code) => code,
                        Err(e) => {
                            // Drop the reserved, still empty file
                            let _ = std::fs::remove_file(&path);
                            return Err(e);
                        }
                    };
                    self.workspace.persist(&path, &code)?;
                    LoopState::Execute { iteration: 0, code }
                }
                LoopState::Execute { iteration, code } => self.execute(&path, iteration, code).await?,
                LoopState::Evaluate { iteration, code, output } => {
                    let attempt = Attempt::new(iteration, code, output.stdout, output.stderr, output.exit_status);
                    debug!(
                        "{} iteration {} exited with {}",
                        spec.chapter,
                        iteration,
                        attempt.exit_status()
                    );

                    if attempt.is_success() {
                        trace.record(attempt);
                        LoopState::Done(Finish::Succeeded)
                    } else {
                        let request = RefinementRequest {
                            code: attempt.code().to_string(),
                            stdout: attempt.stdout().to_string(),
                            stderr: attempt.stderr().to_string(),
                            frame_summary: String::new(),
                        };
                        trace.record(attempt);
                        LoopState::Refine { iteration, request }
                    }
                }
                LoopState::Refine { iteration, mut request } => {
                    let frames = self.sample_frames(&path).await;
                    request.frame_summary = frames.summary();

                    let code = self.refiner.refine(&request).await?;
                    self.workspace.persist(&path, &code)?;

                    let next = iteration + 1;
                    if next < max_iterations {
                        LoopState::Execute { iteration: next, code }
                    } else {
                        LoopState::Done(Finish::Exhausted)
                    }
                }
                LoopState::Done(finish) => break finish,
            };
        };

        let result = match finish {
            Finish::Succeeded => {
                info!("{} rendered after {} iteration(s)", spec.chapter, trace.len());
                RefinementResult::from_trace(path, &spec.chapter, &trace)
            }
            Finish::Exhausted => {
                warn!("{} still failing after {} iteration(s)", spec.chapter, trace.len());
                RefinementResult::from_trace(path, &spec.chapter, &trace)
            }
            Finish::Aborted(reason) => {
                warn!("{} aborted: {}", spec.chapter, reason);
                RefinementResult::aborted(path, &spec.chapter, &trace, reason)
            }
        };

        Ok((result, trace))
    }

    async fn execute(&self, path: &Path, iteration: u32, code: String) -> Result<LoopState> {
        let output = match self.sandbox.execute(path).await {
            Ok(output) if output.is_tool_unavailable() => {
                return Ok(LoopState::Done(Finish::Aborted(output.stderr)));
            }
            Ok(output) => output,
            Err(RenderError::SandboxUnavailable(reason)) => {
                return Ok(LoopState::Done(Finish::Aborted(reason)));
            }
            Err(RenderError::ExecutionFailure { exit_status, stderr }) => ExecutionOutput::failure(stderr, exit_status),
            Err(e) => return Err(e),
        };

        Ok(LoopState::Evaluate { iteration, code, output })
    }

    async fn sample_frames(&self, artifact: &Path) -> FrameSample {
        match self.sandbox.media_path(artifact) {
            Some(media) => self.sampler.sample(&media, self.frame_stride).await,
            None => FrameSample::empty(),
        }
    }
}
