//! Per-artifact refinement: the bounded generate/execute/refine loop and
//! the workspace its candidates are persisted to.

mod runner;
mod workspace;

pub use runner::RefinementLoop;
pub use workspace::ArtifactWorkspace;
