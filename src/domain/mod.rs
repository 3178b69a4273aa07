//! Domain types for renderloop
//!
//! - Job / JobStatus: asynchronous pipeline invocations
//! - ArtifactSpec: input for one artifact, built from syllabus entries
//! - Attempt / RefinementTrace: per-iteration execution records
//! - RefinementResult: final per-artifact summary

pub mod artifact;
pub mod attempt;
pub mod job;
pub mod refinement;

pub use artifact::{AnimationScript, ArtifactSpec, SyllabusEntry, VisualElement};
pub use attempt::{Attempt, AttemptOutcome, RefinementTrace};
pub use job::{Job, JobId, JobStatus};
pub use refinement::{RefinementResult, TRAILING_CHARS, tail_chars};
