//! Batch pipeline: upstream syllabus decoding, animation script filling and
//! the orchestrator that runs each refinable chapter through the refinement
//! loop.

mod orchestrator;
mod syllabus;

pub use orchestrator::PipelineOrchestrator;
pub use syllabus::{fill_missing_scripts, specs_from_syllabus, syllabus_entries};
