//! Renderloop - LLM-driven scene generation with a bounded repair loop
//!
//! Renderloop turns the chapters of a syllabus into Manim scenes. Each scene
//! is generated, rendered in a sandbox and, when the render fails, repaired
//! from the captured evidence until it renders or the iteration budget runs
//! out. Pipeline runs are tracked as asynchronous jobs.

pub mod codegen;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod frames;
pub mod id;
pub mod llm;
pub mod pipeline;
pub mod refine;
pub mod sandbox;
pub mod store;

pub use error::{RenderError, Result};
