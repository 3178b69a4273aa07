//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: import a syllabus, optionally script its chapters, and refine a
//!   scene for every animated chapter
//! - exec: run one script through the sandbox
//! - frames: sample frames from a rendered video

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Renderloop - generate, render and repair Manim scenes with an LLM
#[derive(Parser, Debug)]
#[command(name = "renderloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine one scene per animated chapter of a syllabus
    Run {
        /// Subject the syllabus belongs to (e.g. "Mathematics")
        #[arg(short, long)]
        subject: String,

        /// Syllabus JSON: an array of chapters or {"data": [...]}
        #[arg(long)]
        syllabus: PathBuf,

        /// Override pipeline.max_iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,

        /// Override pipeline.output_dir
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Have the LLM write animation scripts for chapters without one
        #[arg(long)]
        write_scripts: bool,
    },

    /// Execute one script in the sandbox and report the outcome
    Exec {
        /// Script to execute
        file: PathBuf,
    },

    /// Count the frames sampled from a rendered video
    Frames {
        /// Video file
        file: PathBuf,

        /// Sample every Nth frame (defaults to frames.stride)
        #[arg(long)]
        stride: Option<u32>,
    },
}
