//! CLI module for renderloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
