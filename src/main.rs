use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use renderloop::codegen::{LlmArtifactWriter, LlmScriptWriter};
use renderloop::config::Config;
use renderloop::dispatch::Dispatcher;
use renderloop::domain::{JobStatus, RefinementResult};
use renderloop::frames::{FfmpegFrameSampler, FrameSampler};
use renderloop::llm::{AnthropicClient, Usage};
use renderloop::pipeline::PipelineOrchestrator;
use renderloop::refine::{ArtifactWorkspace, RefinementLoop};
use renderloop::sandbox::{ExecutionSandbox, ManimSandbox};
use renderloop::store::JobStore;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("renderloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("renderloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    // RUST_LOG wins over the config file
    if let (None, Some(level)) = (std::env::var_os("RUST_LOG"), level) {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            subject,
            syllabus,
            max_iterations,
            output_dir,
            write_scripts,
        } => {
            handle_run_command(
                subject,
                syllabus,
                *max_iterations,
                output_dir.as_deref(),
                *write_scripts,
                config,
            )
            .await
        }
        Commands::Exec { file } => handle_exec_command(file, config).await,
        Commands::Frames { file, stride } => handle_frames_command(file, *stride, config).await,
    }
}

async fn handle_run_command(
    subject: &str,
    syllabus: &Path,
    max_iterations: Option<u32>,
    output_dir: Option<&Path>,
    write_scripts: bool,
    config: &Config,
) -> Result<()> {
    let max_iterations = max_iterations.unwrap_or(config.pipeline.max_iterations);
    if max_iterations == 0 {
        eyre::bail!("--max-iterations must be > 0");
    }
    let output_dir = output_dir.unwrap_or(&config.pipeline.output_dir);
    info!("Running {} from {} into {}", subject, syllabus.display(), output_dir.display());

    let llm = AnthropicClient::new(config.llm.anthropic()).context("Failed to create LLM client")?;
    let writer = Arc::new(LlmArtifactWriter::new(llm));
    let refinement = RefinementLoop::new(
        writer.clone(),
        writer.clone(),
        Arc::new(ManimSandbox::new(config.sandbox.sandbox())),
        Arc::new(FfmpegFrameSampler::new(config.frames.ffmpeg())),
        ArtifactWorkspace::new(output_dir),
    )
    .with_frame_stride(config.frames.stride);

    let dispatcher = Dispatcher::new(
        Arc::new(JobStore::new()),
        PipelineOrchestrator::new(refinement),
        config.pipeline.workers,
        max_iterations,
    );

    let import = dispatcher.import_syllabus(syllabus);
    let upstream = dispatcher.wait(&import.job_id, POLL_INTERVAL).await?;
    if upstream.status == JobStatus::Failed {
        eyre::bail!(
            "Failed to import {}: {}",
            syllabus.display(),
            upstream.error.unwrap_or_default()
        );
    }

    let mut syllabus_job = import.job_id;
    let mut usage = Usage::default();
    if write_scripts {
        let scripts = Arc::new(LlmScriptWriter::new(
            AnthropicClient::new(config.llm.anthropic()).context("Failed to create LLM client")?,
        ));
        let scripting = dispatcher
            .write_scripts(subject, &syllabus_job, scripts.clone())
            .context("Failed to submit script writing job")?;
        println!("{} scripts for job {}", "Writing:".cyan(), scripting.job_id);

        let scripted = dispatcher.wait(&scripting.job_id, POLL_INTERVAL).await?;
        usage.add(&scripts.client().total_usage());
        if scripted.status == JobStatus::Failed {
            eyre::bail!("Failed to write animation scripts: {}", scripted.error.unwrap_or_default());
        }
        syllabus_job = scripting.job_id;
    }

    let submission = dispatcher
        .submit(subject, &syllabus_job)
        .context("Failed to submit refinement job")?;
    println!("{} job {} ({})", "Queued:".cyan(), submission.job_id, submission.status);

    let job = dispatcher.wait(&submission.job_id, POLL_INTERVAL).await?;
    usage.add(&writer.client().total_usage());
    info!("LLM usage: {} input / {} output tokens", usage.input_tokens, usage.output_tokens);
    println!("{} {} tokens", "LLM usage:".dimmed(), usage.total());

    match job.status {
        JobStatus::Completed => {
            let results: Vec<RefinementResult> = serde_json::from_value(job.result.unwrap_or_default())
                .context("Job finished with an unreadable result")?;
            print_results(&results);
            for job in dispatcher.store().list() {
                info!("Job {} finished as {}", job.id, job.status);
            }
            Ok(())
        }
        _ => eyre::bail!("Job {} failed: {}", job.id, job.error.unwrap_or_default()),
    }
}

fn print_results(results: &[RefinementResult]) {
    if results.is_empty() {
        println!("{}", "No chapters with an animation script".yellow());
        return;
    }

    for result in results {
        let mark = if result.success { "✓".green() } else { "✗".red() };
        println!(
            "{} {} ({} iteration(s)) {}",
            mark,
            result.chapter.bold(),
            result.iterations_used,
            result.artifact_path.display()
        );
        if let Some(reason) = &result.aborted {
            println!("    {} {}", "aborted:".red(), reason);
        } else if !result.success {
            if let Some(line) = result.trailing_errors.lines().rev().find(|l| !l.trim().is_empty()) {
                println!("    {}", line.dimmed());
            }
        }
    }

    let rendered = results.iter().filter(|r| r.success).count();
    println!("{} {}/{} rendered", "Done:".green(), rendered, results.len());
}

async fn handle_exec_command(file: &Path, config: &Config) -> Result<()> {
    info!("Executing {}", file.display());
    let sandbox = ManimSandbox::new(config.sandbox.sandbox());
    let output = sandbox
        .execute(file)
        .await
        .context(format!("Failed to execute {}", file.display()))?;

    if output.is_tool_unavailable() {
        eyre::bail!("{}", output.stderr);
    }

    if !output.stdout.is_empty() {
        println!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprintln!("{}", output.stderr.dimmed());
    }

    if output.is_success() {
        println!("{} {}", "Rendered:".green(), file.display());
        if let Some(media) = sandbox.media_path(file) {
            println!("  {}", media.display());
        }
        Ok(())
    } else {
        eyre::bail!("{} exited with status {}", sandbox.description(), output.exit_status)
    }
}

async fn handle_frames_command(file: &Path, stride: Option<u32>, config: &Config) -> Result<()> {
    let stride = stride.unwrap_or(config.frames.stride);
    if stride == 0 {
        eyre::bail!("--stride must be > 0");
    }
    info!("Sampling {} every {} frames", file.display(), stride);

    let sampler = FfmpegFrameSampler::new(config.frames.ffmpeg());
    let sample = sampler.sample(file, stride).await;
    let bytes: usize = sample.iter().map(|frame| frame.len()).sum();
    println!("{} ({} base64 bytes)", sample.summary(), bytes);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let level = if cli.is_verbose() {
        Some("debug")
    } else {
        config.log_level.as_deref()
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
