//! Job dispatch - accepts submissions and schedules pipeline runs.
//!
//! Refinement pipelines are heavy (LLM calls plus renders), so they run on a
//! bounded pool: each job is spawned as its own task but has to hold a
//! semaphore permit while the pipeline runs. Light stages such as importing
//! a syllabus document are spawned without a permit.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::codegen::{ArtifactGenerator, ArtifactRefiner, ScriptWriter};
use crate::domain::{ArtifactSpec, Job, JobId, JobStatus, SyllabusEntry};
use crate::error::{RenderError, Result};
use crate::frames::FrameSampler;
use crate::pipeline::{PipelineOrchestrator, fill_missing_scripts, specs_from_syllabus, syllabus_entries};
use crate::sandbox::ExecutionSandbox;
use crate::store::JobStore;

/// Default size of the refinement worker pool
pub const DEFAULT_WORKERS: usize = 4;

/// Acknowledgement returned as soon as a job is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: JobId,
    pub status: String,
}

impl Submission {
    fn queued(job_id: JobId) -> Self {
        Self {
            job_id,
            status: "queued".to_string(),
        }
    }
}

/// Accepts pipeline submissions and answers status queries
pub struct Dispatcher<G: ?Sized, R: ?Sized, S: ?Sized, F: ?Sized> {
    store: Arc<JobStore>,
    pipeline: Arc<PipelineOrchestrator<G, R, S, F>>,
    workers: Arc<Semaphore>,
    max_iterations: u32,
}

impl<G, R, S, F> Dispatcher<G, R, S, F>
where
    G: ArtifactGenerator + ?Sized + 'static,
    R: ArtifactRefiner + ?Sized + 'static,
    S: ExecutionSandbox + ?Sized + 'static,
    F: FrameSampler + ?Sized + 'static,
{
    pub fn new(store: Arc<JobStore>, pipeline: PipelineOrchestrator<G, R, S, F>, workers: usize, max_iterations: u32) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            max_iterations,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Queue a refinement pipeline over the syllabus produced by `upstream`.
    ///
    /// The upstream job must exist, be completed and carry a non-empty
    /// syllabus. Must be called from within a Tokio runtime.
    pub fn submit(&self, subject: &str, upstream: &JobId) -> Result<Submission> {
        let specs = specs_from_syllabus(subject, &self.completed_result(upstream)?)?;
        if specs.is_empty() {
            return Err(RenderError::InvalidState(format!(
                "no syllabus data found in job {}",
                upstream
            )));
        }

        let job_id = self.store.create();
        info!("Queued job {} for {} ({} chapters)", job_id, subject, specs.len());

        let store = self.store.clone();
        let pipeline = self.pipeline.clone();
        let workers = self.workers.clone();
        let max_iterations = self.max_iterations;
        let id = job_id.clone();

        tokio::spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                store.update(&id, JobStatus::Failed, None, Some("worker pool closed".to_string()));
                return;
            };

            store.update(&id, JobStatus::Running, None, None);
            debug!("Job {} running", id);

            // A panic inside the pipeline surfaces as a JoinError
            let run = tokio::spawn(async move { run_job(&pipeline, &specs, max_iterations).await });
            finish(&store, &id, run.await);
        });

        Ok(Submission::queued(job_id))
    }

    /// Snapshot of a job
    pub fn status(&self, id: &JobId) -> Result<Job> {
        self.store
            .get(id)
            .ok_or_else(|| RenderError::NotFound(format!("job {}", id)))
    }

    /// Run `task` as a light background job, outside the worker pool
    pub fn spawn_light<T>(&self, task: T) -> Submission
    where
        T: Future<Output = Result<Value>> + Send + 'static,
    {
        let job_id = self.store.create();
        let store = self.store.clone();
        let id = job_id.clone();

        tokio::spawn(async move {
            store.update(&id, JobStatus::Running, None, None);
            let run = tokio::spawn(task);
            finish(&store, &id, run.await);
        });

        Submission::queued(job_id)
    }

    /// Load a syllabus JSON document as a completed upstream job.
    ///
    /// The document may be a bare array of entries or `{"data": [...]}`;
    /// the job result is always the `{"data": [...]}` form.
    pub fn import_syllabus(&self, path: impl Into<PathBuf>) -> Submission {
        let path = path.into();
        self.spawn_light(async move {
            let text = tokio::fs::read_to_string(&path).await?;
            let value: Value = serde_json::from_str(&text)?;
            let entries = syllabus_entries(&value)?;
            debug!("Imported {} syllabus entries from {}", entries.len(), path.display());
            syllabus_result(&entries)
        })
    }

    /// Queue a light job that writes animation scripts for the chapters of
    /// `upstream` that lack one.
    ///
    /// The new job's result is the completed syllabus in `{"data": [...]}`
    /// form, ready to be passed to `submit`.
    pub fn write_scripts<W>(&self, subject: &str, upstream: &JobId, writer: Arc<W>) -> Result<Submission>
    where
        W: ScriptWriter + ?Sized + 'static,
    {
        let entries = syllabus_entries(&self.completed_result(upstream)?)?;
        let subject = subject.to_string();
        info!("Queued script writing for {} ({} chapters)", subject, entries.len());

        Ok(self.spawn_light(async move {
            let entries = fill_missing_scripts(writer.as_ref(), &subject, entries).await?;
            syllabus_result(&entries)
        }))
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait(&self, id: &JobId, interval: Duration) -> Result<Job> {
        loop {
            let job = self.status(id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn completed_result(&self, upstream: &JobId) -> Result<Value> {
        let job = self
            .store
            .get(upstream)
            .ok_or_else(|| RenderError::NotFound(format!("syllabus job {}", upstream)))?;

        if job.status != JobStatus::Completed {
            return Err(RenderError::InvalidState(format!(
                "syllabus job {} is {}, not completed",
                upstream, job.status
            )));
        }

        job.result
            .ok_or_else(|| RenderError::InvalidState(format!("syllabus job {} has no result", upstream)))
    }
}

async fn run_job<G, R, S, F>(
    pipeline: &PipelineOrchestrator<G, R, S, F>,
    specs: &[ArtifactSpec],
    max_iterations: u32,
) -> Result<Value>
where
    G: ArtifactGenerator + ?Sized,
    R: ArtifactRefiner + ?Sized,
    S: ExecutionSandbox + ?Sized,
    F: FrameSampler + ?Sized,
{
    let results = pipeline.run_batch(specs, max_iterations).await?;
    Ok(serde_json::to_value(results)?)
}

fn syllabus_result(entries: &[SyllabusEntry]) -> Result<Value> {
    let data = serde_json::to_value(entries)?;
    Ok(json!({ "data": data }))
}

/// Record the terminal state of a job task
fn finish(store: &JobStore, id: &JobId, outcome: std::result::Result<Result<Value>, JoinError>) {
    match outcome {
        Ok(Ok(result)) => {
            info!("Job {} completed", id);
            store.update(id, JobStatus::Completed, Some(result), None);
        }
        Ok(Err(e)) => {
            error!("Job {} failed: {}", id, e);
            store.update(id, JobStatus::Failed, None, Some(e.to_string()));
        }
        Err(e) => {
            let reason = join_failure(e);
            error!("Job {} failed: {}", id, reason);
            store.update(id, JobStatus::Failed, None, Some(reason));
        }
    }
}

fn join_failure(e: JoinError) -> String {
    if !e.is_panic() {
        return "job task was cancelled".to_string();
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("job panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::codegen::{LlmArtifactWriter, LlmScriptWriter};
    use crate::frames::NoFrames;
    use crate::llm::MockLlmClient;
    use crate::refine::{ArtifactWorkspace, RefinementLoop};
    use crate::sandbox::{ExecutionOutput, MockSandbox};

    /// Sandbox whose renderer crashes the task it runs on
    struct CrashingSandbox;

    #[async_trait]
    impl ExecutionSandbox for CrashingSandbox {
        async fn execute(&self, _artifact: &Path) -> Result<ExecutionOutput> {
            panic!("renderer crashed");
        }
    }

    type TestDispatcher = Dispatcher<
        LlmArtifactWriter<MockLlmClient>,
        LlmArtifactWriter<MockLlmClient>,
        MockSandbox,
        NoFrames,
    >;

    fn dispatcher(dir: &TempDir, llm_texts: Vec<&str>) -> TestDispatcher {
        let writer = Arc::new(LlmArtifactWriter::new(MockLlmClient::with_texts(llm_texts)));
        let refinement = RefinementLoop::new(
            writer.clone(),
            writer,
            Arc::new(MockSandbox::new()),
            Arc::new(NoFrames),
            ArtifactWorkspace::new(dir.path()),
        );
        Dispatcher::new(Arc::new(JobStore::new()), PipelineOrchestrator::new(refinement), 2, 3)
    }

    fn completed_upstream(store: &JobStore, result: Value) -> JobId {
        let id = store.create();
        store.update(&id, JobStatus::Completed, Some(result), None);
        id
    }

    fn syllabus() -> Value {
        json!({"data": [
            {"chapter": "Limits", "animation": {"title": "Limits", "narration": "n"}},
            {"chapter": "Review"}
        ]})
    }

    #[tokio::test]
    async fn test_submit_unknown_upstream() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let err = dispatcher.submit("Math", &JobId::from("missing")).unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
        assert!(dispatcher.store().is_empty());
    }

    #[tokio::test]
    async fn test_submit_incomplete_upstream() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let upstream = dispatcher.store().create();

        let err = dispatcher.submit("Math", &upstream).unwrap_err();
        assert!(matches!(err, RenderError::InvalidState(_)));
        assert_eq!(dispatcher.store().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_empty_syllabus() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let upstream = completed_upstream(dispatcher.store(), json!({"data": []}));

        let err = dispatcher.submit("Math", &upstream).unwrap_err();
        assert!(err.to_string().contains("no syllabus data"));
    }

    #[tokio::test]
    async fn test_submit_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec!["```python\nfrom manim import *\n```"]);
        let upstream = completed_upstream(dispatcher.store(), syllabus());

        let submission = dispatcher.submit("Math", &upstream).unwrap();
        assert_eq!(submission.status, "queued");

        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());

        let results = job.result.unwrap();
        let results = results.as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["chapter"], "Limits");
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["iterations"], 1);
    }

    #[tokio::test]
    async fn test_generation_failure_fails_job() {
        let dir = TempDir::new().unwrap();
        // No scripted LLM responses: generation fails
        let dispatcher = dispatcher(&dir, vec![]);
        let upstream = completed_upstream(dispatcher.store(), syllabus());

        let submission = dispatcher.submit("Math", &upstream).unwrap();
        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert!(job.error.unwrap().starts_with("Generation failed"));
    }

    #[tokio::test]
    async fn test_status_unknown_job() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        assert!(matches!(
            dispatcher.status(&JobId::from("nope")),
            Err(RenderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_spawn_light_failure() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let submission = dispatcher.spawn_light(async { Err::<Value, _>(RenderError::InvalidState("bad pdf".to_string())) });

        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Invalid state: bad pdf"));
    }

    #[tokio::test]
    async fn test_panicking_pipeline_fails_job() {
        let dir = TempDir::new().unwrap();
        let writer = Arc::new(LlmArtifactWriter::new(MockLlmClient::with_texts(["```python\nv0\n```"])));
        let refinement = RefinementLoop::new(
            writer.clone(),
            writer,
            Arc::new(CrashingSandbox),
            Arc::new(NoFrames),
            ArtifactWorkspace::new(dir.path()),
        );
        let dispatcher = Dispatcher::new(Arc::new(JobStore::new()), PipelineOrchestrator::new(refinement), 1, 3);
        let upstream = completed_upstream(dispatcher.store(), syllabus());

        let submission = dispatcher.submit("Math", &upstream).unwrap();
        let job = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.wait(&submission.job_id, Duration::from_millis(5)),
        )
        .await
        .expect("job never reached a terminal state")
        .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.error.as_deref(), Some("job panicked: renderer crashed"));
    }

    #[tokio::test]
    async fn test_panicking_worker_releases_its_permit() {
        let dir = TempDir::new().unwrap();
        let writer = Arc::new(LlmArtifactWriter::new(MockLlmClient::with_texts([
            "```python\nv0\n```",
            "```python\nv1\n```",
        ])));
        let refinement = RefinementLoop::new(
            writer.clone(),
            writer,
            Arc::new(CrashingSandbox),
            Arc::new(NoFrames),
            ArtifactWorkspace::new(dir.path()),
        );
        let dispatcher = Dispatcher::new(Arc::new(JobStore::new()), PipelineOrchestrator::new(refinement), 1, 3);
        let upstream = completed_upstream(dispatcher.store(), syllabus());

        let first = dispatcher.submit("Math", &upstream).unwrap();
        let second = dispatcher.submit("Math", &upstream).unwrap();
        for submission in [first, second] {
            let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
            assert_eq!(job.status, JobStatus::Failed);
        }
    }

    #[tokio::test]
    async fn test_spawn_light_panic_fails_job() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let submission = dispatcher.spawn_light(async {
            let pages: Vec<Value> = Vec::new();
            Ok(pages[0].clone())
        });

        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().starts_with("job panicked: index out of bounds"));
    }

    #[tokio::test]
    async fn test_write_scripts_fills_missing_animation() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec!["```python\nfrom manim import *\n```"]);
        let upstream = completed_upstream(dispatcher.store(), syllabus());
        let scripts = Arc::new(LlmScriptWriter::new(MockLlmClient::with_texts([
            r#"```json
{"title": "Review", "narration": "Looking back", "visual_style": "chalkboard"}
```"#,
        ])));

        let submission = dispatcher.write_scripts("Math", &upstream, scripts.clone()).unwrap();
        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let result = job.result.unwrap();
        assert_eq!(result["data"][0]["animation"]["title"], "Limits");
        assert_eq!(result["data"][1]["animation"]["title"], "Review");
        assert_eq!(result["data"][1]["animation"]["visual_style"], "chalkboard");
        // Only the chapter without a script was sent to the LLM
        assert_eq!(scripts.client().requests().len(), 1);

        // Both chapters are now refinable
        let specs = specs_from_syllabus("Math", &result).unwrap();
        assert!(specs.iter().all(ArtifactSpec::is_refinable));
    }

    #[tokio::test]
    async fn test_write_scripts_llm_failure_fails_job() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let upstream = completed_upstream(dispatcher.store(), syllabus());
        let scripts = Arc::new(LlmScriptWriter::new(MockLlmClient::with_texts(["no json here"])));

        let submission = dispatcher.write_scripts("Math", &upstream, scripts).unwrap();
        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("malformed animation script"));
    }

    #[tokio::test]
    async fn test_write_scripts_validates_upstream() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let scripts = Arc::new(LlmScriptWriter::new(MockLlmClient::new()));

        let err = dispatcher
            .write_scripts("Math", &JobId::from("missing"), scripts.clone())
            .unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));

        let pending = dispatcher.store().create();
        let err = dispatcher.write_scripts("Math", &pending, scripts).unwrap_err();
        assert!(matches!(err, RenderError::InvalidState(_)));
        assert_eq!(dispatcher.store().len(), 1);
    }

    #[tokio::test]
    async fn test_import_syllabus_normalizes_shape() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("syllabus.json");
        std::fs::write(&file, r#"[{"chapter": "Limits", "unit_title": "Calculus"}]"#).unwrap();

        let dispatcher = dispatcher(&dir, vec![]);
        let submission = dispatcher.import_syllabus(&file);
        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        let result = job.result.unwrap();
        assert_eq!(result["data"][0]["chapter"], "Limits");
        assert_eq!(result["data"][0]["unit_title"], "Calculus");
    }

    #[tokio::test]
    async fn test_import_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, vec![]);
        let submission = dispatcher.import_syllabus(dir.path().join("missing.json"));
        let job = dispatcher.wait(&submission.job_id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().starts_with("IO error"));
    }
}
