//! Scripted sandbox for tests and dry runs.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{ExecutionOutput, ExecutionSandbox};
use crate::error::Result;

/// Sandbox that replays queued outputs, then repeats a fallback.
///
/// Records the source of every artifact it is asked to run and the peak
/// number of executions in flight at once.
#[derive(Debug)]
pub struct MockSandbox {
    outcomes: Mutex<VecDeque<ExecutionOutput>>,
    fallback: ExecutionOutput,
    executed: Mutex<Vec<String>>,
    delay: Option<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::always(ExecutionOutput::success(""))
    }
}

impl MockSandbox {
    /// Sandbox where every execution succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Sandbox that returns `output` for every execution
    pub fn always(output: ExecutionOutput) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: output,
            executed: Mutex::new(Vec::new()),
            delay: None,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Queue outputs to return before falling back
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = ExecutionOutput>) -> Self {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner()).extend(outcomes);
        self
    }

    /// Hold every execution for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, output: ExecutionOutput) {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner()).push_back(output);
    }

    /// Source of each executed artifact, in execution order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most executions observed running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionSandbox for MockSandbox {
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let code = tokio::fs::read_to_string(artifact).await.unwrap_or_default();
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).push(code);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let output = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(output)
    }

    fn description(&self) -> &str {
        "mock sandbox"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_replays_then_falls_back() {
        let sandbox = MockSandbox::always(ExecutionOutput::failure("boom", 1))
            .with_outcomes([ExecutionOutput::success("first")]);

        let a = sandbox.execute(Path::new("/nonexistent.py")).await.unwrap();
        let b = sandbox.execute(Path::new("/nonexistent.py")).await.unwrap();
        assert_eq!(a.stdout, "first");
        assert_eq!(b.stderr, "boom");
        assert_eq!(sandbox.executed(), vec!["", ""]);
    }

    #[tokio::test]
    async fn test_records_artifact_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.py");
        std::fs::write(&path, "from manim import *").unwrap();

        let sandbox = MockSandbox::new();
        assert!(sandbox.execute(&path).await.unwrap().is_success());
        assert_eq!(sandbox.executed(), vec!["from manim import *"]);
        assert_eq!(sandbox.peak_concurrency(), 1);
        assert_eq!(sandbox.description(), "mock sandbox");
    }
}
