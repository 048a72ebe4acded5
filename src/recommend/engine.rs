use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::RecommenderConfig;

/// The recommendation engine as seen by the HTTP layer: a title in, a JSON
/// value out. The payload is opaque to the gateway.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, anime: &str) -> Result<Value, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to run recommendation script: {0}")]
    Invocation(String),
    #[error("recommendation script wrote to stderr: {0}")]
    Diagnostic(String),
    #[error("recommendation script produced invalid JSON: {0}")]
    OutputFormat(String),
}

/// Runs the recommendation script as a child process, one invocation per
/// request. A semaphore caps how many scripts run at once; requests over
/// the cap wait for a slot instead of failing.
pub struct ScriptEngine {
    interpreter: String,
    script: String,
    timeout: Option<Duration>,
    running: Semaphore,
}

impl ScriptEngine {
    pub fn new(config: &RecommenderConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: config.script.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
            running: Semaphore::new(config.max_concurrent),
        }
    }
}

#[async_trait]
impl Recommender for ScriptEngine {
    async fn recommend(&self, anime: &str) -> Result<Value, EngineError> {
        let _permit = self
            .running
            .acquire()
            .await
            .map_err(|e| EngineError::Invocation(e.to_string()))?;

        debug!(anime = %anime, script = %self.script, "invoking recommendation script");

        // The title goes through as a single argv entry, never via a shell.
        let child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(anime)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Invocation(e.to_string()))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    EngineError::Invocation(format!(
                        "script did not finish within {}s",
                        limit.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| EngineError::Invocation(e.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::Invocation(format!(
                "script exited with {}",
                output.status
            )));
        }

        // Anything on stderr fails the request, even on a clean exit.
        if !output.stderr.is_empty() {
            return Err(EngineError::Diagnostic(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::OutputFormat(e.to_string()))
    }
}
