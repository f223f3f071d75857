//! Boundary to the external browser-automation agent.
//!
//! The agent is an LLM-driven browser session owned by another program. This
//! crate only hands it a natural-language task plus the required output
//! schema and collects its final answer.
//!
//! [`ProcessAgent`] runs one agent process per task and talks json over
//! stdio:
//!
//! - stdin: one `{"task", "start_url", "output_schema", "model", "headless"}`
//!   object
//! - stdout: any log output, ending with a `{"final_result", "error"}` line

use crate::{AgentError, settings::AgentSettings};
use async_trait::async_trait;
use mockall::automock;
use schemars::schema::RootSchema;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, process::Stdio, time::Duration};
use tokio::{io::AsyncWriteExt, process::Command, time::timeout};
use tracing::{debug, info, warn};
use url::Url;

// Longest stderr/stdout excerpt carried in an error.
const OUTPUT_TAIL_CHARS: usize = 2_000;

/// A single browsing task handed to the agent.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub task: String,
    pub start_url: Url,
    pub output_schema: RootSchema,
}

#[automock]
#[async_trait]
pub trait BrowsingAgent: Send + Sync {
    /// Run the task to completion and return the agent's final result, if it
    /// produced one.
    async fn run(&self, task: &AgentTask) -> Result<Option<String>, AgentError>;
}

#[derive(Serialize)]
struct AgentRequest<'a> {
    task: &'a str,
    start_url: &'a str,
    output_schema: &'a RootSchema,
    model: &'a str,
    headless: bool,
}

#[derive(Debug, Deserialize)]
struct AgentEnvelope {
    #[serde(default)]
    final_result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Runs each task in a fresh child process of the configured command.
pub struct ProcessAgent {
    command: String,
    args: Vec<String>,
    model: String,
    headless: bool,
    timeout: Duration,
}

impl ProcessAgent {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            model: settings.model.clone(),
            headless: settings.headless,
            timeout: settings.timeout(),
        }
    }

    async fn run_process(&self, task: &AgentTask) -> Result<Option<String>, AgentError> {
        let mut request = serde_json::to_vec(&AgentRequest {
            task: &task.task,
            start_url: task.start_url.as_str(),
            output_schema: &task.output_schema,
            model: &self.model,
            headless: self.headless,
        })?;
        request.push(b'\n');

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so the browser processes the agent starts can be killed with it.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| AgentError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let _group = ProcessGroup(child.id());

        info!(command = %self.command, pid = ?child.id(), url = %task.start_url, "agent started");

        if let Some(mut stdin) = child.stdin.take() {
            // The agent may exit without reading its request.
            match stdin.write_all(&request).await {
                Err(err) if err.kind() != ErrorKind::BrokenPipe => return Err(err.into()),
                _ => {}
            }
        }

        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "agent stderr");
        }

        if !output.status.success() {
            return Err(AgentError::Exited {
                status: output.status,
                stderr: tail(stderr.trim(), OUTPUT_TAIL_CHARS),
            });
        }

        parse_envelope(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl BrowsingAgent for ProcessAgent {
    async fn run(&self, task: &AgentTask) -> Result<Option<String>, AgentError> {
        // Dropping the timed out future kills the child and its process group.
        timeout(self.timeout, self.run_process(task))
            .await
            .map_err(|_| AgentError::Timeout(self.timeout))?
    }
}

/// Kills the agent's whole process group when the run ends, finished or not.
#[cfg_attr(not(unix), allow(dead_code))]
struct ProcessGroup(Option<u32>);

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.0.and_then(|pid| i32::try_from(pid).ok()) {
            use nix::{
                sys::signal::{Signal, killpg},
                unistd::Pid,
            };

            // ESRCH once every member has exited
            if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                if err != nix::errno::Errno::ESRCH {
                    warn!(pid, %err, "failed to kill agent process group");
                }
            }
        }
    }
}

/// Pick the agent's answer out of its stdout.
///
/// The last line holding a json object is the envelope. A structured
/// `final_result` is passed on re-serialized so callers always parse text.
fn parse_envelope(stdout: &str) -> Result<Option<String>, AgentError> {
    let envelope = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<AgentEnvelope>(line).ok())
        .ok_or_else(|| AgentError::Envelope(tail(stdout.trim(), OUTPUT_TAIL_CHARS)))?;

    if let Some(error) = envelope.error {
        return Err(AgentError::Reported(error));
    }

    Ok(match envelope.final_result {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) if text.trim().is_empty() => None,
        serde_json::Value::String(text) => Some(text),
        structured => Some(structured.to_string()),
    })
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(count - max_chars).collect();
    format!("...{skipped}")
}
