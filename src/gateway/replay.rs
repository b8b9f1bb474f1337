//! Recorded-output gateway.
//!
//! Serves previously captured stdout keyed by the exact command line and keeps
//! a log of every command it was asked to run, so tests can assert both the
//! parsed result and the executed sequence.

use super::{CommandGateway, GatewayError, GatewayRequest, GatewayResponse, StepOutput};
use crate::docker::{SearchPath, Target};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// One step the replay gateway was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub target: Target,
    pub command: String,
    pub search_path: SearchPath,
    pub timeout: Option<Duration>,
    /// Credential placeholder keys attached to the step
    pub credential_keys: Vec<String>,
}

/// Gateway answering from recorded transcripts.
///
/// Each command owns a queue of transcripts consumed in order; the last one is
/// sticky and answers every further call. A transcript with several segments
/// models a step that answered a prompt.
#[derive(Debug, Default)]
pub struct ReplayGateway {
    recordings: Mutex<HashMap<String, VecDeque<Vec<String>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ReplayGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load recordings from a JSON object mapping commands to stdout lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path)?;
        let recordings: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| GatewayError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let gateway = Self::new();
        for (command, outputs) in recordings {
            for stdout in outputs {
                gateway.record(&command, vec![stdout]);
            }
        }
        Ok(gateway)
    }

    /// Queue a single-segment transcript for `command`.
    pub fn with_response(self, command: impl AsRef<str>, stdout: impl Into<String>) -> Self {
        self.record(command.as_ref(), vec![stdout.into()]);
        self
    }

    /// Queue a multi-segment transcript for `command`.
    pub fn with_transcript<I, S>(self, command: impl AsRef<str>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(command.as_ref(), segments.into_iter().map(Into::into).collect());
        self
    }

    pub fn record(&self, command: &str, segments: Vec<String>) {
        lock(&self.recordings)
            .entry(command.to_string())
            .or_default()
            .push_back(segments);
    }

    /// Every step executed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Command lines executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|call| call.command.clone()).collect()
    }

    fn next_transcript(&self, command: &str) -> Option<Vec<String>> {
        let mut recordings = lock(&self.recordings);
        let queue = recordings.get_mut(command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CommandGateway for ReplayGateway {
    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let mut response = GatewayResponse::default();

        for step in &request.steps {
            debug!("Replaying step: {}", step.command);
            lock(&self.calls).push(RecordedCall {
                target: request.target.clone(),
                command: step.command.clone(),
                search_path: request.options.search_path.clone(),
                timeout: request.options.timeout,
                credential_keys: step.credentials.keys().cloned().collect(),
            });

            let segments = self
                .next_transcript(&step.command)
                .ok_or_else(|| GatewayError::NoRecording(step.command.clone()))?;

            let output: String = segments.concat();
            if let Some(matched) = step.failure_in(&output) {
                return Err(GatewayError::StepFailed {
                    command: step.command.clone(),
                    matched: matched.to_string(),
                    output,
                });
            }
            step.extract_into(&output, &mut response.extracted)?;
            response
                .steps
                .extend(segments.into_iter().map(|stdout| StepOutput {
                    command: step.command.clone(),
                    stdout,
                }));
        }

        Ok(response)
    }

    fn gateway_type(&self) -> &'static str {
        "replay"
    }
}
