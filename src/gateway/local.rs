//! Local host gateway.
//!
//! Runs each step through a shell using `tokio::process::Command`, with the
//! search path prepended to `PATH`. Credential placeholders are rewritten into
//! references to per-step environment variables so secrets never appear in the
//! process list.

use super::{
    CommandGateway, ExecutionOptions, ExecutionStep, GatewayError, GatewayRequest,
    GatewayResponse, StepOutput,
};
use crate::env::DEFAULT_SHELL;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

const SECRET_ENV_PREFIX: &str = "DOCKHAND_SECRET_";

/// Executes steps on the local host.
///
/// When a step expects a prompt its stdin stays open until the prompt is
/// answered; a command waiting on stdin otherwise runs until the timeout.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    shell: String,
}

impl LocalGateway {
    /// Create a gateway using the default shell
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    /// Create a gateway using a specific shell binary
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Check that the shell binary resolves.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when the shell is not on `PATH`.
    pub fn health_check(&self) -> Result<(), GatewayError> {
        which::which(&self.shell)
            .map(|_| ())
            .map_err(|e| GatewayError::Unavailable(format!("shell {} not found: {}", self.shell, e)))
    }

    async fn run_step(
        &self,
        step: &ExecutionStep,
        options: &ExecutionOptions,
        path: &str,
    ) -> Result<Vec<StepOutput>, GatewayError> {
        debug!("Executing step on local host: {}", step.command);

        let (command, secrets) = mask_credentials(&step.command, &step.credentials);
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&command)
            .env("PATH", path)
            .envs(secrets)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().filter(|_| step.prompt.is_some());
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx.clone()));
        }
        drop(tx);

        let mut segments = Vec::new();
        let mut transcript = String::new();
        let mut terminated = false;
        while let Some(chunk) = rx.recv().await {
            transcript.push_str(&String::from_utf8_lossy(&chunk));

            if let Some(prompt) = &step.prompt {
                if stdin.is_some() && transcript.contains(&prompt.expected) {
                    if let Some(mut input) = stdin.take() {
                        let secret = step
                            .credentials
                            .get(&prompt.credential_key)
                            .map(String::as_str)
                            .unwrap_or_default();
                        input.write_all(secret.as_bytes()).await?;
                        input.write_all(b"\n").await?;
                        input.flush().await?;
                    }
                    debug!("Answered prompt {:?}", prompt.expected);
                    segments.push(StepOutput {
                        command: step.command.clone(),
                        stdout: std::mem::take(&mut transcript),
                    });
                }
            }

            if options
                .terminators
                .iter()
                .any(|terminator| !terminator.is_empty() && transcript.contains(terminator))
            {
                terminated = true;
                break;
            }
        }
        drop(stdin);

        if terminated {
            child.kill().await?;
        } else {
            child.wait().await?;
        }

        segments.push(StepOutput {
            command: step.command.clone(),
            stdout: transcript,
        });
        Ok(segments)
    }
}

impl Default for LocalGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandGateway for LocalGateway {
    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        if !is_local(&request.target.url) {
            return Err(GatewayError::Unavailable(format!(
                "local gateway cannot reach {}",
                request.target.url
            )));
        }

        let path = request
            .options
            .search_path
            .prepend_to(&std::env::var("PATH").unwrap_or_default());
        let mut response = GatewayResponse::default();

        for step in &request.steps {
            let run = self.run_step(step, &request.options, &path);
            let segments = match request.options.timeout {
                Some(timeout) => tokio::time::timeout(timeout, run)
                    .await
                    .map_err(|_| GatewayError::Timeout(timeout))??,
                None => run.await?,
            };

            let output: String = segments.iter().map(|segment| segment.stdout.as_str()).collect();
            if let Some(matched) = step.failure_in(&output) {
                return Err(GatewayError::StepFailed {
                    command: step.command.clone(),
                    matched: matched.to_string(),
                    output,
                });
            }
            step.extract_into(&output, &mut response.extracted)?;
            response.steps.extend(segments);
        }

        Ok(response)
    }

    fn gateway_type(&self) -> &'static str {
        "local"
    }
}

fn is_local(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url.starts_with("local://") || url.starts_with("file://")
}

async fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Replace credential placeholders with references to environment variables.
///
/// Longer placeholders win over shorter ones they contain. The reference is
/// quoted to match the quoting context it lands in.
fn mask_credentials(
    command: &str,
    credentials: &BTreeMap<String, String>,
) -> (String, Vec<(String, String)>) {
    let mut keys: Vec<&String> = credentials
        .keys()
        .filter(|key| !key.is_empty() && command.contains(key.as_str()))
        .collect();
    if keys.is_empty() {
        return (command.to_string(), Vec::new());
    }
    keys.sort_by_key(|key| std::cmp::Reverse(key.len()));

    let secrets: Vec<(String, String)> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| (format!("{SECRET_ENV_PREFIX}{i}"), credentials[*key].clone()))
        .collect();

    let mut masked = String::with_capacity(command.len());
    let mut quote: Option<char> = None;
    let mut rest = command;
    'scan: while let Some(ch) = rest.chars().next() {
        for (key, (var, _)) in keys.iter().zip(&secrets) {
            if rest.starts_with(key.as_str()) {
                match quote {
                    Some('\'') => masked.push_str(&format!("'\"${{{var}}}\"'")),
                    Some(_) => masked.push_str(&format!("${{{var}}}")),
                    None => masked.push_str(&format!("\"${{{var}}}\"")),
                }
                rest = &rest[key.len()..];
                continue 'scan;
            }
        }
        match quote {
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            Some(open) if open == ch => quote = None,
            _ => {}
        }
        masked.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    (masked, secrets)
}
