use crate::constants::buffers::{MAX_CLI_OUTPUT_BYTES, READ_CHUNK_BYTES};
use crate::constants::network::TIMEOUT_CLI_EXEC_MS;
use crate::errors::ToolError;
use crate::executors::{with_deadline, Executor};
use crate::model::{
    CliConfig, CommandOutput, CommandSnapshot, ExecutionOutcome, ExecutorKind, ToolDescriptor,
};
use crate::services::binder::ParameterBinder;
use crate::services::logger::Logger;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;

struct PreparedCommand {
    raw: String,
    working_dir: Option<String>,
    env: BTreeMap<String, String>,
    masked_env: BTreeMap<String, String>,
    use_shell: bool,
    timeout_ms: u64,
}

struct RunResult {
    stdout: String,
    stderr: String,
    exit_code: i32,
    truncated: bool,
    timed_out: bool,
}

/// Executes CLI tools: binds parameters into the command template with
/// shell escaping, spawns the process and collects capped output under
/// a deadline.
pub struct CliExecutor {
    logger: Logger,
    binder: Arc<ParameterBinder>,
}

impl CliExecutor {
    pub fn new(logger: &Logger, binder: Arc<ParameterBinder>) -> Self {
        Self {
            logger: logger.child("cli"),
            binder,
        }
    }

    fn config<'a>(&self, tool: &'a ToolDescriptor) -> Result<&'a CliConfig, ToolError> {
        match &tool.config {
            crate::model::ExecutorConfig::Cli(config) => Ok(config),
            _ => Err(ToolError::invalid_params(format!(
                "Tool is not a CLI tool: {}",
                tool.name
            ))),
        }
    }

    fn prepare(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Result<PreparedCommand, ToolError> {
        let config = self.config(tool)?;
        let bound = self.binder.apply_defaults(tool, params);
        let raw = self.binder.interpolate_command(&config.command, &bound);

        let (mut env, mut masked_env) = self.binder.resolve_env(&config.env);
        let (param_env, param_masked) = self.binder.param_env(tool, &bound);
        env.extend(param_env);
        masked_env.extend(param_masked);

        Ok(PreparedCommand {
            raw,
            working_dir: config.working_dir.clone(),
            env,
            masked_env,
            use_shell: config.use_shell(),
            timeout_ms: config.timeout_ms.unwrap_or(TIMEOUT_CLI_EXEC_MS),
        })
    }

    async fn run(&self, prepared: &PreparedCommand) -> Result<RunResult, ToolError> {
        let mut cmd = if prepared.use_shell {
            let mut cmd = tokio::process::Command::new("sh");
            cmd.arg("-c").arg(&prepared.raw);
            cmd
        } else {
            let mut parts = prepared.raw.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| ToolError::invalid_params("Command is empty"))?;
            let mut cmd = tokio::process::Command::new(program);
            cmd.args(parts);
            cmd
        };

        if let Some(dir) = &prepared.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&prepared.env);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| ToolError::internal(format!("Failed to spawn command: {}", err)))?;

        let mut stdout_reader = child.stdout.take();
        let mut stderr_reader = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut out: Vec<u8> = Vec::new();
            let mut truncated = false;
            if let Some(mut reader) = stdout_reader.take() {
                let mut buf = [0u8; READ_CHUNK_BYTES];
                loop {
                    let n = match reader.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(_) => break,
                    };
                    if out.len() < MAX_CLI_OUTPUT_BYTES {
                        let remaining = MAX_CLI_OUTPUT_BYTES - out.len();
                        if n <= remaining {
                            out.extend_from_slice(&buf[..n]);
                        } else {
                            out.extend_from_slice(&buf[..remaining]);
                            truncated = true;
                        }
                    } else {
                        truncated = true;
                    }
                }
            }
            (out, truncated)
        });

        let stderr_task = tokio::spawn(async move {
            let mut out: Vec<u8> = Vec::new();
            let mut truncated = false;
            if let Some(mut reader) = stderr_reader.take() {
                let mut buf = [0u8; READ_CHUNK_BYTES];
                loop {
                    let n = match reader.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(_) => break,
                    };
                    if out.len() < MAX_CLI_OUTPUT_BYTES {
                        let remaining = MAX_CLI_OUTPUT_BYTES - out.len();
                        if n <= remaining {
                            out.extend_from_slice(&buf[..n]);
                        } else {
                            out.extend_from_slice(&buf[..remaining]);
                            truncated = true;
                        }
                    } else {
                        truncated = true;
                    }
                }
            }
            (out, truncated)
        });

        let mut timed_out = false;
        let status = match with_deadline(prepared.timeout_ms, child.wait()).await {
            Some(result) => result,
            None => {
                timed_out = true;
                let _ = child.kill().await;
                child.wait().await
            }
        };
        let status = status
            .map_err(|err| ToolError::internal(format!("Failed to wait for process: {}", err)))?;

        let (stdout_buf, stdout_truncated) = stdout_task.await.unwrap_or((Vec::new(), false));
        let (stderr_buf, stderr_truncated) = stderr_task.await.unwrap_or((Vec::new(), false));

        Ok(RunResult {
            stdout: String::from_utf8_lossy(&stdout_buf).to_string(),
            stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
            exit_code: status.code().unwrap_or(-1),
            truncated: stdout_truncated || stderr_truncated,
            timed_out,
        })
    }
}

#[async_trait]
impl Executor for CliExecutor {
    async fn execute(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let prepared = self.prepare(tool, params)?;
        let started = Instant::now();

        self.logger.debug(
            "Executing CLI tool",
            Some(&json!({ "tool": tool.name })),
        );

        let run = self.run(&prepared).await?;
        let elapsed = started.elapsed().as_millis() as u64;

        if run.timed_out {
            return Err(ToolError::timeout(format!(
                "Command timed out after {} ms",
                elapsed
            )));
        }
        if run.exit_code != 0 {
            return Err(ToolError::internal(format!(
                "Command exited with code {}",
                run.exit_code
            ))
            .with_details(json!({
                "exit_code": run.exit_code,
                "stderr": run.stderr,
                "duration_ms": elapsed,
            })));
        }

        let trimmed = run.stdout.trim();
        Ok(serde_json::from_str(trimmed)
            .unwrap_or_else(|_| Value::String(trimmed.to_string())))
    }

    async fn test(&self, tool: &ToolDescriptor, params: &Map<String, Value>) -> ExecutionOutcome {
        let started = Instant::now();
        let prepared = match self.prepare(tool, params) {
            Ok(prepared) => prepared,
            Err(err) => {
                return ExecutionOutcome {
                    success: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    kind: ExecutorKind::Cli,
                    request: None,
                    response: None,
                    command: None,
                    output: None,
                    result: None,
                    error: Some(err.to_string()),
                }
            }
        };

        let command = CommandSnapshot {
            raw: prepared.raw.clone(),
            working_dir: prepared.working_dir.clone(),
            env: prepared.masked_env.clone(),
        };

        match self.run(&prepared).await {
            Ok(run) => {
                let success = !run.timed_out && run.exit_code == 0;
                let error = if run.timed_out {
                    Some(format!("Command timed out after {} ms", prepared.timeout_ms))
                } else if run.exit_code != 0 {
                    Some(format!("Command exited with code {}", run.exit_code))
                } else {
                    None
                };
                ExecutionOutcome {
                    success,
                    duration_ms: started.elapsed().as_millis() as u64,
                    kind: ExecutorKind::Cli,
                    request: None,
                    response: None,
                    command: Some(command),
                    output: Some(CommandOutput {
                        stdout: run.stdout,
                        stderr: run.stderr,
                        exit_code: run.exit_code,
                        truncated: run.truncated,
                    }),
                    result: None,
                    error,
                }
            }
            Err(err) => ExecutionOutcome {
                success: false,
                duration_ms: started.elapsed().as_millis() as u64,
                kind: ExecutorKind::Cli,
                request: None,
                response: None,
                command: Some(command),
                output: None,
                result: None,
                error: Some(err.to_string()),
            },
        }
    }
}
