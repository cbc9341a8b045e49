//! Typed descriptors for operator-defined tools and the normalized
//! execution records they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Http,
    Cli,
}

impl ExecutorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorKind::Http => "http",
            ExecutorKind::Cli => "cli",
        }
    }
}

/// Executor configuration. The tag doubles as the executor kind, so a
/// descriptor can never carry a config variant that disagrees with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutorConfig {
    Http(HttpConfig),
    Cli(CliConfig),
}

impl ExecutorConfig {
    pub fn kind(&self) -> ExecutorKind {
        match self {
            ExecutorConfig::Http(_) => ExecutorKind::Http,
            ExecutorConfig::Cli(_) => ExecutorKind::Cli,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "DELETE")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Only POST/PUT/PATCH carry a templated body.
    pub fn allows_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Command template with `{param}` placeholders, e.g. `ls -la {path}`.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Run through `sh -c` (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<bool>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CliConfig {
    pub fn use_shell(&self) -> bool {
        self.shell.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Path,
    Body,
    Header,
    Argument,
    Env,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub location: ParamLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// Authentication for HTTP tools. Credential fields hold secret
/// references (or literals), never stored plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSpec {
    #[default]
    None,
    ApiKey {
        key: String,
        location: ApiKeyLocation,
        param_name: String,
    },
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    /// Parsed but rejected at execution time.
    Oauth2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub config: ExecutorConfig,
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub auth: AuthSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolDescriptor {
    pub fn kind(&self) -> ExecutorKind {
        self.config.kind()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSnapshot {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Masked view: secret-backed values never appear here.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(default)]
    pub truncated: bool,
}

/// One normalized record per invocation, shared between the interactive
/// tester and live protocol calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub duration_ms: u64,
    pub kind: ExecutorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CommandOutput>,
    /// Raw extracted value for live invocations, where no channel
    /// snapshot is captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn live_success(kind: ExecutorKind, duration_ms: u64, result: Value) -> Self {
        Self {
            success: true,
            duration_ms,
            kind,
            request: None,
            response: None,
            command: None,
            output: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn live_failure(kind: ExecutorKind, duration_ms: u64, error: String) -> Self {
        Self {
            success: false,
            duration_ms,
            kind,
            request: None,
            response: None,
            command: None,
            output: None,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Test,
    Live,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::Test => "test",
            LogSource::Live => "live",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogRecord {
    pub id: String,
    pub tool_id: String,
    pub tool_name: String,
    pub kind: ExecutorKind,
    pub source: LogSource,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    pub request: Value,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionLogRecord {
    /// Flattens an outcome into a sink record; the request/response
    /// columns take whichever channel payload the executor produced.
    pub fn from_outcome(tool: &ToolDescriptor, source: LogSource, outcome: &ExecutionOutcome) -> Self {
        let request = outcome
            .command
            .as_ref()
            .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
            .or_else(|| {
                outcome
                    .request
                    .as_ref()
                    .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            })
            .unwrap_or(Value::Null);
        let response = outcome
            .output
            .as_ref()
            .map(|o| serde_json::to_value(o).unwrap_or(Value::Null))
            .or_else(|| {
                outcome
                    .response
                    .as_ref()
                    .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            })
            .or_else(|| outcome.result.clone())
            .unwrap_or(Value::Null);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_id: tool.id.clone(),
            tool_name: tool.name.clone(),
            kind: outcome.kind,
            source,
            timestamp: Utc::now(),
            success: outcome.success,
            duration_ms: outcome.duration_ms,
            request,
            response,
            error: outcome.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_config_tag_matches_kind() {
        let raw = r#"{"kind":"cli","command":"echo hi"}"#;
        let parsed: ExecutorConfig = serde_json::from_str(raw).expect("must parse");
        assert_eq!(parsed.kind(), ExecutorKind::Cli);
    }

    #[test]
    fn parameter_spec_defaults_type_to_string() {
        let raw = r#"{"name":"city","location":"query"}"#;
        let parsed: ParameterSpec = serde_json::from_str(raw).expect("must parse");
        assert_eq!(parsed.kind, ParamType::String);
        assert!(!parsed.required);
    }

    #[test]
    fn auth_spec_defaults_to_none() {
        let raw = r#"{"type":"none"}"#;
        let parsed: AuthSpec = serde_json::from_str(raw).expect("must parse");
        assert!(matches!(parsed, AuthSpec::None));
    }
}
