use crate::constants::buffers::MAX_HTTP_BODY_BYTES;
use crate::constants::network::TIMEOUT_HTTP_REQUEST_MS;
use crate::errors::ToolError;
use crate::executors::{with_deadline, Executor};
use crate::model::{
    ApiKeyLocation, AuthSpec, ExecutionOutcome, ExecutorKind, HttpConfig, RequestSnapshot,
    ResponseSnapshot, ToolDescriptor,
};
use crate::services::binder::ParameterBinder;
use crate::services::logger::Logger;
use crate::services::secrets::SecretService;
use crate::utils::data_path::extract_path;
use crate::utils::redact::redact_headers;
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

struct PreparedRequest {
    method: reqwest::Method,
    url: String,
    headers: BTreeMap<String, String>,
    body: Option<String>,
    timeout_ms: u64,
}

/// Executes HTTP tools: binds parameters into the configured request,
/// applies auth, sends with a deadline and reads a capped body.
pub struct HttpExecutor {
    logger: Logger,
    binder: Arc<ParameterBinder>,
    secrets: Arc<SecretService>,
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(logger: &Logger, binder: Arc<ParameterBinder>, secrets: Arc<SecretService>) -> Self {
        Self {
            logger: logger.child("http"),
            binder,
            secrets,
            client: reqwest::Client::new(),
        }
    }

    fn config<'a>(&self, tool: &'a ToolDescriptor) -> Result<&'a HttpConfig, ToolError> {
        match &tool.config {
            crate::model::ExecutorConfig::Http(config) => Ok(config),
            _ => Err(ToolError::invalid_params(format!(
                "Tool is not an HTTP tool: {}",
                tool.name
            ))),
        }
    }

    fn prepare(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Result<PreparedRequest, ToolError> {
        let config = self.config(tool)?;
        let bound = self.binder.apply_defaults(tool, params);

        let mut url = self.binder.interpolate_url(&config.url, tool, &bound);
        url = self.binder.build_query(&url, tool, &bound);
        url::Url::parse(&url)
            .map_err(|err| ToolError::invalid_params(format!("Invalid URL: {err}")))?;

        let mut headers = config.headers.clone();
        headers.extend(self.binder.param_headers(tool, &bound));

        let body = if config.method.allows_body() {
            config
                .body_template
                .as_ref()
                .map(|template| self.binder.interpolate_body(template, &bound))
        } else {
            None
        };
        if body.is_some()
            && !headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case("content-type"))
        {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        self.apply_auth(&tool.auth, &mut url, &mut headers)?;

        let method = reqwest::Method::from_bytes(config.method.as_str().as_bytes())
            .map_err(|_| ToolError::invalid_params("Unsupported HTTP method"))?;

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body,
            timeout_ms: config.timeout_ms.unwrap_or(TIMEOUT_HTTP_REQUEST_MS),
        })
    }

    /// Credential strings are probed against the vault first and used
    /// literally on a miss.
    fn apply_auth(
        &self,
        auth: &AuthSpec,
        url: &mut String,
        headers: &mut BTreeMap<String, String>,
    ) -> Result<(), ToolError> {
        match auth {
            AuthSpec::None => {}
            AuthSpec::ApiKey {
                key,
                location,
                param_name,
            } => {
                let key = self.secrets.resolve_or_literal(key);
                match location {
                    ApiKeyLocation::Header => {
                        headers.insert(param_name.clone(), key);
                    }
                    ApiKeyLocation::Query => {
                        let separator = if url.contains('?') { '&' } else { '?' };
                        let pair = serde_urlencoded::to_string(&[(param_name.as_str(), key.as_str())][..])
                            .map_err(|err| ToolError::internal(err.to_string()))?;
                        url.push(separator);
                        url.push_str(&pair);
                    }
                }
            }
            AuthSpec::Bearer { token } => {
                let token = self.secrets.resolve_or_literal(token);
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            AuthSpec::Basic { username, password } => {
                let username = self.secrets.resolve_or_literal(username);
                let password = self.secrets.resolve_or_literal(password);
                let engine = base64::engine::general_purpose::STANDARD;
                let encoded = engine.encode(format!("{username}:{password}"));
                headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
            }
            AuthSpec::Oauth2 => {
                return Err(ToolError::invalid_params(
                    "OAuth2 authentication is not supported",
                )
                .with_hint("Use an API key, bearer token, or basic auth instead."));
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        prepared: &PreparedRequest,
    ) -> Result<(u16, BTreeMap<String, String>, String), ToolError> {
        let mut request = self
            .client
            .request(prepared.method.clone(), &prepared.url);
        for (name, value) in &prepared.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &prepared.body {
            request = request.body(body.clone());
        }

        let response = with_deadline(prepared.timeout_ms, request.send())
            .await
            .ok_or_else(|| {
                ToolError::timeout(format!(
                    "Request timed out after {} ms",
                    prepared.timeout_ms
                ))
            })?
            .map_err(|err| ToolError::retryable(format!("Request failed: {err}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|err| ToolError::retryable(format!("Body read failed: {err}")))?;
            if buf.len() + chunk.len() > MAX_HTTP_BODY_BYTES {
                buf.extend_from_slice(&chunk[..MAX_HTTP_BODY_BYTES - buf.len()]);
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        Ok((status, headers, String::from_utf8_lossy(&buf).to_string()))
    }

    fn status_error(status: u16, body: &str) -> ToolError {
        let details = json!({ "status": status, "body": body });
        let err = if status == 401 || status == 403 {
            ToolError::denied(format!("HTTP {status}"))
                .with_hint("Check the tool's auth configuration.")
        } else if status == 404 {
            ToolError::not_found(format!("HTTP {status}"))
        } else if status == 429 || status >= 500 {
            ToolError::retryable(format!("HTTP {status}"))
        } else {
            ToolError::invalid_params(format!("HTTP {status}"))
        };
        err.with_details(details)
    }

    fn parse_body(body: &str) -> Value {
        serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let config = self.config(tool)?;
        let response_path = config.response_path.clone();
        let prepared = self.prepare(tool, params)?;
        let started = Instant::now();

        self.logger.debug(
            "Executing HTTP tool",
            Some(&json!({ "tool": tool.name, "method": prepared.method.as_str() })),
        );

        let (status, _headers, body) = self.send(&prepared).await.map_err(|err| {
            self.logger.warn(
                "HTTP tool failed",
                Some(&json!({
                    "tool": tool.name,
                    "error": err.to_string(),
                    "duration_ms": started.elapsed().as_millis() as u64,
                })),
            );
            err
        })?;

        if !(200..300).contains(&status) {
            return Err(Self::status_error(status, &body));
        }

        let parsed = Self::parse_body(&body);
        match &response_path {
            Some(path) => Ok(extract_path(&parsed, path)),
            None => Ok(parsed),
        }
    }

    async fn test(&self, tool: &ToolDescriptor, params: &Map<String, Value>) -> ExecutionOutcome {
        let started = Instant::now();
        let prepared = match self.prepare(tool, params) {
            Ok(prepared) => prepared,
            Err(err) => {
                return ExecutionOutcome {
                    success: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    kind: ExecutorKind::Http,
                    request: None,
                    response: None,
                    command: None,
                    output: None,
                    result: None,
                    error: Some(err.to_string()),
                }
            }
        };

        let request = RequestSnapshot {
            method: prepared.method.to_string(),
            url: prepared.url.clone(),
            headers: redact_headers(&prepared.headers),
            body: prepared.body.as_deref().map(Self::parse_body),
        };

        match self.send(&prepared).await {
            Ok((status, headers, body)) => ExecutionOutcome {
                success: (200..300).contains(&status),
                duration_ms: started.elapsed().as_millis() as u64,
                kind: ExecutorKind::Http,
                request: Some(request),
                response: Some(ResponseSnapshot {
                    status,
                    headers,
                    body: Self::parse_body(&body),
                }),
                command: None,
                output: None,
                result: None,
                error: if (200..300).contains(&status) {
                    None
                } else {
                    Some(format!("HTTP {status}"))
                },
            },
            Err(err) => ExecutionOutcome {
                success: false,
                duration_ms: started.elapsed().as_millis() as u64,
                kind: ExecutorKind::Http,
                request: Some(request),
                response: Some(ResponseSnapshot {
                    status: 0,
                    headers: BTreeMap::new(),
                    body: Value::Null,
                }),
                command: None,
                output: None,
                result: None,
                error: Some(err.to_string()),
            },
        }
    }
}
