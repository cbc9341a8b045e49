pub mod cli;
pub mod http;

use crate::errors::ToolError;
use crate::model::{ExecutionOutcome, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

pub use cli::CliExecutor;
pub use http::HttpExecutor;

/// Channel-specific execution. `execute` returns the extracted result
/// or an error; `test` never errors, it reports the full exchange as an
/// outcome instead.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        tool: &ToolDescriptor,
        params: &Map<String, Value>,
    ) -> Result<Value, ToolError>;

    async fn test(&self, tool: &ToolDescriptor, params: &Map<String, Value>) -> ExecutionOutcome;
}

/// Runs `fut` under a deadline. `None` means the deadline fired.
pub async fn with_deadline<T>(timeout_ms: u64, fut: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
        .await
        .ok()
}
