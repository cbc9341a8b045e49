use crate::errors::ToolError;
use crate::executors::Executor;
use crate::model::{
    ExecutionLogRecord, ExecutionOutcome, ExecutorKind, LogSource, ToolDescriptor,
};
use crate::services::logger::Logger;
use crate::stores::{DescriptorStore, LogStore};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Routes invocations to the executor registered for the tool's kind
/// and records every attempt in the execution log.
pub struct ExecutionCoordinator {
    logger: Logger,
    descriptors: Arc<DescriptorStore>,
    logs: Arc<LogStore>,
    executors: HashMap<ExecutorKind, Arc<dyn Executor>>,
}

impl ExecutionCoordinator {
    pub fn new(logger: &Logger, descriptors: Arc<DescriptorStore>, logs: Arc<LogStore>) -> Self {
        Self {
            logger: logger.child("coordinator"),
            descriptors,
            logs,
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: ExecutorKind, executor: Arc<dyn Executor>) {
        self.executors.insert(kind, executor);
    }

    fn lookup(&self, id: &str) -> Result<ToolDescriptor, ToolError> {
        self.descriptors
            .get(id)?
            .ok_or_else(|| ToolError::not_found(format!("Tool not found: {id}")))
    }

    fn executor_for(&self, kind: ExecutorKind) -> Result<Arc<dyn Executor>, ToolError> {
        self.executors.get(&kind).cloned().ok_or_else(|| {
            ToolError::invalid_params(format!("No executor registered for kind: {}", kind.as_str()))
        })
    }

    /// Interactive dry run. Captures the full exchange without turning
    /// failures into errors.
    pub async fn test(
        &self,
        id: &str,
        params: &Map<String, Value>,
    ) -> Result<ExecutionOutcome, ToolError> {
        let tool = self.lookup(id)?;
        let executor = self.executor_for(tool.kind())?;
        let outcome = executor.test(&tool, params).await;
        self.record(&tool, LogSource::Test, &outcome);
        Ok(outcome)
    }

    /// Live invocation. Returns the raw extracted value; the attempt is
    /// logged either way.
    pub async fn invoke(&self, id: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
        let tool = self.lookup(id)?;
        let executor = self.executor_for(tool.kind())?;
        let started = Instant::now();
        match executor.execute(&tool, params).await {
            Ok(result) => {
                let outcome = ExecutionOutcome::live_success(
                    tool.kind(),
                    started.elapsed().as_millis() as u64,
                    result.clone(),
                );
                self.record(&tool, LogSource::Live, &outcome);
                Ok(result)
            }
            Err(err) => {
                let outcome = ExecutionOutcome::live_failure(
                    tool.kind(),
                    started.elapsed().as_millis() as u64,
                    err.to_string(),
                );
                self.record(&tool, LogSource::Live, &outcome);
                Err(err)
            }
        }
    }

    // A failed log write never fails the invocation itself.
    fn record(&self, tool: &ToolDescriptor, source: LogSource, outcome: &ExecutionOutcome) {
        let record = ExecutionLogRecord::from_outcome(tool, source, outcome);
        if let Err(err) = self.logs.append(&record) {
            self.logger.warn(
                "Failed to record execution log",
                Some(&json!({ "tool": tool.name, "error": err.to_string() })),
            );
        }
    }
}
