#![allow(dead_code)]

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use toolbench::executors::{CliExecutor, HttpExecutor};
use toolbench::model::{
    AuthSpec, CliConfig, ExecutorConfig, ExecutorKind, HttpConfig, HttpMethod, ParamLocation,
    ParamType, ParameterSpec, ToolDescriptor,
};
use toolbench::services::binder::ParameterBinder;
use toolbench::services::coordinator::ExecutionCoordinator;
use toolbench::services::logger::Logger;
use toolbench::services::secrets::SecretService;
use toolbench::services::security::Security;
use toolbench::stores::{DescriptorStore, LogStore, SecretStore};

/// In-memory wiring of the full execution stack.
pub struct Harness {
    pub logger: Logger,
    pub descriptors: Arc<DescriptorStore>,
    pub secrets: Arc<SecretService>,
    pub logs: Arc<LogStore>,
    pub binder: Arc<ParameterBinder>,
    pub coordinator: Arc<ExecutionCoordinator>,
}

pub fn harness() -> Harness {
    let logger = Logger::new("test");
    let descriptors = Arc::new(DescriptorStore::in_memory().expect("descriptor store"));
    let secret_store = Arc::new(SecretStore::in_memory().expect("secret store"));
    let logs = Arc::new(LogStore::in_memory(1_000).expect("log store"));
    let secrets = Arc::new(SecretService::new(
        &logger,
        secret_store,
        Arc::new(Security::degraded()),
    ));
    let binder = Arc::new(ParameterBinder::new(Arc::clone(&secrets)));

    let mut coordinator =
        ExecutionCoordinator::new(&logger, Arc::clone(&descriptors), Arc::clone(&logs));
    coordinator.register(
        ExecutorKind::Http,
        Arc::new(HttpExecutor::new(
            &logger,
            Arc::clone(&binder),
            Arc::clone(&secrets),
        )),
    );
    coordinator.register(
        ExecutorKind::Cli,
        Arc::new(CliExecutor::new(&logger, Arc::clone(&binder))),
    );

    Harness {
        logger,
        descriptors,
        secrets,
        logs,
        binder,
        coordinator: Arc::new(coordinator),
    }
}

pub fn param(name: &str, location: ParamLocation) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        kind: ParamType::String,
        description: String::new(),
        required: false,
        default: None,
        location,
    }
}

pub fn param_with_default(name: &str, location: ParamLocation, default: Value) -> ParameterSpec {
    ParameterSpec {
        default: Some(default),
        ..param(name, location)
    }
}

pub fn http_tool(name: &str, config: HttpConfig, parameters: Vec<ParameterSpec>) -> ToolDescriptor {
    ToolDescriptor {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: format!("{name} test tool"),
        enabled: true,
        config: ExecutorConfig::Http(config),
        parameters,
        auth: AuthSpec::None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn get_config(url: &str) -> HttpConfig {
    HttpConfig {
        method: HttpMethod::Get,
        url: url.to_string(),
        headers: Default::default(),
        body_template: None,
        response_path: None,
        timeout_ms: None,
    }
}

pub fn cli_tool(name: &str, command: &str, parameters: Vec<ParameterSpec>) -> ToolDescriptor {
    ToolDescriptor {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: format!("{name} test tool"),
        enabled: true,
        config: ExecutorConfig::Cli(CliConfig {
            command: command.to_string(),
            working_dir: None,
            timeout_ms: None,
            shell: None,
            env: Default::default(),
        }),
        parameters,
        auth: AuthSpec::None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn cli_tool_with(
    name: &str,
    config: CliConfig,
    parameters: Vec<ParameterSpec>,
) -> ToolDescriptor {
    ToolDescriptor {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: format!("{name} test tool"),
        enabled: true,
        config: ExecutorConfig::Cli(config),
        parameters,
        auth: AuthSpec::None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
