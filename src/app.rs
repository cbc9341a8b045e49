use crate::constants::limits::LOG_RETENTION;
use crate::errors::ToolError;
use crate::executors::{CliExecutor, HttpExecutor};
use crate::mcp::server::McpAdapter;
use crate::model::ExecutorKind;
use crate::services::binder::ParameterBinder;
use crate::services::coordinator::ExecutionCoordinator;
use crate::services::logger::Logger;
use crate::services::secrets::SecretService;
use crate::services::security::Security;
use crate::stores::{DescriptorStore, LogStore, SecretStore};
use crate::utils::paths::resolve_db_path;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Wires stores, services and executors together. One instance per
/// process.
pub struct App {
    pub logger: Logger,
    pub descriptors: Arc<DescriptorStore>,
    pub secrets: Arc<SecretService>,
    pub logs: Arc<LogStore>,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub adapter: McpAdapter,
}

impl App {
    pub fn initialize() -> Result<Self, ToolError> {
        let db_path = resolve_db_path();
        Self::initialize_at(&db_path, Security::new())
    }

    pub fn initialize_at(db_path: &Path, security: Security) -> Result<Self, ToolError> {
        let logger = Logger::new("toolbench");

        let descriptors = Arc::new(DescriptorStore::open(db_path)?);
        let secret_store = Arc::new(SecretStore::open(db_path)?);
        let logs = Arc::new(LogStore::open(db_path, LOG_RETENTION)?);

        let security = Arc::new(security);
        if !security.encryption_available() {
            logger.warn(
                "Secret encryption unavailable, falling back to obfuscation",
                None,
            );
        }
        let secrets = Arc::new(SecretService::new(&logger, secret_store, security));
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
        let coordinator = Arc::new(coordinator);

        let adapter = McpAdapter::new(&logger, Arc::clone(&descriptors), Arc::clone(&coordinator));

        logger.info(
            "App initialized",
            Some(&json!({ "db": db_path.display().to_string() })),
        );

        Ok(Self {
            logger,
            descriptors,
            secrets,
            logs,
            coordinator,
            adapter,
        })
    }
}
