/// Server orchestration
///
/// `Server` owns the shared executor, the auth manager, both protocol
/// front-ends and the metrics exporter, and drives them through the
/// lifecycle `Stopped -> Starting -> Running -> Stopping -> Stopped`.
pub mod frontend;
pub mod logger;
pub mod metrics;

pub use frontend::{LocalFrontEnd, ProtocolFrontEnd};
pub use metrics::{Metrics, PrometheusExporter};

use crate::auth::{AuthManager, CredentialQuery, CredentialStore, PlainCredentialStore};
use crate::config::{Config, StoreEngine, StoreConfig};
use crate::conn::TlsSession;
use crate::core::{Result, SqlFrontError};
use crate::executor::StatementExecutor;
use crate::memstore::MemStore;
use crate::session::Session;
use crate::sqlite::{SqliteExecutor, StoreLocation};
use std::fs;
use std::sync::Arc;
use tracing::{error, info};

/// A component with a start/stop lifecycle.
pub trait Service: Send {
    fn name(&self) -> &str;
    fn start(&mut self) -> Result<()>;
    /// Stopping a stopped service succeeds.
    fn stop(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Builds the backend selected by the store configuration.
pub fn build_executor(config: &StoreConfig) -> Result<Arc<dyn StatementExecutor>> {
    match config.engine {
        StoreEngine::Memory => Ok(Arc::new(MemStore::new())),
        StoreEngine::Sqlite if config.sqlite.memory => Ok(Arc::new(SqliteExecutor::in_memory())),
        StoreEngine::Sqlite => {
            let dir = config.sqlite.path.clone().ok_or_else(|| {
                SqlFrontError::Config("store.sqlite.path is required when memory = false".to_string())
            })?;
            fs::create_dir_all(&dir)?;
            Ok(Arc::new(SqliteExecutor::new(StoreLocation::Directory(dir))))
        }
    }
}

pub struct Server {
    config: Config,
    state: ServerState,
    auth: Arc<AuthManager>,
    executor: Arc<dyn StatementExecutor>,
    metrics: Arc<Metrics>,
    frontends: Vec<Box<dyn ProtocolFrontEnd>>,
    exporter: PrometheusExporter,
}

impl Server {
    /// Creates a stopped server with the backend its configuration selects.
    pub fn new(config: Config) -> Result<Self> {
        let executor = build_executor(&config.store)?;
        Ok(Self::with_executor(config, executor))
    }

    /// Creates a stopped server around an existing backend.
    pub fn with_executor(config: Config, executor: Arc<dyn StatementExecutor>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let mut server = Server {
            config,
            state: ServerState::Stopped,
            auth: Arc::new(AuthManager::new()),
            executor,
            exporter: PrometheusExporter::new(Arc::clone(&metrics)),
            metrics,
            frontends: Vec::new(),
        };
        server.add_frontend(Box::new(LocalFrontEnd::mysql()));
        server.add_frontend(Box::new(LocalFrontEnd::postgresql()));
        server
    }

    /// Registers a front-end on the shared backend, auth manager and
    /// metrics. It is started and stopped with the others.
    pub fn add_frontend(&mut self, mut frontend: Box<dyn ProtocolFrontEnd>) {
        frontend.set_executor(Arc::clone(&self.executor));
        frontend.set_auth_manager(Arc::clone(&self.auth));
        frontend.set_metrics(Arc::clone(&self.metrics));
        self.frontends.push(frontend);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the configuration; it takes effect on the next start.
    /// The backend chosen at construction is kept.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn executor(&self) -> &Arc<dyn StatementExecutor> {
        &self.executor
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn exporter(&self) -> &PrometheusExporter {
        &self.exporter
    }

    pub fn frontend(&self, name: &str) -> Option<&dyn ProtocolFrontEnd> {
        self.frontends
            .iter()
            .find(|fe| fe.name() == name)
            .map(|fe| fe.as_ref())
    }

    /// Opens a client session on the named front-end.
    pub fn connect(
        &self,
        frontend: &str,
        query: &CredentialQuery,
        tls: Option<TlsSession>,
    ) -> Result<Session> {
        self.frontend(frontend)
            .ok_or_else(|| SqlFrontError::App(format!("unknown front-end '{}'", frontend)))?
            .connect(query, tls)
    }

    fn setup_logger(&mut self) -> Result<()> {
        logger::init(&self.config.logger)
    }

    fn setup_ports(&mut self) -> Result<()> {
        let mysql = self.config.query.mysql_port();
        let postgresql = self.config.query.postgresql_port();
        for fe in self.frontends.iter_mut() {
            let port = match fe.name() {
                "mysql" => mysql,
                "postgresql" => postgresql,
                _ => continue,
            };
            fe.set_port(port);
        }
        Ok(())
    }

    fn setup_tls(&mut self) -> Result<()> {
        for fe in self.frontends.iter_mut() {
            fe.set_tls_config(None);
        }
        let material = match self.config.tls.load()? {
            Some(material) => material,
            None => return Ok(()),
        };
        let patterns: Vec<&str> = self.config.tls.common_names.iter().map(|s| s.as_str()).collect();
        self.auth.set_common_name_regexps(&patterns)?;
        for fe in self.frontends.iter_mut() {
            fe.set_tls_config(Some(material.clone()));
        }
        Ok(())
    }

    fn setup_credentials(&mut self) -> Result<()> {
        let creds = self.config.auth.enabled_credentials();
        if creds.is_empty() {
            return self.auth.set_credential_store(None);
        }
        let store = PlainCredentialStore::new();
        store.set_credentials(creds)?;
        let store: Arc<dyn CredentialStore> = Arc::new(store);
        self.auth.set_credential_store(Some(store))
    }

    fn setup_metrics(&mut self) -> Result<()> {
        self.exporter.set_port(self.config.metrics.prometheus.port);
        Ok(())
    }

    /// Applies the configuration and starts every service.
    ///
    /// On any failure the server is stopped again, best effort, and the
    /// original error is returned; stop failures are attached to it as a
    /// `Lifecycle` error.
    pub fn start(&mut self) -> Result<()> {
        if self.state == ServerState::Running {
            return Ok(());
        }
        self.state = ServerState::Starting;
        if let Err(e) = self.start_services() {
            error!("server start failed: {}", e);
            return Err(match self.stop() {
                Ok(()) => e,
                Err(stop_err) => SqlFrontError::Lifecycle(vec![e, stop_err]),
            });
        }
        self.state = ServerState::Running;
        info!(
            mysql = self.config.query.mysql_port(),
            postgresql = self.config.query.postgresql_port(),
            "sqlfront started"
        );
        Ok(())
    }

    fn start_services(&mut self) -> Result<()> {
        let steps: [fn(&mut Server) -> Result<()>; 5] = [
            Server::setup_logger,
            Server::setup_ports,
            Server::setup_tls,
            Server::setup_credentials,
            Server::setup_metrics,
        ];
        for step in steps {
            step(self)?;
        }
        for fe in self.frontends.iter_mut() {
            fe.start()?;
        }
        if self.config.metrics.prometheus.enabled {
            self.exporter.start()?;
        }
        Ok(())
    }

    /// Stops every service, continuing past failures.
    pub fn stop(&mut self) -> Result<()> {
        self.state = ServerState::Stopping;
        let mut errors = Vec::new();
        for fe in self.frontends.iter_mut() {
            if let Err(e) = fe.stop() {
                error!(service = fe.name(), "stop failed: {}", e);
                errors.push(e);
            }
        }
        if let Err(e) = self.exporter.stop() {
            error!(service = self.exporter.name(), "stop failed: {}", e);
            errors.push(e);
        }
        self.state = ServerState::Stopped;
        info!("sqlfront terminated");
        match SqlFrontError::join(errors) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    pub fn restart(&mut self) -> Result<()> {
        self.stop()?;
        self.start()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .field("frontends", &self.frontends.iter().map(|fe| fe.name()).collect::<Vec<_>>())
            .finish()
    }
}
