/// Protocol front-ends
///
/// A front-end owns a listener port, TLS material and the shared auth
/// manager and executor. Wire codecs are outside this crate, so the
/// in-process `LocalFrontEnd` hands out `Session`s directly; a network
/// front-end would do the same after decoding the handshake.
use super::metrics::Metrics;
use super::Service;
use crate::auth::{AuthManager, CredentialQuery};
use crate::config::TlsMaterial;
use crate::conn::TlsSession;
use crate::core::{Result, SqlFrontError};
use crate::executor::StatementExecutor;
use crate::query::Dialect;
use crate::session::Session;
use std::sync::Arc;
use tracing::info;

/// Setters the server uses to configure a front-end before starting it.
pub trait ProtocolFrontEnd: Service {
    fn set_port(&mut self, port: u16);
    fn port(&self) -> u16;
    /// `None` disables TLS.
    fn set_tls_config(&mut self, tls: Option<TlsMaterial>);
    fn set_auth_manager(&mut self, auth: Arc<AuthManager>);
    fn set_executor(&mut self, executor: Arc<dyn StatementExecutor>);
    fn set_metrics(&mut self, metrics: Arc<Metrics>);
    /// Opens an authenticated session for a client.
    fn connect(&self, query: &CredentialQuery, tls: Option<TlsSession>) -> Result<Session>;
}

pub struct LocalFrontEnd {
    name: String,
    dialect: Dialect,
    port: u16,
    tls: Option<TlsMaterial>,
    auth: Arc<AuthManager>,
    executor: Option<Arc<dyn StatementExecutor>>,
    metrics: Option<Arc<Metrics>>,
    running: bool,
}

impl LocalFrontEnd {
    pub fn new(name: &str, dialect: Dialect, port: u16) -> Self {
        LocalFrontEnd {
            name: name.to_string(),
            dialect,
            port,
            tls: None,
            auth: Arc::new(AuthManager::new()),
            executor: None,
            metrics: None,
            running: false,
        }
    }

    /// MySQL-flavoured front-end on the default port.
    pub fn mysql() -> Self {
        Self::new("mysql", Dialect::MySql, 3306)
    }

    /// PostgreSQL-flavoured front-end on the default port.
    pub fn postgresql() -> Self {
        Self::new("postgresql", Dialect::PostgreSql, 5432)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

impl Service for LocalFrontEnd {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<()> {
        if self.executor.is_none() {
            return Err(SqlFrontError::Config(format!(
                "{} front-end has no executor",
                self.name
            )));
        }
        self.running = true;
        info!(frontend = %self.name, port = self.port, tls = self.tls.is_some(), "front-end started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            info!(frontend = %self.name, "front-end stopped");
        }
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl ProtocolFrontEnd for LocalFrontEnd {
    fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn set_tls_config(&mut self, tls: Option<TlsMaterial>) {
        self.tls = tls;
    }

    fn set_auth_manager(&mut self, auth: Arc<AuthManager>) {
        self.auth = auth;
    }

    fn set_executor(&mut self, executor: Arc<dyn StatementExecutor>) {
        self.executor = Some(executor);
    }

    fn set_metrics(&mut self, metrics: Arc<Metrics>) {
        self.metrics = Some(metrics);
    }

    fn connect(&self, query: &CredentialQuery, tls: Option<TlsSession>) -> Result<Session> {
        if !self.running {
            return Err(SqlFrontError::App(format!(
                "{} front-end is not running",
                self.name
            )));
        }
        let executor = self
            .executor
            .clone()
            .ok_or_else(|| SqlFrontError::App(format!("{} front-end has no executor", self.name)))?;
        let session = Session::open(
            executor,
            self.dialect,
            &self.auth,
            query,
            tls,
            self.tls.is_some(),
        )?;
        Ok(match &self.metrics {
            Some(metrics) => session.with_metrics(Arc::clone(metrics)),
            None => session,
        })
    }
}

impl std::fmt::Debug for LocalFrontEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFrontEnd")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("tls", &self.tls.is_some())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::PeerCertificate;
    use crate::memstore::MemStore;

    fn started() -> LocalFrontEnd {
        let mut fe = LocalFrontEnd::postgresql();
        fe.set_executor(Arc::new(MemStore::new()));
        fe.start().unwrap();
        fe
    }

    #[test]
    fn test_start_requires_executor() {
        let mut fe = LocalFrontEnd::mysql();
        assert!(matches!(fe.start().unwrap_err(), SqlFrontError::Config(_)));
        assert!(!fe.is_running());
    }

    #[test]
    fn test_connect_only_while_running() {
        let mut fe = started();
        assert!(fe.connect(&CredentialQuery::new("u"), None).is_ok());
        fe.stop().unwrap();
        assert!(fe.connect(&CredentialQuery::new("u"), None).is_err());
    }

    #[test]
    fn test_certificates_checked_when_tls_enabled() {
        let mut fe = started();
        let auth = Arc::new(AuthManager::new());
        auth.set_common_name_regexps(&["^alice$"]).unwrap();
        fe.set_auth_manager(auth);

        // without TLS material the rule set is not consulted
        assert!(fe.connect(&CredentialQuery::new("u"), None).is_ok());

        fe.set_tls_config(Some(TlsMaterial {
            cert: b"c".to_vec(),
            key: b"k".to_vec(),
            ca_certs: Vec::new(),
        }));
        let alice = TlsSession {
            peer_certificates: vec![PeerCertificate::new("alice")],
        };
        let session = fe.connect(&CredentialQuery::new("u"), Some(alice)).unwrap();
        assert_eq!(session.dialect(), Dialect::PostgreSql);

        let err = fe.connect(&CredentialQuery::new("u"), None).unwrap_err();
        assert!(matches!(err, SqlFrontError::CertificateRejected(_)));
    }
}
