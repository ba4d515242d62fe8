/// Client sessions
///
/// A `Session` is what a protocol front-end holds for one client: the
/// connection context, the dialect the client speaks and the shared
/// executor. SQL text goes in, one `Response` per statement comes out.
use crate::auth::{AuthManager, CredentialQuery};
use crate::conn::{ConnContext, TlsSession};
use crate::core::Result;
use crate::executor::{Response, StatementExecutor};
use crate::query::{self, Dialect, Statement};
use crate::server::metrics::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Session {
    ctx: ConnContext,
    dialect: Dialect,
    executor: Arc<dyn StatementExecutor>,
    metrics: Option<Arc<Metrics>>,
}

impl Session {
    /// Creates an unauthenticated session; used by front-ends that already
    /// verified the client and by tests.
    pub fn new(executor: Arc<dyn StatementExecutor>, dialect: Dialect) -> Self {
        Session {
            ctx: ConnContext::new(),
            dialect,
            executor,
            metrics: None,
        }
    }

    /// Authenticates a client and opens a session for it.
    ///
    /// # Arguments
    ///
    /// * `auth` - Manager holding the credential store and certificate rules
    /// * `query` - Username and password the client presented
    /// * `tls` - TLS session state when the client connected over TLS
    /// * `verify_certificate` - Whether the front-end requires certificate checks
    pub fn open(
        executor: Arc<dyn StatementExecutor>,
        dialect: Dialect,
        auth: &AuthManager,
        query: &CredentialQuery,
        tls: Option<TlsSession>,
        verify_certificate: bool,
    ) -> Result<Self> {
        let mut session = Session::new(executor, dialect);
        if let Some(tls) = tls {
            session.ctx.set_tls(tls);
        }
        if verify_certificate {
            auth.verify_certificate(&session.ctx)?;
        }
        auth.verify_credential(&session.ctx, query)?;
        session.ctx.set_user(&query.username);
        info!(conn = %session.ctx.id(), user = %query.username, ?dialect, "session opened");
        Ok(session)
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn context(&self) -> &ConnContext {
        &self.ctx
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn database(&self) -> Option<&str> {
        self.ctx.database()
    }

    /// Parses `sql` and executes every statement in order.
    ///
    /// Execution stops at the first failing statement; responses of the
    /// statements before it are discarded with it.
    pub fn execute(&mut self, sql: &str) -> Result<Vec<Response>> {
        let statements = query::parse(sql, self.dialect)
            .map_err(|e| self.executor.parser_error(&self.ctx, sql, e))?;
        statements
            .iter()
            .map(|stmt| self.execute_statement(stmt))
            .collect()
    }

    /// Executes one parsed statement, counting it in the session metrics.
    pub fn execute_statement(&mut self, stmt: &Statement) -> Result<Response> {
        let result = self.executor.execute(&mut self.ctx, stmt);
        if let Some(metrics) = &self.metrics {
            metrics.record(stmt.kind(), result.is_ok());
        }
        if let Err(e) = &result {
            debug!(conn = %self.ctx.id(), kind = stmt.kind(), "statement failed: {}", e);
        }
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ctx", &self.ctx)
            .field("dialect", &self.dialect)
            .finish()
    }
}
