/// Per-connection context
///
/// Protocol front-ends create one `ConnContext` per client connection and
/// pass it to every dispatcher call. It carries the current database
/// selection, the authenticated user and the TLS session state, so no
/// handler ever consults process-wide mutable state.
use uuid::Uuid;

/// A certificate presented by the peer during the TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    pub common_name: String,
}

impl PeerCertificate {
    pub fn new(common_name: &str) -> Self {
        PeerCertificate {
            common_name: common_name.to_string(),
        }
    }
}

/// TLS state of a connection after the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSession {
    pub peer_certificates: Vec<PeerCertificate>,
}

/// State carried by one client connection.
#[derive(Debug, Clone)]
pub struct ConnContext {
    id: Uuid,
    database: Option<String>,
    user: Option<String>,
    tls: Option<TlsSession>,
}

impl ConnContext {
    /// Creates a context with no database selected.
    pub fn new() -> Self {
        ConnContext {
            id: Uuid::new_v4(),
            database: None,
            user: None,
            tls: None,
        }
    }

    /// Creates a context with `database` already selected.
    pub fn with_database(database: &str) -> Self {
        let mut ctx = ConnContext::new();
        ctx.set_database(database);
        ctx
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn set_database(&mut self, name: &str) {
        self.database = Some(name.to_string());
    }

    pub fn clear_database(&mut self) {
        self.database = None;
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = Some(user.to_string());
    }

    pub fn tls(&self) -> Option<&TlsSession> {
        self.tls.as_ref()
    }

    pub fn set_tls(&mut self, session: TlsSession) {
        self.tls = Some(session);
    }
}

impl Default for ConnContext {
    fn default() -> Self {
        ConnContext::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_independent() {
        let mut a = ConnContext::new();
        let b = ConnContext::new();
        a.set_database("shop");
        assert_eq!(a.database(), Some("shop"));
        assert_eq!(b.database(), None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_tls_session() {
        let mut ctx = ConnContext::with_database("shop");
        assert!(ctx.tls().is_none());
        ctx.set_tls(TlsSession {
            peer_certificates: vec![PeerCertificate::new("alice")],
        });
        assert_eq!(ctx.tls().unwrap().peer_certificates[0].common_name, "alice");
    }
}
