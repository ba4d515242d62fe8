/// Authentication manager
///
/// One `AuthManager` is shared by every protocol front-end of a server. It
/// owns an optional credential store and a certificate authenticator, both
/// replaceable at runtime.
use super::certificate::{CertificateAuthenticator, CommonNameAuthenticator};
use super::credential::{constant_time_eq, CredentialQuery, CredentialStore};
use crate::conn::ConnContext;
use crate::core::error::lock_error;
use crate::core::{Result, SqlFrontError};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

pub struct AuthManager {
    credential_store: RwLock<Option<Arc<dyn CredentialStore>>>,
    certificate_authenticator: RwLock<Arc<dyn CertificateAuthenticator>>,
}

impl AuthManager {
    /// Creates a manager with authentication disabled and an empty
    /// certificate rule set.
    pub fn new() -> Self {
        AuthManager {
            credential_store: RwLock::new(None),
            certificate_authenticator: RwLock::new(Arc::new(CommonNameAuthenticator::new())),
        }
    }

    /// Installs a credential store; `None` disables credential checks.
    pub fn set_credential_store(&self, store: Option<Arc<dyn CredentialStore>>) -> Result<()> {
        let mut slot = self
            .credential_store
            .write()
            .map_err(|_| lock_error("credential store"))?;
        *slot = store;
        Ok(())
    }

    pub fn has_credential_store(&self) -> bool {
        self.credential_store
            .read()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    pub fn set_certificate_authenticator(
        &self,
        authenticator: Arc<dyn CertificateAuthenticator>,
    ) -> Result<()> {
        let mut slot = self
            .certificate_authenticator
            .write()
            .map_err(|_| lock_error("certificate authenticator"))?;
        *slot = authenticator;
        Ok(())
    }

    /// Replaces the certificate rule set with the given common name patterns.
    ///
    /// # Arguments
    ///
    /// * `patterns` - Regular expressions matched against peer common names
    ///
    /// # Returns
    ///
    /// A `Config` error if any pattern fails to compile; the previous rule
    /// set is then left in place.
    pub fn set_common_name_regexps(&self, patterns: &[&str]) -> Result<()> {
        let authenticator = CommonNameAuthenticator::with_patterns(patterns)?;
        self.set_certificate_authenticator(Arc::new(authenticator))
    }

    /// Verifies the credentials a client presented.
    pub fn verify_credential(&self, ctx: &ConnContext, query: &CredentialQuery) -> Result<()> {
        let store = self
            .credential_store
            .read()
            .map_err(|_| lock_error("credential store"))?
            .clone();
        let store = match store {
            Some(store) => store,
            None => return Ok(()),
        };

        let failed = || {
            warn!(conn = %ctx.id(), user = %query.username, "authentication failed");
            SqlFrontError::AuthenticationFailed(query.username.clone())
        };
        let stored = store.lookup_credential(query)?.ok_or_else(failed)?;
        let offered = query.password.as_deref().unwrap_or("");
        if !constant_time_eq(stored.password.as_bytes(), offered.as_bytes()) {
            return Err(failed());
        }
        debug!(conn = %ctx.id(), user = %query.username, "authenticated");
        Ok(())
    }

    /// Verifies the peer certificates of a connection.
    pub fn verify_certificate(&self, ctx: &ConnContext) -> Result<()> {
        let authenticator = self
            .certificate_authenticator
            .read()
            .map_err(|_| lock_error("certificate authenticator"))?
            .clone();
        if authenticator.verify_certificate(ctx)? {
            return Ok(());
        }
        let presented = ctx
            .tls()
            .map(|tls| {
                tls.peer_certificates
                    .iter()
                    .map(|c| c.common_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "no TLS session".to_string());
        warn!(conn = %ctx.id(), "certificate rejected: {}", presented);
        Err(SqlFrontError::CertificateRejected(presented))
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("credential_store", &self.has_credential_store())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, PlainCredentialStore};
    use crate::conn::{PeerCertificate, TlsSession};

    fn manager_with_alice() -> AuthManager {
        let store = PlainCredentialStore::new();
        store
            .set_credentials(vec![Credential::new("alice", "secret")])
            .unwrap();
        let mgr = AuthManager::new();
        mgr.set_credential_store(Some(Arc::new(store))).unwrap();
        mgr
    }

    #[test]
    fn test_no_store_accepts() {
        let mgr = AuthManager::new();
        let ctx = ConnContext::new();
        assert!(mgr
            .verify_credential(&ctx, &CredentialQuery::new("anyone"))
            .is_ok());
    }

    #[test]
    fn test_verify_credential() {
        let mgr = manager_with_alice();
        let ctx = ConnContext::new();
        let ok = CredentialQuery::new("alice").with_password("secret");
        assert!(mgr.verify_credential(&ctx, &ok).is_ok());

        for query in [
            CredentialQuery::new("alice").with_password("wrong"),
            CredentialQuery::new("alice"),
            CredentialQuery::new("bob").with_password("secret"),
        ] {
            let err = mgr.verify_credential(&ctx, &query).unwrap_err();
            assert!(matches!(err, SqlFrontError::AuthenticationFailed(_)));
        }
    }

    #[test]
    fn test_removing_store_disables_auth() {
        let mgr = manager_with_alice();
        mgr.set_credential_store(None).unwrap();
        assert!(!mgr.has_credential_store());
        let ctx = ConnContext::new();
        assert!(mgr
            .verify_credential(&ctx, &CredentialQuery::new("bob"))
            .is_ok());
    }

    #[test]
    fn test_verify_certificate_patterns() {
        let mgr = AuthManager::new();
        let mut ctx = ConnContext::new();
        ctx.set_tls(TlsSession {
            peer_certificates: vec![PeerCertificate::new("bob")],
        });
        assert!(mgr.verify_certificate(&ctx).is_ok());

        mgr.set_common_name_regexps(&["^alice$"]).unwrap();
        let err = mgr.verify_certificate(&ctx).unwrap_err();
        assert!(matches!(err, SqlFrontError::CertificateRejected(_)));

        let err = mgr.verify_certificate(&ConnContext::new()).unwrap_err();
        assert!(matches!(err, SqlFrontError::CertificateRejected(_)));
    }

    #[test]
    fn test_invalid_regexp_keeps_previous_rules() {
        let mgr = AuthManager::new();
        mgr.set_common_name_regexps(&["^alice$"]).unwrap();
        assert!(mgr.set_common_name_regexps(&["["]).is_err());

        let mut ctx = ConnContext::new();
        ctx.set_tls(TlsSession {
            peer_certificates: vec![PeerCertificate::new("alice")],
        });
        assert!(mgr.verify_certificate(&ctx).is_ok());
        ctx.set_tls(TlsSession {
            peer_certificates: vec![PeerCertificate::new("bob")],
        });
        assert!(mgr.verify_certificate(&ctx).is_err());
    }
}
