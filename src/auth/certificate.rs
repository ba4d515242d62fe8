/// Client certificate verification
use crate::conn::ConnContext;
use crate::core::{Result, SqlFrontError};
use regex::Regex;

/// Decides whether a connection's peer certificates are acceptable.
pub trait CertificateAuthenticator: Send + Sync {
    fn verify_certificate(&self, ctx: &ConnContext) -> Result<bool>;
}

/// Accepts a peer whose certificate common name matches any pattern.
///
/// An empty pattern set accepts every connection, TLS or not.
#[derive(Debug, Default, Clone)]
pub struct CommonNameAuthenticator {
    patterns: Vec<Regex>,
}

impl CommonNameAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every pattern; on the first invalid one nothing is kept.
    pub fn with_patterns(patterns: &[&str]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    SqlFrontError::Config(format!("invalid common name pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CommonNameAuthenticator { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, common_name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(common_name))
    }
}

impl CertificateAuthenticator for CommonNameAuthenticator {
    fn verify_certificate(&self, ctx: &ConnContext) -> Result<bool> {
        if self.patterns.is_empty() {
            return Ok(true);
        }
        let tls = match ctx.tls() {
            Some(tls) => tls,
            None => return Ok(false),
        };
        Ok(tls
            .peer_certificates
            .iter()
            .any(|cert| self.matches(&cert.common_name)))
    }
}
