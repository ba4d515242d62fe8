/// Authentication and authorization decisions
///
/// Credential lookup and verification, plus peer certificate checks by
/// common name. Wire-level handshakes live in the protocol front-ends.
pub mod certificate;
pub mod credential;
pub mod manager;

pub use certificate::{CertificateAuthenticator, CommonNameAuthenticator};
pub use credential::{Credential, CredentialQuery, CredentialStore, PlainCredentialStore};
pub use manager::AuthManager;
