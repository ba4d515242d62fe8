use crate::auth::Credential;
use crate::core::{Result, SqlFrontError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// File name looked up by `Config::search_paths`.
pub const CONFIG_FILE_NAME: &str = "sqlfront.toml";

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section is optional; missing sections and keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
    pub tls: TlsConfig,
    pub query: QueryConfig,
    pub metrics: MetricsConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Parses the configured level name (trace, debug, info, warn, error).
    pub fn level(&self) -> Result<Level> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" | "warning" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => Err(SqlFrontError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

/// TLS configuration shared by both front-ends.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_files: Vec<PathBuf>,
    /// Regular expressions a client certificate common name must match.
    pub common_names: Vec<String>,
}

/// Certificate material read from the files named by a `TlsConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
    pub ca_certs: Vec<Vec<u8>>,
}

impl TlsConfig {
    /// Reads the server certificate, key and CA files into memory.
    ///
    /// Returns `Ok(None)` when TLS is disabled.
    pub fn load(&self) -> Result<Option<TlsMaterial>> {
        if !self.enabled {
            return Ok(None);
        }
        let cert_file = self
            .cert_file
            .as_ref()
            .ok_or_else(|| SqlFrontError::Config("tls.cert_file is required".to_string()))?;
        let key_file = self
            .key_file
            .as_ref()
            .ok_or_else(|| SqlFrontError::Config("tls.key_file is required".to_string()))?;
        let ca_certs = self
            .ca_files
            .iter()
            .map(fs::read)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Some(TlsMaterial {
            cert: fs::read(cert_file)?,
            key: fs::read(key_file)?,
            ca_certs,
        }))
    }
}

/// Front-end listener configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub mysql: PortConfig,
    pub postgresql: PortConfig,
}

impl QueryConfig {
    pub fn mysql_port(&self) -> u16 {
        self.mysql.port.unwrap_or(3306)
    }

    pub fn postgresql_port(&self) -> u16 {
        self.postgresql.port.unwrap_or(5432)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub prometheus: PrometheusConfig,
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        PrometheusConfig {
            enabled: false,
            port: 9181,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub plain: Vec<PlainCredentialConfig>,
}

impl AuthConfig {
    /// Credentials of every enabled plain entry.
    pub fn enabled_credentials(&self) -> Vec<Credential> {
        self.plain
            .iter()
            .filter(|p| p.enabled)
            .map(|p| Credential::new(&p.username, &p.password))
            .collect()
    }
}

/// A username/password entry under `[[auth.plain]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlainCredentialConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub engine: StoreEngine,
    pub sqlite: SqliteStoreConfig,
}

/// SQLite backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteStoreConfig {
    /// Keep every database in memory instead of `<path>/<name>.db`.
    pub memory: bool,
    pub path: Option<PathBuf>,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        SqliteStoreConfig {
            memory: true,
            path: None,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.logger.level()?;
        if self.tls.enabled && (self.tls.cert_file.is_none() || self.tls.key_file.is_none()) {
            return Err(SqlFrontError::Config(
                "tls is enabled but cert_file or key_file is missing".to_string(),
            ));
        }
        if self.store.engine == StoreEngine::Sqlite
            && !self.store.sqlite.memory
            && self.store.sqlite.path.is_none()
        {
            return Err(SqlFrontError::Config(
                "store.sqlite.path is required when memory = false".to_string(),
            ));
        }
        Ok(())
    }

    /// Candidate configuration files, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlfront").join(CONFIG_FILE_NAME));
        }
        paths
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = sqlfront::config::load_config("sqlfront.toml").unwrap();
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

/// Loads the first configuration file found on the search path, or the
/// defaults when there is none.
pub fn load_default_config() -> Result<Config> {
    match Config::search_paths().into_iter().find(|p| p.is_file()) {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[logger]
enabled = true
level = "debug"

[query.mysql]
port = 13306

[query.postgresql]
port = 15432

[metrics.prometheus]
enabled = true
port = 19181

[[auth.plain]]
username = "admin"
password = "secret"

[[auth.plain]]
username = "guest"
password = "guest"
enabled = false

[store]
engine = "memory"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.logger.level().unwrap(), Level::DEBUG);
        assert_eq!(config.query.mysql_port(), 13306);
        assert_eq!(config.query.postgresql_port(), 15432);
        assert!(config.metrics.prometheus.enabled);
        assert_eq!(config.metrics.prometheus.port, 19181);
        assert_eq!(config.store.engine, StoreEngine::Memory);

        let creds = config.auth.enabled_credentials();
        assert_eq!(creds, vec![Credential::new("admin", "secret")]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.logger.enabled);
        assert_eq!(config.logger.level().unwrap(), Level::INFO);
        assert!(!config.tls.enabled);
        assert_eq!(config.query.mysql_port(), 3306);
        assert_eq!(config.query.postgresql_port(), 5432);
        assert!(!config.metrics.prometheus.enabled);
        assert_eq!(config.metrics.prometheus.port, 9181);
        assert!(config.auth.plain.is_empty());
        assert_eq!(config.store.engine, StoreEngine::Sqlite);
        assert!(config.store.sqlite.memory);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_toml_str("[logger]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, SqlFrontError::Config(_)));

        let err = Config::from_toml_str("[tls]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, SqlFrontError::Config(_)));

        let err = Config::from_toml_str("[store.sqlite]\nmemory = false\n").unwrap_err();
        assert!(matches!(err, SqlFrontError::Config(_)));

        let err = Config::from_toml_str("[query.mysql]\nport = \"x\"\n").unwrap_err();
        assert!(matches!(err, SqlFrontError::Toml(_)));
    }

    #[test]
    fn test_tls_load_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        fs::File::create(&cert).unwrap().write_all(b"CERT").unwrap();
        fs::File::create(&key).unwrap().write_all(b"KEY").unwrap();

        let tls = TlsConfig {
            enabled: true,
            cert_file: Some(cert),
            key_file: Some(key),
            ..TlsConfig::default()
        };
        let material = tls.load().unwrap().unwrap();
        assert_eq!(material.cert, b"CERT");
        assert_eq!(material.key, b"KEY");
        assert!(material.ca_certs.is_empty());

        let missing = TlsConfig {
            ca_files: vec![dir.path().join("missing.pem")],
            ..tls
        };
        assert!(matches!(missing.load().unwrap_err(), SqlFrontError::Io(_)));
        assert!(TlsConfig::default().load().unwrap().is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, SAMPLE_CONFIG).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.engine, StoreEngine::Memory);
        assert!(matches!(
            load_config(dir.path().join("nope.toml")).unwrap_err(),
            SqlFrontError::Io(_)
        ));
    }

    #[test]
    fn test_search_paths_start_with_cwd() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(CONFIG_FILE_NAME));
    }
}
