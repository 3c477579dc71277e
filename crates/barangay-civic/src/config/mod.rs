use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub tenant: TenantConfig,
    pub storage: StorageConfig,
    pub triage: TriageConfig,
    pub issuance: IssuanceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let barangay_id = env::var("APP_BARANGAY_ID").unwrap_or_else(|_| "brgy-001".to_string());
        let barangay_name =
            env::var("APP_BARANGAY_NAME").unwrap_or_else(|_| "Barangay Poblacion".to_string());
        if barangay_id.trim().is_empty() || barangay_name.trim().is_empty() {
            return Err(ConfigError::MissingTenant);
        }

        let upload_dir = env::var("APP_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let default_page_size = parse_usize("APP_TRIAGE_PAGE_SIZE", 10)?;
        let max_page_size = parse_usize("APP_TRIAGE_MAX_PAGE_SIZE", 100)?;
        if default_page_size == 0 || max_page_size < default_page_size {
            return Err(ConfigError::InvalidPageSize {
                default: default_page_size,
                max: max_page_size,
            });
        }

        let sweep_by_type_honors_auto_delete =
            parse_bool("APP_SWEEP_BY_TYPE_HONORS_AUTO_DELETE", false)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            tenant: TenantConfig {
                barangay_id,
                barangay_name,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from(upload_dir),
            },
            triage: TriageConfig {
                default_page_size,
                max_page_size,
            },
            issuance: IssuanceConfig {
                sweep_by_type_honors_auto_delete,
                ..IssuanceConfig::default()
            },
        })
    }
}

fn parse_usize(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// The one barangay this deployment serves.
///
/// The service is single-tenant; the tenant is fixed at startup instead of being looked
/// up from storage on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub barangay_id: String,
    pub barangay_name: String,
}

/// Root directory for the disk-backed file store adapter.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

/// Pagination bounds for the triage queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriageConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Issuance and sweep behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceConfig {
    /// When false, sweeping a single document type ignores `auto_delete_expired`.
    pub sweep_by_type_honors_auto_delete: bool,
    /// Attempts made to mint a verification code before giving up on collisions.
    pub code_mint_attempts: u8,
    pub artifact_prefix: String,
    pub requirement_prefix: String,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            sweep_by_type_honors_auto_delete: false,
            code_mint_attempts: 5,
            artifact_prefix: "documents".to_string(),
            requirement_prefix: "requirements".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingTenant,
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    InvalidPageSize { default: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingTenant => {
                write!(f, "APP_BARANGAY_ID and APP_BARANGAY_NAME must not be empty")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::InvalidPageSize { default, max } => write!(
                f,
                "triage page size {default} must be positive and not exceed the maximum {max}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
