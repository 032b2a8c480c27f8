use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::enrollment::CredentialPolicy;

pub const DEFAULT_STUDENT_ID_PREFIX: &str = "DPLR";
pub const DEFAULT_PORTAL_URL: &str = "https://dopplercoaching.com";

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
    pub enrollment: EnrollmentConfig,
    pub admin: AdminConfig,
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

        let student_id_prefix = normalize_prefix(
            &env::var("APP_STUDENT_ID_PREFIX")
                .unwrap_or_else(|_| DEFAULT_STUDENT_ID_PREFIX.to_string()),
        )?;

        let credential_policy = match env::var("APP_CREDENTIAL_POLICY") {
            Ok(raw) => CredentialPolicy::parse(&raw)
                .ok_or(ConfigError::InvalidCredentialPolicy { value: raw })?,
            Err(_) => CredentialPolicy::default(),
        };

        let require_pending = match env::var("APP_REQUIRE_PENDING") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "APP_REQUIRE_PENDING",
                value: raw,
            })?,
            Err(_) => false,
        };

        let portal_url = env::var("APP_PORTAL_URL")
            .unwrap_or_else(|_| DEFAULT_PORTAL_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_email =
            env::var("APP_ADMIN_EMAIL").unwrap_or_else(|_| "admin@dopplercoaching.com".to_string());
        let admin_password = match env::var("APP_ADMIN_PASSWORD") {
            Ok(password) => password,
            Err(_) if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingAdminPassword)
            }
            Err(_) => "admin123".to_string(),
        };
        let session_ttl_minutes = env::var("APP_SESSION_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u32>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or(ConfigError::InvalidSessionTtl)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            enrollment: EnrollmentConfig {
                student_id_prefix,
                credential_policy,
                require_pending,
                portal_url,
            },
            admin: AdminConfig {
                email: admin_email,
                password: admin_password,
                session_ttl_minutes,
            },
        })
    }
}

/// Student IDs are matched upper-case at login, so the prefix is stored that way.
fn normalize_prefix(prefix: &str) -> Result<String, ConfigError> {
    let prefix = prefix.trim();
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidStudentIdPrefix {
            value: prefix.to_string(),
        });
    }
    Ok(prefix.to_ascii_uppercase())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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

/// Knobs for the enquiry provisioning workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentConfig {
    pub student_id_prefix: String,
    pub credential_policy: CredentialPolicy,
    /// Reject provisioning once an enquiry has left `pending`.
    pub require_pending: bool,
    /// Base URL used for the login link in credential emails.
    pub portal_url: String,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            student_id_prefix: DEFAULT_STUDENT_ID_PREFIX.to_string(),
            credential_policy: CredentialPolicy::default(),
            require_pending: false,
            portal_url: DEFAULT_PORTAL_URL.to_string(),
        }
    }
}

/// Operator credentials and session lifetime for the admin API.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    pub session_ttl_minutes: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStudentIdPrefix { value: String },
    InvalidCredentialPolicy { value: String },
    InvalidFlag { key: &'static str, value: String },
    InvalidSessionTtl,
    MissingAdminPassword,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStudentIdPrefix { value } => write!(
                f,
                "APP_STUDENT_ID_PREFIX must be non-empty ASCII alphanumeric (got '{}')",
                value
            ),
            ConfigError::InvalidCredentialPolicy { value } => write!(
                f,
                "APP_CREDENTIAL_POLICY must be 'name_derived' or 'random' (got '{}')",
                value
            ),
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{} must be a boolean flag (got '{}')", key, value)
            }
            ConfigError::InvalidSessionTtl => {
                write!(f, "APP_SESSION_TTL_MINUTES must be a positive integer")
            }
            ConfigError::MissingAdminPassword => {
                write!(f, "APP_ADMIN_PASSWORD is required in production")
            }
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
