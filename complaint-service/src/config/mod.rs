use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub gmail: GmailConfig,
    pub gemini: GeminiConfig,
    pub reset_pass_ui_link: String,
    pub super_admin: Option<SuperAdminSeed>,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Token secrets and lifetimes (seconds).
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("reset_ttl_seconds", &self.reset_ttl_seconds)
            .finish()
    }
}

/// Argon2id work factors.
#[derive(Debug, Clone, Copy)]
pub struct PasswordConfig {
    pub hash_cost: u32,
    pub hash_memory_kib: u32,
}

#[derive(Clone)]
pub struct GmailConfig {
    pub user: String,
    pub app_password: String,
}

impl fmt::Debug for GmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailConfig")
            .field("user", &self.user)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone)]
pub struct SuperAdminSeed {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SuperAdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperAdminSeed")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let super_admin = match (
            env::var("SUPER_ADMIN_EMAIL").ok(),
            env::var("SUPER_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(SuperAdminSeed { email, password }),
            _ => None,
        };

        let config = ServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("complaint-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("janatar_obhijog"), is_prod)?,
            },
            jwt: JwtConfig {
                access_secret: get_env("JWT_ACCESS_SECRET", None, is_prod)?,
                refresh_secret: get_env("JWT_REFRESH_SECRET", None, is_prod)?,
                access_ttl_seconds: parse_duration(&get_env(
                    "JWT_ACCESS_EXPIRES_IN",
                    Some("1h"),
                    is_prod,
                )?)?,
                refresh_ttl_seconds: parse_duration(&get_env(
                    "JWT_REFRESH_EXPIRES_IN",
                    Some("7d"),
                    is_prod,
                )?)?,
                reset_ttl_seconds: parse_duration(&get_env(
                    "JWT_RESET_EXPIRES_IN",
                    Some("10m"),
                    false,
                )?)?,
            },
            password: PasswordConfig {
                hash_cost: get_env("PASSWORD_HASH_COST", Some("2"), false)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!("PASSWORD_HASH_COST: {}", e))
                    })?,
                hash_memory_kib: get_env("PASSWORD_HASH_MEMORY_KIB", Some("19456"), false)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!("PASSWORD_HASH_MEMORY_KIB: {}", e))
                    })?,
            },
            gmail: GmailConfig {
                user: get_env("EMAIL_SEND_USER_EMAIL", None, is_prod)?,
                app_password: get_env("EMAIL_SEND_USER_PASS", None, is_prod)?,
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
                model: get_env("GEMINI_MODEL", Some("gemini-1.5-flash"), false)?,
            },
            reset_pass_ui_link: get_env(
                "RESET_PASS_UI_LINK",
                Some("http://localhost:3000/reset-password"),
                is_prod,
            )?,
            super_admin,
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), false)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    false,
                )?
                .parse()
                .unwrap_or(900),
                password_reset_attempts: get_env(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    Some("3"),
                    false,
                )?
                .parse()
                .unwrap_or(3),
                password_reset_window_seconds: get_env(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    Some("3600"),
                    false,
                )?
                .parse()
                .unwrap_or(3600),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_secret.is_empty() || self.jwt.refresh_secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be set"
            )));
        }

        if self.jwt.access_secret == self.jwt.refresh_secret {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ"
            )));
        }

        if self.jwt.access_ttl_seconds <= 0
            || self.jwt.refresh_ttl_seconds <= 0
            || self.jwt.reset_ttl_seconds <= 0
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token lifetimes must be positive"
            )));
        }

        if self.password.hash_cost == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_HASH_COST must be at least 1"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.jwt.access_secret.len() < 32 {
                tracing::warn!("JWT_ACCESS_SECRET is shorter than 32 bytes");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Parses lifetimes such as `15m`, `1h`, `7d`, `30s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    let invalid = || AppError::ConfigError(anyhow::anyhow!("Invalid duration: '{}'", raw));

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: i64 = digits.parse().map_err(|_| invalid())?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    value.checked_mul(multiplier).ok_or_else(invalid)
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
