use std::env;
use std::fmt;
use std::time::Duration;

use crate::constants::{DEFAULT_DATABASE_NAME, DEFAULT_TIMEOUT_SECS};

/// Bootstrap configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Administrative connection string
    pub mongodb_uri: String,
    pub database_name: String,
    pub app_user: String,
    pub app_password: String,
    pub timeout_secs: u64,
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_uri = lookup("MONGODB_URI").ok_or("MONGODB_URI must be set")?;
        if !mongodb_uri.starts_with("mongodb://") && !mongodb_uri.starts_with("mongodb+srv://") {
            return Err("MONGODB_URI must use the mongodb:// or mongodb+srv:// scheme".to_string());
        }

        let database_name =
            lookup("BOOTSTRAP_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
        if database_name.is_empty() || database_name.contains(['/', '\\', '.', ' ', '"', '$']) {
            return Err(format!("Invalid BOOTSTRAP_DATABASE: {:?}", database_name));
        }

        let app_user = lookup("APP_DB_USER").ok_or("APP_DB_USER must be set")?;
        if app_user.is_empty() {
            return Err("APP_DB_USER must not be empty".to_string());
        }

        let app_password = lookup("APP_DB_PASSWORD")
            .filter(|p| !p.is_empty())
            .ok_or("APP_DB_PASSWORD must be set to a non-empty value")?;

        let timeout_secs = lookup("BOOTSTRAP_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or("Invalid BOOTSTRAP_TIMEOUT_SECS")?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Config {
            mongodb_uri,
            database_name,
            app_user,
            app_password,
            timeout_secs,
            environment,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection string with the password masked, safe for logs
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.mongodb_uri)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mongodb_uri", &self.redacted_uri())
            .field("database_name", &self.database_name)
            .field("app_user", &self.app_user)
            .field("app_password", &"****")
            .field("timeout_secs", &self.timeout_secs)
            .field("environment", &self.environment)
            .finish()
    }
}

fn redact_uri(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end..];
    // Userinfo ends at the last '@' before the host list
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return uri.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}{}:****{}",
            &uri[..scheme_end],
            &userinfo[..colon],
            &rest[at..]
        ),
        None => uri.to_string(),
    }
}
