//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the forum can start with zero configuration
//! for local development. The default credentials are logged as a warning at
//! startup.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use forum_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT};

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASS: &str = "changeme";
pub const DEFAULT_SESSION_SECRET: &str = "change-this-secret-in-production";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP server.
    /// Env: `HTTP_ADDR`, with `PORT` overriding just the port.
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DB_PATH`
    /// Default: `./forum.db`
    pub db_path: PathBuf,

    /// Env: `ADMIN_USER`
    pub admin_user: String,

    /// Env: `ADMIN_PASS`
    pub admin_pass: String,

    /// Secret the admin session cookie is derived from. Changing it logs
    /// every admin out.
    /// Env: `SESSION_SECRET`
    pub session_secret: String,

    /// Title shown in page headers.
    /// Env: `FORUM_NAME`
    pub forum_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: PathBuf::from("./forum.db"),
            admin_user: DEFAULT_ADMIN_USER.to_string(),
            admin_pass: DEFAULT_ADMIN_PASS.to_string(),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            forum_name: APP_NAME.to_string(),
        }
    }
}

// Secrets stay out of the startup log.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("db_path", &self.db_path)
            .field("admin_user", &self.admin_user)
            .field("admin_pass", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("forum_name", &self.forum_name)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, ignoring"),
            }
        }

        if let Some(path) = var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(user) = var("ADMIN_USER") {
            config.admin_user = user;
        }
        if let Some(pass) = var("ADMIN_PASS") {
            config.admin_pass = pass;
        }
        if let Some(secret) = var("SESSION_SECRET") {
            config.session_secret = secret;
        }
        if let Some(name) = var("FORUM_NAME") {
            config.forum_name = name;
        }

        config
    }

    /// Names of the settings still at their insecure defaults.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.admin_pass == DEFAULT_ADMIN_PASS {
            names.push("ADMIN_PASS");
        }
        if self.session_secret == DEFAULT_SESSION_SECRET {
            names.push("SESSION_SECRET");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.db_path, PathBuf::from("./forum.db"));
        assert_eq!(config.admin_user, "admin");
        assert_eq!(
            config.insecure_defaults(),
            vec!["ADMIN_PASS", "SESSION_SECRET"]
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DB_PATH", "/tmp/f.db"),
            ("ADMIN_PASS", "s3cret"),
            ("SESSION_SECRET", "k"),
            ("FORUM_NAME", "Ops"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.db_path, PathBuf::from("/tmp/f.db"));
        assert_eq!(config.forum_name, "Ops");
        assert!(config.insecure_defaults().is_empty());
    }

    #[test]
    fn test_port_overrides_addr_port() {
        let config = from_pairs(&[("HTTP_ADDR", "127.0.0.1:9000"), ("PORT", "3000")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 3000).into());
    }

    #[test]
    fn test_invalid_and_blank_values_ignored() {
        let config = from_pairs(&[("HTTP_ADDR", "nope"), ("PORT", "x"), ("ADMIN_USER", "  ")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.admin_user, "admin");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_pairs(&[("ADMIN_PASS", "hunter2"), ("SESSION_SECRET", "topsecret")]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("<redacted>"));
    }
}
