use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Placeholder JWT secrets that must not reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("FITLINK_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into());
        let db_path = lookup("FITLINK_DB_PATH").unwrap_or_else(|| "fitlink.db".into()).into();
        let host = lookup("FITLINK_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("FITLINK_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("FITLINK_PORT is not a port number: {}", raw))?,
            None => 3000,
        };

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().with_context(|| format!("invalid listen address {}", addr))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("fitlink.db"));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
        assert!(config.uses_placeholder_secret());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FITLINK_JWT_SECRET", "s3cr3t-for-real"),
            ("FITLINK_HOST", "127.0.0.1"),
            ("FITLINK_PORT", "8080"),
            ("FITLINK_DB_PATH", "/var/lib/fitlink/fitlink.db"),
        ]))
        .unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/fitlink/fitlink.db"));
        assert!(!config.uses_placeholder_secret());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::from_lookup(lookup(&[("FITLINK_PORT", "eighty")])).is_err());
    }
}
