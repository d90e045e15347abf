// config.rs
// Runtime configuration read from the environment (after dotenvy loads .env).

use std::{env, net::SocketAddr};

use anyhow::{Context, Result};

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub bind_addr: SocketAddr,
    pub users_file: String,
    pub roster_file: String,
    pub typst_bin: String,
    pub session_ttl_seconds: u64,
    /// Society name: TOTP issuer and report heading.
    pub sacco_name: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bind_addr = get("BIND_ADDR", "0.0.0.0:8080")
            .parse::<SocketAddr>()
            .context("BIND_ADDR must look like 0.0.0.0:8080")?;

        let session_ttl_seconds = match lookup("SESSION_TTL_SECONDS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u64>()
                .context("SESSION_TTL_SECONDS must be a positive integer")?,
            _ => DEFAULT_SESSION_TTL_SECONDS,
        };

        Ok(Self {
            mongodb_uri: get("MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_db: get("MONGODB_DB", "sacco"),
            bind_addr,
            users_file: get("USERS_FILE", "./data/users.json"),
            roster_file: get("ROSTER_FILE", "./data/default_members.json"),
            typst_bin: get("TYPST_BIN", "typst"),
            session_ttl_seconds,
            sacco_name: get("SACCO_NAME", "MITEWA"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(cfg.mongodb_db, "sacco");
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.session_ttl_seconds, DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(cfg.sacco_name, "MITEWA");
    }

    #[test]
    fn overrides_and_blank_values() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("MONGODB_DB", "coop_test"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("SESSION_TTL_SECONDS", "600"),
            ("TYPST_BIN", "   "),
        ]))
        .unwrap();
        assert_eq!(cfg.mongodb_db, "coop_test");
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(cfg.session_ttl_seconds, 600);
        assert_eq!(cfg.typst_bin, "typst");
    }

    #[test]
    fn bad_bind_addr_is_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("BIND_ADDR", "nope")])).is_err());
    }
}
