use anyhow::{anyhow, Result};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SCHEMA: &str = "public";

/// Process configuration, resolved once at startup and handed to every
/// handler through the router state. Nothing reads the environment during
/// a request.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub pg_conn_string: String,
    pub schema: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    fn resolve(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pg_conn_string = get("PG_CONN_STRING")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("PG_CONN_STRING environment variable not set"))?;

        Ok(Self {
            listen_addr: get("LISTEN_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned()),
            pg_conn_string,
            schema: get("PG_SCHEMA")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<_, _> = vars.iter().copied().collect();

        Config::resolve(|key| vars.get(key).map(|v| (*v).to_owned()))
    }

    #[test]
    fn requires_connection_string() {
        assert!(resolve(&[]).is_err());
        assert!(resolve(&[("PG_CONN_STRING", "")]).is_err());
    }

    #[test]
    fn applies_defaults() {
        let config = resolve(&[("PG_CONN_STRING", "postgres://localhost/app")]).unwrap();

        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.schema, DEFAULT_SCHEMA);
        assert_eq!(config.pg_conn_string, "postgres://localhost/app");
    }

    #[test]
    fn honors_overrides() {
        let config = resolve(&[
            ("PG_CONN_STRING", "postgres://localhost/app"),
            ("PG_SCHEMA", "tenant"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.schema, "tenant");
    }
}
