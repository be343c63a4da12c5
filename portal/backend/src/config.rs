//! Server settings

use portal_core::{Credentials, PortalConfig, PortalError};
use std::path::PathBuf;

pub const ENV_PORT: &str = "PORT";
pub const ENV_CORS_ORIGIN: &str = "CORS_ORIGIN";
pub const ENV_STATIC_DIR: &str = "PORTAL_STATIC_DIR";

pub const DEFAULT_PORT: u16 = 3001;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// `*` allows any origin.
    pub cors_origin: String,
    /// Built front end to serve, with `index.html` as the SPA fallback.
    pub static_dir: Option<PathBuf>,
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub portal: PortalConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, PortalError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PortalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let portal = PortalConfig::from_lookup(&lookup);
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = portal
            .base_url
            .clone()
            .ok_or_else(|| PortalError::Config("SERVICENOW_BASE_URL must be set".to_string()))?;

        let port = match get(ENV_PORT) {
            Some(raw) => raw
                .parse()
                .map_err(|_| PortalError::Config(format!("PORT is not a valid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            cors_origin: get(ENV_CORS_ORIGIN).unwrap_or_else(|| "*".to_string()),
            static_dir: get(ENV_STATIC_DIR).map(PathBuf::from),
            base_url,
            credentials: portal.credentials.clone(),
            portal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::config::{ENV_BASE_URL, ENV_PASSWORD, ENV_USERNAME};
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, PortalError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[(ENV_BASE_URL, "https://acme.service-now.com/")]).unwrap();
        assert_eq!(c.port, 3001);
        assert_eq!(c.cors_origin, "*");
        assert_eq!(c.base_url, "https://acme.service-now.com");
        assert!(c.credentials.is_none());
        assert!(c.static_dir.is_none());
    }

    #[test]
    fn test_base_url_is_required() {
        assert!(matches!(config(&[(ENV_USERNAME, "u")]), Err(PortalError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            (ENV_BASE_URL, "https://acme.service-now.com"),
            (ENV_USERNAME, "ext.portal"),
            (ENV_PASSWORD, "pw"),
            (ENV_PORT, "8088"),
            (ENV_CORS_ORIGIN, "https://portal.acme.com"),
            (ENV_STATIC_DIR, "/srv/portal"),
        ])
        .unwrap();
        assert_eq!(c.port, 8088);
        assert_eq!(c.cors_origin, "https://portal.acme.com");
        assert_eq!(c.static_dir, Some(PathBuf::from("/srv/portal")));
        assert_eq!(c.credentials.unwrap().username, "ext.portal");
    }

    #[test]
    fn test_bad_port() {
        let err = config(&[(ENV_BASE_URL, "https://acme.service-now.com"), (ENV_PORT, "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
