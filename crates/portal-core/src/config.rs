//! Portal configuration
//!
//! Settings come from environment variables. [`PortalConfig::from_lookup`]
//! takes any lookup function so tests can feed a map instead of the process
//! environment.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ENV_BASE_URL: &str = "SERVICENOW_BASE_URL";
pub const ENV_USERNAME: &str = "SERVICENOW_USERNAME";
pub const ENV_PASSWORD: &str = "SERVICENOW_PASSWORD";
pub const ENV_CLIENT_ID: &str = "SERVICENOW_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SERVICENOW_CLIENT_SECRET";
pub const ENV_USE_OAUTH: &str = "SERVICENOW_USE_OAUTH";
pub const ENV_HOST: &str = "PORTAL_HOST";
pub const ENV_STATIC_HOSTS: &str = "PORTAL_STATIC_HOSTS";
pub const ENV_SUBMITTED_BY: &str = "PORTAL_SUBMITTED_BY";
pub const ENV_PROXY_URL: &str = "PORTAL_PROXY_URL";

/// Domains that only serve static files; a front end hosted there has no
/// proxy to talk to.
pub const DEFAULT_STATIC_HOSTS: &[&str] = &["github.io"];

/// Basic-Auth credentials for the upstream instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// OAuth client settings. Parsed and reported, Basic-Auth stays the transport.
#[derive(Clone, Default)]
pub struct OAuthSettings {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub base_url: Option<String>,
    pub credentials: Option<Credentials>,
    pub oauth: OAuthSettings,
    /// Portal proxy in front of the instance. Takes precedence over a direct
    /// connection; the proxy holds the credentials.
    pub proxy_url: Option<String>,
    /// Hostname the front end is served from, if known.
    pub host: Option<String>,
    pub static_hosts: Vec<String>,
    pub submitted_by: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials: None,
            oauth: OAuthSettings::default(),
            proxy_url: None,
            host: None,
            static_hosts: DEFAULT_STATIC_HOSTS.iter().map(|h| h.to_string()).collect(),
            submitted_by: None,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (get(ENV_USERNAME), get(ENV_PASSWORD)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let static_hosts = get(ENV_STATIC_HOSTS)
            .map(|list| {
                list.split(',')
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_STATIC_HOSTS.iter().map(|h| h.to_string()).collect());

        Self {
            base_url: get(ENV_BASE_URL).map(|u| u.trim_end_matches('/').to_string()),
            credentials,
            oauth: OAuthSettings {
                enabled: get(ENV_USE_OAUTH).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false),
                client_id: get(ENV_CLIENT_ID),
                client_secret: get(ENV_CLIENT_SECRET),
            },
            proxy_url: get(ENV_PROXY_URL).map(|u| u.trim_end_matches('/').to_string()),
            host: get(ENV_HOST),
            static_hosts,
            submitted_by: get(ENV_SUBMITTED_BY),
        }
    }

    /// A proxy is configured, or base URL plus username and password are all
    /// present.
    pub fn has_upstream(&self) -> bool {
        self.proxy_url.is_some() || (self.base_url.is_some() && self.credentials.is_some())
    }

    pub fn is_static_host(&self) -> bool {
        let Some(host) = self.host.as_deref() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.static_hosts.iter().any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
    }

    /// Name recorded as the submitter of ledger entries.
    pub fn submitter(&self) -> String {
        self.submitted_by
            .clone()
            .or_else(|| self.credentials.as_ref().map(|c| c.username.clone()))
            .unwrap_or_else(|| "portal".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> PortalConfig {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PortalConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_full_upstream_settings() {
        let c = config(&[
            (ENV_BASE_URL, "https://acme.service-now.com/"),
            (ENV_USERNAME, "ext.portal"),
            (ENV_PASSWORD, "secret"),
        ]);
        assert!(c.has_upstream());
        assert_eq!(c.base_url.as_deref(), Some("https://acme.service-now.com"));
        assert_eq!(c.submitter(), "ext.portal");
    }

    #[test]
    fn test_missing_password_means_no_upstream() {
        let c = config(&[(ENV_BASE_URL, "https://acme.service-now.com"), (ENV_USERNAME, "ext.portal"), (ENV_PASSWORD, "  ")]);
        assert!(c.credentials.is_none());
        assert!(!c.has_upstream());
    }

    #[test]
    fn test_proxy_alone_is_enough() {
        let c = config(&[(ENV_PROXY_URL, "http://localhost:3001/")]);
        assert!(c.has_upstream());
        assert_eq!(c.proxy_url.as_deref(), Some("http://localhost:3001"));
    }

    #[test]
    fn test_static_host_detection() {
        let c = config(&[(ENV_HOST, "acme.github.io")]);
        assert!(c.is_static_host());

        let c = config(&[(ENV_HOST, "portal.acme.com")]);
        assert!(!c.is_static_host());

        let c = config(&[(ENV_HOST, "portal.acme.netlify.app"), (ENV_STATIC_HOSTS, "netlify.app, github.io")]);
        assert!(c.is_static_host());
    }

    #[test]
    fn test_oauth_toggle_and_redaction() {
        let c = config(&[(ENV_USE_OAUTH, "TRUE"), (ENV_CLIENT_ID, "abc"), (ENV_CLIENT_SECRET, "xyz"), (ENV_USERNAME, "u"), (ENV_PASSWORD, "hunter2")]);
        assert!(c.oauth.enabled);
        let debug = format!("{:?}", c);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("xyz"));
    }
}
