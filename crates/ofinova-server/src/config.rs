//! Server Configuration

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_APP_BASE_URL: &str = "https://spectacular-millions-373411.framer.app";
pub const DEFAULT_SITE_URL: &str = "https://ofinova-madrid.es";

/// Process-level settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Landing page hosting the contract checkout
    pub app_base_url: String,

    /// Public site the mail add-on returns to
    pub site_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `SITE_URL` falls back to an explicit `APP_BASE_URL`, then the public site
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let app_base_url = present("APP_BASE_URL");
        Self {
            bind_addr: present("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            site_url: present("SITE_URL")
                .or_else(|| app_base_url.clone())
                .unwrap_or_else(|| DEFAULT_SITE_URL.into()),
            app_base_url: app_base_url.unwrap_or_else(|| DEFAULT_APP_BASE_URL.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.app_base_url, DEFAULT_APP_BASE_URL);
        assert_eq!(config.site_url, "https://ofinova-madrid.es");
    }

    #[test]
    fn test_site_url_falls_back_to_app_base_url() {
        let config = ServerConfig::from_lookup(|key| (key == "APP_BASE_URL").then(|| "https://landing.test".into()));
        assert_eq!(config.app_base_url, "https://landing.test");
        assert_eq!(config.site_url, "https://landing.test");

        let config = ServerConfig::from_lookup(|key| match key {
            "APP_BASE_URL" => Some("https://landing.test".into()),
            "SITE_URL" => Some("https://site.test".into()),
            _ => None,
        });
        assert_eq!(config.site_url, "https://site.test");
    }
}
