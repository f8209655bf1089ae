use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub mode: Deployment,
    #[serde(default = "default_publicdir")]
    pub publicdir: String,
    #[serde(default)]
    pub trust_proxy: bool,
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub logformat: LogFormat,
    #[serde(default)]
    pub douban: DoubanConfig,
    #[serde(skip)]
    pub debug_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// How the assembled pipeline is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deployment {
    /// Bind a TCP port ourselves.
    #[default]
    Standalone,
    /// A managed host (AWS Lambda) invokes the pipeline per request.
    HostManaged,
}

impl Deployment {
    /// `NODE_ENV=production` means some platform runs us.
    pub fn from_node_env(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Deployment::HostManaged
        } else {
            Deployment::Standalone
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DoubanConfig {
    #[serde(default = "default_douban_baseurl")]
    pub baseurl: String,
    #[serde(default)]
    pub apikey: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DoubanConfig {
    fn default() -> Self {
        Self {
            baseurl: default_douban_baseurl(),
            apikey: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            mode: Deployment::default(),
            publicdir: default_publicdir(),
            trust_proxy: false,
            body_limit: default_body_limit(),
            service_name: default_service_name(),
            logformat: LogFormat::default(),
            douban: DoubanConfig::default(),
            debug_logs: false,
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_publicdir() -> String {
    "public".to_string()
}

fn default_body_limit() -> usize {
    100 * 1024
}

fn default_service_name() -> String {
    "Douban Movie MCP Service".to_string()
}

fn default_douban_baseurl() -> String {
    "https://api.douban.com/v2/movie".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_string(), e))?;

        Ok(config)
    }

    /// Optional YAML file, then the process environment on top.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment variables. `lookup` is injected so
    /// tests don't have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.listen.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT", port))?;
        }
        if let Some(host) = lookup("HOST") {
            self.listen.address = host;
        }
        if let Some(env) = lookup("NODE_ENV") {
            self.mode = Deployment::from_node_env(&env);
        }
        if let Some(dir) = lookup("PUBLIC_DIR") {
            self.publicdir = dir;
        }
        if let Some(trust) = lookup("TRUST_PROXY") {
            self.trust_proxy = parse_bool(&trust)
                .ok_or(ConfigError::InvalidValue("TRUST_PROXY", trust))?;
        }
        if let Some(base) = lookup("DOUBAN_API_BASE") {
            self.douban.baseurl = base;
        }
        if let Some(key) = lookup("DOUBAN_API_KEY") {
            self.douban.apikey = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.douban.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("UPSTREAM_TIMEOUT_SECS", secs))?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logformat = LogFormat::parse(&format);
        }
        Ok(())
    }

    pub fn public_dir(&self) -> PathBuf {
        PathBuf::from(&self.publicdir)
    }

    /// Base URL for the startup banner.
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.listen.port)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen.port, 3000);
        assert_eq!(config.mode, Deployment::Standalone);
        assert_eq!(config.publicdir, "public");
        assert_eq!(config.douban.timeout_secs, 10);
        assert_eq!(config.local_url(), "http://localhost:3000");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PORT", "8080"),
                ("NODE_ENV", "production"),
                ("DOUBAN_API_KEY", "abc"),
                ("TRUST_PROXY", "true"),
                ("LOG_FORMAT", "JSON"),
            ]))
            .unwrap();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.mode, Deployment::HostManaged);
        assert_eq!(config.douban.apikey.as_deref(), Some("abc"));
        assert!(config.trust_proxy);
        assert_eq!(config.logformat, LogFormat::Json);
    }

    #[test]
    fn test_node_env_other_values_stay_standalone() {
        assert_eq!(Deployment::from_node_env("development"), Deployment::Standalone);
        assert_eq!(Deployment::from_node_env(" Production "), Deployment::HostManaged);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("PORT", _)));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
listen:
  port: 4000
mode: host-managed
publicdir: /srv/www
douban:
  baseurl: http://127.0.0.1:9999/v2/movie
  timeout_secs: 3
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port, 4000);
        assert_eq!(config.listen.address, "0.0.0.0");
        assert_eq!(config.mode, Deployment::HostManaged);
        assert_eq!(config.publicdir, "/srv/www");
        assert_eq!(config.douban.timeout_secs, 3);
        assert!(config.douban.apikey.is_none());
        assert_eq!(config.body_limit, 100 * 1024);
    }
}
