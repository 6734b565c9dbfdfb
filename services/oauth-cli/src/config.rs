//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The config file is optional. The client secret and the probe
//! authorization header are never read from TOML; they come from
//! `--client-secret` / `OAUTH_CLIENT_SECRET` and `--auth-header` /
//! `MCP_AUTH_HEADER` so they do not end up in a checked-in file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "mcp-oauth.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Defaults for the authorization request and token exchange
#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
}

/// Per-request timeouts, in seconds
#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_discovery_secs")]
    pub discovery_secs: u64,
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_token_secs")]
    pub token_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            discovery_secs: default_discovery_secs(),
            probe_secs: default_probe_secs(),
            token_secs: default_token_secs(),
        }
    }
}

fn default_discovery_secs() -> u64 {
    mcp_oauth::DISCOVERY_TIMEOUT.as_secs()
}

fn default_probe_secs() -> u64 {
    mcp_oauth::PROBE_TIMEOUT.as_secs()
}

fn default_token_secs() -> u64 {
    mcp_oauth::TOKEN_TIMEOUT.as_secs()
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if one was resolved, otherwise use defaults.
    pub fn load_optional(path: Option<&Path>) -> common::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> common::Result<()> {
        for (name, secs) in [
            ("discovery_secs", self.timeouts.discovery_secs),
            ("probe_secs", self.timeouts.probe_secs),
            ("token_secs", self.timeouts.token_secs),
        ] {
            if secs == 0 {
                return Err(common::Error::Config(format!(
                    "timeouts.{name} must be greater than 0"
                )));
            }
        }

        if let Some(uri) = &self.client.redirect_uri {
            if !has_scheme(uri) {
                return Err(common::Error::Config(format!(
                    "client.redirect_uri must start with a URL scheme, got: {uri}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve the config file path.
    ///
    /// 1. `--config` CLI arg
    /// 2. CONFIG_PATH env var
    /// 3. `mcp-oauth.toml` in the working directory, if it exists
    pub fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.discovery_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.token_secs)
    }
}

/// `scheme:` prefix per RFC 3986: a letter, then letters, digits, `+`, `-`, `.`.
fn has_scheme(uri: &str) -> bool {
    let Some((scheme, rest)) = uri.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    !rest.is_empty()
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that read or mutate CONFIG_PATH.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[client]
client_id = "agent-client"
redirect_uri = "http://localhost:3000/callback"
scope = "openid profile"

[timeouts]
discovery_secs = 2
probe_secs = 3
token_secs = 4
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.client.client_id.as_deref(), Some("agent-client"));
        assert_eq!(
            config.client.redirect_uri.as_deref(),
            Some("http://localhost:3000/callback")
        );
        assert_eq!(config.client.scope.as_deref(), Some("openid profile"));
        assert_eq!(config.discovery_timeout(), Duration::from_secs(2));
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.token_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();
        assert!(config.client.client_id.is_none());
        assert_eq!(config.discovery_timeout(), Duration::from_secs(5));
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.token_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_timeouts_keep_other_defaults() {
        let file = write_config("[timeouts]\ntoken_secs = 60\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.token_timeout(), Duration::from_secs(60));
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/mcp-oauth.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = write_config("not valid {{{{ toml");
        let result = Config::load(file.path());
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let file = write_config("[timeouts]\nprobe_secs = 0\n");
        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(
            err.contains("timeouts.probe_secs must be greater than 0"),
            "error message should name the field, got: {err}"
        );
    }

    #[test]
    fn test_redirect_uri_without_scheme_rejected() {
        let file = write_config("[client]\nredirect_uri = \"/callback\"\n");
        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("client.redirect_uri must start with a URL scheme"));
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("http://localhost:3000/callback"));
        assert!(has_scheme("com.example.app:/oauth"));
        assert!(!has_scheme("/callback"));
        assert!(!has_scheme("3http://x"));
        assert!(!has_scheme("http:"));
    }

    #[test]
    fn test_load_optional_without_path_is_default() {
        let config = Config::load_optional(None).unwrap();
        assert_eq!(config.token_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some(Path::new("/custom/path.toml")));
        assert_eq!(path, Some(PathBuf::from("/custom/path.toml")));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, Some(PathBuf::from("/env/path.toml")));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some(Path::new("/cli/wins.toml")));
        assert_eq!(
            path,
            Some(PathBuf::from("/cli/wins.toml")),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_without_default_file_is_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        // Tests run from the package directory, which has no mcp-oauth.toml
        assert!(!Path::new(DEFAULT_CONFIG_FILE).exists());
        assert_eq!(Config::resolve_path(None), None);
    }
}
