use crate::cli::Args;
use crate::error::ConfigError;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wishgate_core::Password;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 23234;
pub const DEFAULT_HOST_KEY_PATH: &str = ".ssh/id_ed25519";
pub const DEFAULT_WELCOME: &str = "Welcome you are in the system.";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,                       // e.g. "0.0.0.0"
    pub port: u16,                          // e.g. 23234
    pub password: Password,
    pub host_key_path: PathBuf,             // e.g. ".ssh/id_ed25519"
    pub banner_path: Option<PathBuf>,       // bundled banner when unset
    pub welcome: String,
    pub shutdown_timeout_secs: u64,
    pub idle_timeout_secs: u64,             // 0 disables
    pub auth_rejection_ms: u64,
    pub max_auth_attempts: usize,
    pub generate_host_key: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: Password::default(),
            host_key_path: PathBuf::from(DEFAULT_HOST_KEY_PATH),
            banner_path: None,
            welcome: DEFAULT_WELCOME.to_string(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            idle_timeout_secs: 600,
            auth_rejection_ms: 1000,
            max_auth_attempts: 10,
            generate_host_key: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional `--config` file, then `.env`/environment, then flags.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let base = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        let _ = dotenvy::from_filename(".env");
        let mut cfg = base.with_env(|key| std::env::var(key).ok())?;
        cfg.apply_args(args);
        Ok(cfg)
    }

    /// Overlay `WISHGATE_*` variables looked up through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WISHGATE_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("WISHGATE_PORT") {
            self.port = parse_env("WISHGATE_PORT", &v)?;
        }
        if let Some(v) = lookup("WISHGATE_PASSWORD") {
            self.password = Password::new(v);
        }
        if let Some(v) = lookup("WISHGATE_HOST_KEY") {
            self.host_key_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("WISHGATE_BANNER") {
            self.banner_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("WISHGATE_WELCOME") {
            self.welcome = v;
        }
        if let Some(v) = lookup("WISHGATE_SHUTDOWN_TIMEOUT") {
            self.shutdown_timeout_secs = parse_env("WISHGATE_SHUTDOWN_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("WISHGATE_IDLE_TIMEOUT") {
            self.idle_timeout_secs = parse_env("WISHGATE_IDLE_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("WISHGATE_AUTH_REJECTION_MS") {
            self.auth_rejection_ms = parse_env("WISHGATE_AUTH_REJECTION_MS", &v)?;
        }
        if let Some(v) = lookup("WISHGATE_MAX_AUTH_ATTEMPTS") {
            self.max_auth_attempts = parse_env("WISHGATE_MAX_AUTH_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("WISHGATE_GENERATE_HOST_KEY") {
            self.generate_host_key = parse_env("WISHGATE_GENERATE_HOST_KEY", &v)?;
        }
        Ok(self)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(password) = &args.password {
            self.password = Password::new(password.as_str());
        }
        if let Some(path) = &args.host_key {
            self.host_key_path = path.clone();
        }
        if let Some(path) = &args.banner {
            self.banner_path = Some(path.clone());
        }
        if let Some(welcome) = &args.welcome {
            self.welcome = welcome.clone();
        }
        if let Some(secs) = args.shutdown_timeout {
            self.shutdown_timeout_secs = secs;
        }
        if args.generate_host_key {
            self.generate_host_key = true;
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn listen_addr(&self) -> Result<String, ConfigError> {
        let host = self.host.trim();
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(match ip {
                IpAddr::V4(_) => format!("{ip}:{}", self.port),
                IpAddr::V6(_) => format!("[{ip}]:{}", self.port),
            });
        }

        let valid_hostname = !host.is_empty()
            && host
                .split('.')
                .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        if !valid_hostname {
            return Err(ConfigError::InvalidAddress(self.host.clone()));
        }

        Ok(format!("{host}:{}", self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn auth_rejection_time(&self) -> Duration {
        Duration::from_millis(self.auth_rejection_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv(key.to_string(), value.to_string()))
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_the_documented_ones() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr().unwrap(), "0.0.0.0:23234");
        assert!(cfg.password.matches("test"));
        assert_eq!(cfg.host_key_path, PathBuf::from(".ssh/id_ed25519"));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.welcome, "Welcome you are in the system.");
        assert!(!cfg.generate_host_key);
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = Config::default()
            .with_env(env(&[
                ("WISHGATE_HOST", "127.0.0.1"),
                ("WISHGATE_PORT", "2222"),
                ("WISHGATE_PASSWORD", "s3cret"),
                ("WISHGATE_SHUTDOWN_TIMEOUT", "5"),
                ("WISHGATE_GENERATE_HOST_KEY", "true"),
            ]))
            .unwrap();

        assert_eq!(cfg.listen_addr().unwrap(), "127.0.0.1:2222");
        assert!(cfg.password.matches("s3cret"));
        assert!(!cfg.password.matches("test"));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(5));
        assert!(cfg.generate_host_key);
    }

    #[test]
    fn env_sets_auth_throttling() {
        let cfg = Config::default()
            .with_env(env(&[
                ("WISHGATE_AUTH_REJECTION_MS", "250"),
                ("WISHGATE_MAX_AUTH_ATTEMPTS", "3"),
            ]))
            .unwrap();

        assert_eq!(cfg.auth_rejection_time(), Duration::from_millis(250));
        assert_eq!(cfg.max_auth_attempts, 3);

        let err = Config::default()
            .with_env(env(&[("WISHGATE_MAX_AUTH_ATTEMPTS", "-1")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv(ref k, _) if k == "WISHGATE_MAX_AUTH_ATTEMPTS"));
    }

    #[test]
    fn bad_env_port_is_rejected() {
        let err = Config::default()
            .with_env(env(&[("WISHGATE_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv(ref k, _) if k == "WISHGATE_PORT"));
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            port = 4022
            password = "letmein"
            banner_path = "motd.txt"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4022);
        assert!(cfg.password.matches("letmein"));
        assert_eq!(cfg.banner_path, Some(PathBuf::from("motd.txt")));
        assert_eq!(cfg.shutdown_timeout_secs, 30);
    }

    #[test]
    fn listen_addr_brackets_ipv6() {
        let cfg = Config { host: "::1".into(), port: 22, ..Config::default() };
        assert_eq!(cfg.listen_addr().unwrap(), "[::1]:22");
    }

    #[test]
    fn listen_addr_rejects_garbage() {
        for host in ["", "no spaces", "bad..host", "a:b:c:zz"] {
            let cfg = Config { host: host.into(), ..Config::default() };
            assert!(cfg.listen_addr().is_err(), "{host:?} should be rejected");
        }

        let cfg = Config { host: "localhost".into(), ..Config::default() };
        assert_eq!(cfg.listen_addr().unwrap(), "localhost:23234");
    }

    #[test]
    fn zero_idle_timeout_disables_it() {
        let cfg = Config { idle_timeout_secs: 0, ..Config::default() };
        assert_eq!(cfg.idle_timeout(), None);
    }

    #[test]
    fn flags_win_over_env() {
        let mut cfg = Config::default()
            .with_env(env(&[("WISHGATE_PORT", "2222")]))
            .unwrap();
        let args = Args {
            port: Some(3333),
            generate_host_key: true,
            ..Args::default()
        };
        cfg.apply_args(&args);

        assert_eq!(cfg.port, 3333);
        assert!(cfg.generate_host_key);
        assert_eq!(cfg.host, "0.0.0.0");
    }
}
