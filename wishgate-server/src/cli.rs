use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Command-line flags. Anything left unset falls back to the environment,
/// then the config file, then the built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(name = "wishgate", version, about = "Password-gated SSH server with a welcome banner")]
pub struct Args {
    /// TOML config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind to (defaults to 0.0.0.0)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (defaults to 23234)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Shared password every client must present
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Private host key (defaults to .ssh/id_ed25519)
    #[arg(long, value_name = "FILE")]
    pub host_key: Option<PathBuf>,

    /// Create an Ed25519 host key if the key file is missing
    #[arg(long, action = ArgAction::SetTrue)]
    pub generate_host_key: bool,

    /// File whose contents are shown before authentication
    #[arg(long, value_name = "FILE")]
    pub banner: Option<PathBuf>,

    /// Line printed once a session starts
    #[arg(long, value_name = "TEXT")]
    pub welcome: Option<String>,

    /// Seconds live sessions get to finish after SIGINT/SIGTERM
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = Args::try_parse_from([
            "wishgate",
            "--host",
            "127.0.0.1",
            "-p",
            "2200",
            "--password",
            "pw",
            "--generate-host-key",
            "--shutdown-timeout",
            "3",
        ])
        .unwrap();

        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(2200));
        assert_eq!(args.password.as_deref(), Some("pw"));
        assert!(args.generate_host_key);
        assert_eq!(args.shutdown_timeout, Some(3));
        assert!(args.config.is_none());
    }

    #[test]
    fn no_flags_means_no_overrides() {
        let args = Args::try_parse_from(["wishgate"]).unwrap();
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert!(!args.generate_host_key);
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert!(Args::try_parse_from(["wishgate", "--port", "70000"]).is_err());
    }
}
