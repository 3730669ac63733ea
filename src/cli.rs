//! Command-line interface for wake-warden.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every option is optional here; unset options fall through to the
/// environment, the config file, and finally the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Handoff script invoked on activate/deactivate.
    pub bridge: Option<PathBuf>,
    /// File receiving one line per shutdown.
    pub shutdown_log: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Shorthand for debug-level logging; an explicit level wins.
    pub verbose: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("bridge") => {
                result.bridge = Some(parser.value()?.parse()?);
            }
            Long("shutdown-log") => {
                result.shutdown_log = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('v') | Long("verbose") => {
                result.verbose = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"wake-warden {version}
UDP heartbeat warden with a wake/sleep lifecycle handoff

USAGE:
    wake-warden [OPTIONS]

OPTIONS:
    -H, --host <ADDR>         Host address to bind [default: 0.0.0.0]
    -p, --port <PORT>         Port to listen on [default: 46317]
    -c, --config <FILE>       Path to configuration file (JSON)
    -b, --bridge <FILE>       Handoff script invoked on activate/deactivate
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
    -v, --verbose             Shorthand for --log-level debug
        --shutdown-log <FILE> Append one line per shutdown to this file
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    WAKE_WARDEN_HOST       Host address (overrides config)
    WAKE_WARDEN_PORT       Port number (overrides config)
    WAKE_WARDEN_BRIDGE     Handoff script path (overrides config)
    WAKE_WARDEN_LOG_LEVEL  Log level (overrides config)
    RUST_LOG               Alternative log level setting

EXAMPLES:
    # Listen on the default port with no handoff script
    wake-warden

    # Production setup: handoff script plus shutdown journal
    wake-warden -b /usr/local/bin/handoff.sh --shutdown-log /var/log/wake-warden.log

    # Start with config file
    wake-warden -c /etc/wake-warden/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("wake-warden {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("wake-warden")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert_eq!(result.host, None);
        assert_eq!(result.port, None);
        assert!(!result.help);
        assert!(!result.version);
    }

    #[test]
    fn test_host_port() {
        let result = parse_args_from(args(&["-H", "0.0.0.0", "-p", "8080"])).unwrap();
        assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
        assert_eq!(result.port, Some(8080));
    }

    #[test]
    fn test_long_options() {
        let result =
            parse_args_from(args(&["--host", "192.168.1.1", "--port", "9000"])).unwrap();
        assert_eq!(result.host.unwrap().to_string(), "192.168.1.1");
        assert_eq!(result.port, Some(9000));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_bridge_script() {
        let result = parse_args_from(args(&["-b", "/usr/local/bin/handoff.sh"])).unwrap();
        assert_eq!(result.bridge, Some(PathBuf::from("/usr/local/bin/handoff.sh")));
    }

    #[test]
    fn test_shutdown_log() {
        let result = parse_args_from(args(&["--shutdown-log", "/var/log/warden.log"])).unwrap();
        assert_eq!(result.shutdown_log, Some(PathBuf::from("/var/log/warden.log")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_verbose_flag() {
        let result = parse_args_from(args(&["-v"])).unwrap();
        assert!(result.verbose);
        assert_eq!(result.log_level, None);

        let result = parse_args_from(args(&["--verbose"])).unwrap();
        assert!(result.verbose);
    }

    #[test]
    fn test_invalid_port() {
        let result = parse_args_from(args(&["-p", "invalid"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_host() {
        let result = parse_args_from(args(&["-H", "not-an-ip"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unexpected_positional() {
        let result = parse_args_from(args(&["stray"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_combined_options() {
        let result = parse_args_from(args(&[
            "-H",
            "0.0.0.0",
            "-p",
            "46317",
            "-b",
            "/opt/handoff.sh",
            "-l",
            "debug",
        ]))
        .unwrap();

        assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
        assert_eq!(result.port, Some(46317));
        assert_eq!(result.bridge, Some(PathBuf::from("/opt/handoff.sh")));
        assert_eq!(result.log_level, Some("debug".to_string()));
    }
}
