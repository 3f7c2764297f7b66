//! Command-line interface for ipc-sim.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::parse_shm_key;

/// Command-line arguments.
///
/// Options left unset do not override the config file or environment.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Shared-memory payload capacity in bytes.
    pub shm_capacity: Option<usize>,
    /// System V key for the shared-memory segment.
    pub shm_key: Option<i32>,
    /// Skip stale segment reclamation at start-up.
    pub no_reclaim: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
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
            Long("shm-capacity") => {
                let value: String = parser.value()?.parse()?;
                match value.parse::<usize>() {
                    Ok(n) if n > 0 => result.shm_capacity = Some(n),
                    _ => return Err(ArgsError::InvalidValue("shm-capacity", value)),
                }
            }
            Long("shm-key") => {
                let value: String = parser.value()?.parse()?;
                result.shm_key =
                    Some(parse_shm_key(&value).ok_or(ArgsError::InvalidValue("shm-key", value))?);
            }
            Long("no-reclaim") => {
                result.no_reclaim = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
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
        r#"ipc-sim {version}
HTTP service simulating shared-memory and pipe interprocess communication

USAGE:
    ipc-sim [OPTIONS]

OPTIONS:
    -H, --host <ADDR>         Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>         Port to listen on [default: 8000]
    -c, --config <FILE>       Path to configuration file (JSON)
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
        --shm-capacity <N>    Shared-memory payload capacity in bytes [default: 1024]
        --shm-key <KEY>       System V key for the segment (decimal or 0x hex)
        --no-reclaim          Do not remove stale segments at start-up
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    IPC_SIM_HOST              Host address (overrides config)
    IPC_SIM_PORT              Port number (overrides config)
    IPC_SIM_SHM_KEY           System V key (overrides config)
    IPC_SIM_READ_TIMEOUT_MS   Pipe read timeout, capped at 5000
    IPC_SIM_LOG_LEVEL         Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:8000)
    ipc-sim

    # Start on all interfaces with a larger segment
    ipc-sim -H 0.0.0.0 -p 8080 --shm-capacity 4096

    # Start with config file
    ipc-sim -c /etc/ipc-sim/config.json

    # Then drive a session
    curl 'http://127.0.0.1:8000/simulate/shared_memory/init'
    curl 'http://127.0.0.1:8000/simulate/shared_memory/write?message=Hello'
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("ipc-sim {}", env!("CARGO_PKG_VERSION"));
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
