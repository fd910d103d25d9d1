//! # Configuration
//!
//! Process configuration, read from the environment (each value can also be given as a flag).
//!
//! | Variable | Flag | Default |
//! |----------|------|---------|
//! | `PORT` | `--port` | required |
//! | `DIAG_PORT` | `--diag-port` | required |
//! | `VERIFY_PORT` | `--verify-port` | unset: `/rent` calls its own `/check` |
//! | `BIND_HOST` | `--bind-host` | `0.0.0.0` |
//! | `DEPENDENCY_TIMEOUT_MS` | `--dependency-timeout-ms` | `3000` |
//! | `SHUTDOWN_TIMEOUT_SECS` | `--shutdown-timeout-secs` | `5` |

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Errors that prevent the process from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required input is missing or a value does not parse.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// Two runtimes were asked to listen on the same port.
    #[error("{first} and {second} must use different ports, both are {port}")]
    PortConflict {
        first: &'static str,
        second: &'static str,
        port: u16,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "observability-recipe", version)]
#[command(about = "Business and diagnostics runtimes under one supervisor", long_about = None)]
pub struct Config {
    /// Port of the business-logic runtime (`/rent`, `/check`)
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Port of the diagnostics runtime (`/health`, `/metrics`)
    #[arg(long, env = "DIAG_PORT")]
    pub diag_port: u16,

    /// Port of a standalone `/check` runtime; `/rent` calls it instead of its own `/check`
    #[arg(long, env = "VERIFY_PORT")]
    pub verify_port: Option<u16>,

    /// Interface every runtime binds to
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    /// Timeout of the dependent `/check` call, in milliseconds
    #[arg(long, env = "DEPENDENCY_TIMEOUT_MS", default_value_t = 3000)]
    pub dependency_timeout_ms: u64,

    /// Time allowed for draining every runtime on shutdown, in seconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Reads the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    /// Parses `args` (first item is the program name), falling back to the environment.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut ports = vec![("PORT", self.port), ("DIAG_PORT", self.diag_port)];
        if let Some(verify_port) = self.verify_port {
            ports.push(("VERIFY_PORT", verify_port));
        }

        for (i, &(first, port)) in ports.iter().enumerate() {
            // Port 0 asks the OS for a fresh port each time, so it never conflicts.
            if port == 0 {
                continue;
            }
            if let Some(&(second, _)) = ports[i + 1..].iter().find(|(_, other)| *other == port) {
                return Err(ConfigError::PortConflict {
                    first,
                    second,
                    port,
                });
            }
        }
        Ok(())
    }

    pub fn business_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }

    pub fn diagnostics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.diag_port)
    }

    pub fn verify_addr(&self) -> Option<SocketAddr> {
        self.verify_port
            .map(|port| SocketAddr::new(self.bind_host, port))
    }

    /// Base URL `/rent` sends its `/check` call to, always over loopback.
    pub fn verify_base_url(&self) -> String {
        let port = self.verify_port.unwrap_or(self.port);
        format!("http://{}", SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port))
    }

    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    pub fn shutdown_budget(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
