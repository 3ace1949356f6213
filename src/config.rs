// src/config.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::core::orchestrator::Orchestrator;
use crate::core::probes::{DEFAULT_PORTS, ProbeSettings, default_catalogue};
use crate::server::adapter::Platform;

/// vanguard-webcheck: run a catalogue of independent checks against a URL or IP address.
#[derive(Debug, Clone, Parser)]
#[command(name = "vanguard-webcheck", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Interactive terminal UI (default).
    Tui,
    /// Scan one address without the UI and print the final report.
    Scan {
        address: String,
        /// Print the report as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Serve the per-job and aggregate HTTP endpoints.
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
}

/// Settings shared by every subcommand. Each flag can also come from the environment.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Remote deadline for a single probe, in milliseconds.
    #[arg(long = "timeout-ms", env = "API_TIMEOUT_LIMIT", default_value_t = 60_000, global = true)]
    pub timeout_ms: u64,

    /// Local watchdog for a scan session, in milliseconds.
    #[arg(long = "watchdog-ms", env = "WATCHDOG_TIMEOUT_MS", default_value_t = 10_000, global = true)]
    pub watchdog_ms: u64,

    /// Per-job ceiling used by the aggregate endpoint, in milliseconds.
    #[arg(
        long = "aggregate-timeout-ms",
        env = "AGGREGATE_TIMEOUT_LIMIT",
        default_value_t = 20_000,
        global = true
    )]
    pub aggregate_timeout_ms: u64,

    /// Allowed CORS origin; `*` allows any.
    #[arg(long = "cors-origin", env = "API_CORS_ORIGIN", default_value = "*", global = true)]
    pub cors_origin: String,

    /// Kill switch: answer every request with 503 and skip every job.
    #[arg(long = "disable-everything", env = "DISABLE_EVERYTHING", default_value_t = false, global = true)]
    pub disable_everything: bool,

    /// Calling convention of the HTTP surface.
    #[arg(long, env = "PLATFORM", value_enum, default_value_t = Platform::Native, global = true)]
    pub platform: Platform,

    /// Comma separated ports tried by the `ports` job.
    #[arg(long, env = "PORTS_TO_CHECK", value_delimiter = ',', global = true)]
    pub ports: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            watchdog_ms: 10_000,
            aggregate_timeout_ms: 20_000,
            cors_origin: "*".into(),
            disable_everything: false,
            platform: Platform::Native,
            ports: Vec::new(),
        }
    }
}

impl Config {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_millis(self.aggregate_timeout_ms)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        let ports = if self.ports.is_empty() {
            DEFAULT_PORTS.to_vec()
        } else {
            self.ports.clone()
        };
        ProbeSettings { ports, ..ProbeSettings::default() }
    }

    /// An orchestrator over the built-in catalogue with these settings applied.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(Arc::new(default_catalogue(&self.probe_settings())))
            .with_remote_timeout(self.remote_timeout())
            .with_watchdog(self.watchdog())
            .with_disabled(self.disable_everything)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let cli = Cli::try_parse_from(["vanguard-webcheck"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config.remote_timeout(), Duration::from_secs(60));
        assert_eq!(cli.config.watchdog(), Duration::from_secs(10));
        assert_eq!(cli.config.aggregate_timeout(), Duration::from_secs(20));
        assert_eq!(cli.config.platform, Platform::Native);
    }

    #[test]
    fn flags_and_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "vanguard-webcheck",
            "scan",
            "example.com",
            "--json",
            "--ports",
            "80,443",
            "--platform",
            "callback",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Scan { ref address, json: true }) if address == "example.com"));
        assert_eq!(cli.config.probe_settings().ports, vec![80, 443]);
        assert_eq!(cli.config.platform, Platform::Callback);
    }

    #[test]
    fn empty_port_list_falls_back_to_builtin() {
        assert_eq!(Config::default().probe_settings().ports, DEFAULT_PORTS);
    }
}
