//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::collaborators::TimerSettings;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "streak-timer")]
#[command(about = "A persistent countdown timer that survives sleep and restarts")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Length of new timers in minutes
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub timer: u32,

    /// Where the timer record is persisted
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// logind session to poll for display lock/idle state
    #[arg(long)]
    pub logind_session: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Explicit state file, or `<data dir>/streak-timer/state.json`.
    pub fn state_file_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("streak-timer")
                .join("state.json")
        })
    }
}

impl TimerSettings for Config {
    fn configured_length_minutes(&self) -> u32 {
        self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = Config::try_parse_from(["streak-timer"]).unwrap();
        assert_eq!(config.port, 20554);
        assert_eq!(config.configured_length_minutes(), 10);
        assert_eq!(config.log_level(), "info");
        assert!(config.state_file_path().ends_with("streak-timer/state.json"));
    }

    #[test]
    fn zero_minute_timer_is_rejected() {
        assert!(Config::try_parse_from(["streak-timer", "--timer", "0"]).is_err());
    }

    #[test]
    fn explicit_state_file_wins() {
        let config =
            Config::try_parse_from(["streak-timer", "--state-file", "/tmp/t.json", "-v"]).unwrap();
        assert_eq!(config.state_file_path(), PathBuf::from("/tmp/t.json"));
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "debug");
    }
}
