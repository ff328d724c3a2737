use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "zip-streamer")]
#[command(version)]
#[command(about = "FastCGI responder that streams single entries out of remote archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zip-streamer --bind 127.0.0.1:9000            serve with default settings\n  \
  zip-streamer --config /etc/zip-streamer.toml  load settings from a file\n  \
  RUST_LOG=zip_streamer=debug zip-streamer      verbose logging")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// FastCGI listen address
    #[arg(short = 'b', long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Number of workers
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,
}

impl Cli {
    /// Overlay command-line flags on a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(log) = &self.log {
            config.log_filter = log.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["zip-streamer", "--bind", "0.0.0.0:9001", "-w", "3"]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.bind_address, "0.0.0.0:9001");
        assert_eq!(config.workers, 3);
        assert_eq!(config.log_filter, Config::default().log_filter);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["zip-streamer"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
        assert!(cli.config.is_none());
    }
}
