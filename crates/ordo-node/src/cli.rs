//! Command-line interface for the ordoledger binary

use clap::Parser;
use std::path::PathBuf;

/// OrdoLedger permissioned ledger node
#[derive(Debug, Parser)]
#[command(name = "ordoledger", version, about)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the node key file; created when missing. Overrides the
    /// `node_key` configuration field.
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Print the default configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Log filter, e.g. `info` or `ordo_consensus=debug`
    #[arg(long, default_value = "info")]
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ordoledger"]);
        assert!(cli.config.is_none());
        assert!(!cli.print_config);
        assert_eq!(cli.log, "info");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "ordoledger",
            "--config",
            "/tmp/node.json",
            "--log",
            "debug",
        ]);
        assert_eq!(cli.config.unwrap(), PathBuf::from("/tmp/node.json"));
        assert_eq!(cli.log, "debug");
    }
}
