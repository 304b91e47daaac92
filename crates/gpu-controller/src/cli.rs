//! Command-line surface: a clap derive with a `Serve{config}` subcommand.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gpu-controller")]
#[command(about = "Kubernetes-native GPU control plane", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Runs the reconcile loop until interrupted.
    Serve {
        #[arg(short, long, default_value = "/etc/gpu-control-plane/controller.toml")]
        config: PathBuf,
    },
    /// Prints the built-in default configuration as TOML and exits.
    PrintDefaultConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_default_config_path() {
        let cli = Cli::parse_from(["gpu-controller", "serve"]);
        match cli.command {
            Command::Serve { config } => {
                assert_eq!(config, PathBuf::from("/etc/gpu-control-plane/controller.toml"));
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn parses_serve_with_custom_config_path() {
        let cli = Cli::parse_from(["gpu-controller", "serve", "--config", "/tmp/c.toml"]);
        match cli.command {
            Command::Serve { config } => assert_eq!(config, PathBuf::from("/tmp/c.toml")),
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn parses_print_default_config() {
        let cli = Cli::parse_from(["gpu-controller", "print-default-config"]);
        assert!(matches!(cli.command, Command::PrintDefaultConfig));
    }
}
