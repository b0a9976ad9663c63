//! CLI argument parsing using clap 4.x derive macros

use ani_core::RoutingMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chat with a local model that can drive an interactive coding assistant
///
/// Requests that need the workspace go through the assistant session; the
/// local model phrases every reply.
#[derive(Parser, Debug)]
#[command(name = "ani")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of the standard locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model server host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Model server port (overrides config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Model name (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Program to run as the assistant session (overrides config)
    #[arg(long = "command", value_name = "PROGRAM", global = true)]
    pub program: Option<String>,

    /// Do not start the assistant session
    #[arg(long, global = true)]
    pub no_session: bool,

    /// Routing mode: auto, direct or session
    #[arg(long, global = true)]
    pub mode: Option<RoutingMode>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and exit
    Ask {
        /// The question or task
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Check the model server and the assistant session
    Check,

    /// Show or initialize configuration
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Print the config file path only
        #[arg(long)]
        path: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_overrides_and_ask() {
        let cli = Cli::parse_from([
            "ani", "--host", "gpu-box", "--port", "11500", "--command", "claude-dev", "--mode",
            "direct", "ask", "list", "files",
        ]);
        assert_eq!(cli.host.as_deref(), Some("gpu-box"));
        assert_eq!(cli.port, Some(11500));
        assert_eq!(cli.program.as_deref(), Some("claude-dev"));
        assert_eq!(cli.mode, Some(RoutingMode::Direct));
        match cli.command {
            Some(Commands::Ask { query }) => assert_eq!(query, vec!["list", "files"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn no_subcommand_means_interactive() {
        let cli = Cli::parse_from(["ani"]);
        assert!(cli.command.is_none());
        assert!(!cli.no_session);
    }
}
