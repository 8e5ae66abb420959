//! CLI module for kubelite
//!
//! Provides kubectl-like subcommands:
//! - `kubelite serve` - Run the API server
//! - `kubelite create` - Create a pod
//! - `kubelite get` - List pods or nodes
//! - `kubelite delete` - Delete a pod
//! - `kubelite status` - Show cluster counters
//! - `kubelite validate` - Check a config file

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RuntimeKind;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

/// Server URL used when `--server` is not given
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Parser, Debug)]
#[command(name = "kubelite")]
#[command(about = "Schedule pods onto a fixed set of nodes and run them as containers")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.kubelite/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the API server
    Serve(ServeArgs),

    /// Create a pod
    Create(CreateArgs),

    /// Get/list resources
    Get(GetArgs),

    /// Delete a resource
    Delete(DeleteArgs),

    /// Show cluster status
    Status(ServerArgs),

    /// Validate a config file
    Validate(ValidateArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bind address (overrides the config file)
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Container runtime backing the cluster (overrides the config file)
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeKind>,

    /// Path to a .env file loaded before startup
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

/// Where the API server lives
#[derive(Parser, Debug, Clone)]
pub struct ServerArgs {
    /// URL of the API server
    #[arg(long, global = true, env = "KUBELITE_SERVER", default_value = DEFAULT_SERVER_URL)]
    pub server: String,
}

/// Arguments for the create command
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Pod name
    pub name: String,

    /// Container image to run
    #[arg(short, long)]
    pub image: String,

    #[command(flatten)]
    pub server: ServerArgs,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Resource type to list
    #[command(subcommand)]
    pub resource: GetResource,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Subcommand, Debug)]
pub enum GetResource {
    /// List pods, or show one pod by id
    #[command(name = "pods", visible_alias = "pod", visible_alias = "po")]
    Pods {
        /// Pod id
        id: Option<String>,
    },

    /// List nodes
    #[command(name = "nodes", visible_alias = "node", visible_alias = "no")]
    Nodes,
}

/// Arguments for the delete command
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    #[command(subcommand)]
    pub resource: DeleteResource,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Subcommand, Debug)]
pub enum DeleteResource {
    /// Delete a pod
    #[command(name = "pod", visible_alias = "po")]
    Pod {
        /// Pod id
        id: String,
    },
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Config file to check (default: the global --config or ~/.kubelite/config.yaml)
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from([
            "kubelite",
            "serve",
            "--port",
            "9090",
            "--runtime",
            "simulated",
        ]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(9090));
                assert_eq!(args.runtime, Some(RuntimeKind::Simulated));
                assert!(args.bind_addr.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::parse_from(["kubelite", "create", "web", "--image", "nginx"]);
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.name, "web");
                assert_eq!(args.image, "nginx");
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn test_parse_get_pods() {
        let cli = Cli::parse_from(["kubelite", "get", "po"]);
        match cli.command {
            Commands::Get(args) => match args.resource {
                GetResource::Pods { id } => assert!(id.is_none()),
                _ => panic!("Expected Pods resource"),
            },
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_parse_get_nodes_with_server() {
        let cli = Cli::parse_from(["kubelite", "get", "nodes", "--server", "http://10.0.0.1:8080"]);
        match cli.command {
            Commands::Get(args) => {
                assert!(matches!(args.resource, GetResource::Nodes));
                assert_eq!(args.server.server, "http://10.0.0.1:8080");
            }
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_parse_delete_pod() {
        let cli = Cli::parse_from(["kubelite", "delete", "pod", "abc123"]);
        match cli.command {
            Commands::Delete(args) => match args.resource {
                DeleteResource::Pod { id } => assert_eq!(id, "abc123"),
            },
            _ => panic!("Expected Delete command"),
        }
    }

    #[test]
    fn test_verbose_and_config_are_global() {
        let cli = Cli::parse_from(["kubelite", "validate", "-vv", "--config", "c.yaml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
    }
}
