//! Command-line interface
//!
//! Parsing never fails: no arguments, `help`, or anything clap does not
//! recognise resolves to [`Command::Help`], which prints usage and succeeds.

use crate::commands::{self, ensure_local_tools};
use crate::console;
use crate::context::{Context, ContextBuilder};
use crate::error::Result;
use crate::init::initialize;
use crate::version_info;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

const AFTER_HELP: &str = "\
Deploy requires AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.
Provisioned resource names are kept in .aws-resources, running PIDs in .oms-pids.

Examples:
  omsctl setup      Create the DynamoDB table, S3 bucket and SNS topic
  omsctl all        Setup, build, test and start locally
  omsctl stop       Stop the local backend and frontend";

#[derive(Debug, Parser)]
#[command(name = "omsctl")]
#[command(about = "Order Management System deployment tool", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(disable_help_subcommand = true)]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// Configuration file (default: ./omsctl.toml over ~/.omsctl/omsctl.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments that could not be parsed
    #[arg(skip)]
    pub unrecognized: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Provision the DynamoDB table, S3 bucket and SNS topic
    Setup,

    /// Build the backend and frontend
    Build,

    /// Run the backend and frontend test suites
    Test,

    /// Start the backend and frontend in the background
    Start,

    /// Stop the backend and frontend started by `start`
    Stop,

    /// Deploy the backend and frontend to AWS
    Deploy,

    /// Stop local processes and remove log files
    Clean,

    /// Run setup, build, test and start in sequence
    All,

    /// Show recorded processes, provisioned resources and required tools
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default omsctl.toml in the project root
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,

    /// Show this help
    Help,
}

impl Command {
    /// Whether the command needs a loaded configuration and run context
    pub fn needs_context(&self) -> bool {
        !matches!(self, Self::Init { .. } | Self::Version | Self::Help)
    }
}

impl Cli {
    /// The command to run, help when none was given
    pub fn selected(&self) -> Command {
        self.command.clone().unwrap_or(Command::Help)
    }
}

/// Parse arguments (program name first), falling back to help
pub fn parse_args<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            let (command, unrecognized) = match err.kind() {
                ErrorKind::DisplayVersion => (Command::Version, None),
                ErrorKind::DisplayHelp => (Command::Help, None),
                kind => {
                    debug!(?kind, "Unparseable arguments, showing help");
                    let given = args
                        .iter()
                        .skip(1)
                        .map(|arg| arg.to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join(" ");
                    (Command::Help, Some(given))
                }
            };
            Cli {
                config: None,
                verbose: false,
                command: Some(command),
                unrecognized,
            }
        }
    }
}

/// Rendered usage listing
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Run the parsed command. Commands that need no context never load
/// configuration.
pub async fn run(cli: &Cli, builder: ContextBuilder) -> Result<()> {
    let command = cli.selected();
    match command {
        Command::Help => {
            if let Some(ref given) = cli.unrecognized {
                console::warning(format!("Unrecognized arguments: {}", given));
            }
            println!("{}", usage());
            Ok(())
        }
        Command::Version => {
            println!("{}", version_info());
            Ok(())
        }
        Command::Init { force } => {
            let path = initialize(&builder.root()?, force)?;
            console::success(format!("Wrote {}", path.display()));
            Ok(())
        }
        command => {
            let ctx = builder.build().await?;
            execute(&ctx, &command).await
        }
    }
}

/// Dispatch a command against a built context
pub async fn execute(ctx: &Context, command: &Command) -> Result<()> {
    debug!(?command, root = %ctx.root().display(), "Executing command");
    match command {
        Command::Setup => {
            ensure_local_tools(ctx)?;
            commands::provision(ctx).await?;
        }
        Command::Build => {
            ensure_local_tools(ctx)?;
            commands::build(ctx).await?;
        }
        Command::Test => {
            ensure_local_tools(ctx)?;
            commands::test(ctx).await?;
        }
        Command::Start => {
            ensure_local_tools(ctx)?;
            commands::start(ctx).await?;
        }
        Command::Stop => commands::stop(ctx).await?,
        Command::Deploy => commands::deploy(ctx).await?,
        Command::Clean => commands::clean(ctx).await?,
        Command::All => commands::all(ctx).await?,
        Command::Status { json } => {
            commands::status(ctx, *json).await?;
        }
        Command::Init { force } => {
            let path = initialize(ctx.root(), *force)?;
            console::success(format!("Wrote {}", path.display()));
        }
        Command::Version => println!("{}", version_info()),
        Command::Help => println!("{}", usage()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_is_help() {
        let cli = parse_args(["omsctl"]);
        assert_eq!(cli.selected(), Command::Help);
        assert!(cli.unrecognized.is_none());
    }

    #[test]
    fn test_unknown_command_is_help() {
        let cli = parse_args(["omsctl", "frobnicate", "--now"]);
        assert_eq!(cli.selected(), Command::Help);
        assert_eq!(cli.unrecognized.as_deref(), Some("frobnicate --now"));
    }

    #[test]
    fn test_help_flag_and_subcommand() {
        assert_eq!(parse_args(["omsctl", "--help"]).selected(), Command::Help);
        assert_eq!(parse_args(["omsctl", "help"]).selected(), Command::Help);
    }

    #[test]
    fn test_version_flag_is_version_command() {
        assert_eq!(parse_args(["omsctl", "--version"]).selected(), Command::Version);
    }

    #[test]
    fn test_global_options() {
        let cli = parse_args(["omsctl", "status", "--json", "-v", "--config", "/tmp/oms.toml"]);
        assert_eq!(cli.selected(), Command::Status { json: true });
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/oms.toml")));
    }

    #[test]
    fn test_usage_lists_every_command() {
        let usage = usage();
        for name in ["setup", "build", "test", "start", "stop", "deploy", "clean", "all", "help"] {
            assert!(usage.contains(name), "usage is missing {}", name);
        }
    }

    #[test]
    fn test_needs_context() {
        assert!(Command::Start.needs_context());
        assert!(!Command::Help.needs_context());
        assert!(!Command::Init { force: false }.needs_context());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
