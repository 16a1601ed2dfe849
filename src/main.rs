use clap::{Parser, Subcommand, ValueEnum};
use file_sorter::cli::{CliOptions, SortCommand, run_cli};
use file_sorter::identifier::IdentifierRule;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "file-sorter")]
#[command(about = "Sort files into folders named after the identifier in their file name", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .filesorterrc.toml or ~/.config/file-sorter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the counters and the error log
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Move files from SOURCE into per-identifier folders
    Sort {
        source: PathBuf,
        /// Folder to create identifier folders in (defaults to SOURCE)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show what would be moved without moving anything
        #[arg(long)]
        dry_run: bool,
        /// Identifier rule, overriding the configuration file
        #[arg(long, value_enum)]
        rule: Option<RuleArg>,
    },
    /// Print the persisted counters
    Status,
    /// Print the error log
    Errors,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuleArg {
    Strict,
    Legacy,
}

impl From<RuleArg> for IdentifierRule {
    fn from(arg: RuleArg) -> Self {
        match arg {
            RuleArg::Strict => IdentifierRule::Strict,
            RuleArg::Legacy => IdentifierRule::Legacy,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut options = CliOptions {
        config_path: cli.config,
        rule: None,
        state_dir: cli.state_dir,
    };

    let command = match cli.command {
        Commands::Sort {
            source,
            output,
            dry_run,
            rule,
        } => {
            options.rule = rule.map(IdentifierRule::from);
            SortCommand::Sort {
                source,
                output,
                dry_run,
            }
        }
        Commands::Status => SortCommand::Status,
        Commands::Errors => SortCommand::Errors,
    };

    match run_cli(command, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
