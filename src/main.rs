use anyhow::Result;
use clap::{CommandFactory, Parser};
use jdowser::cli::{Cli, Commands};
use jdowser::config::Config;
use jdowser::logging::{self, LogTarget};
use jdowser::{commands, daemon};
use std::env;
use std::io;
use std::path::Path;

/// Exit code when no command was given.
const USAGE_EXIT: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        return commands::version(cli.format(), &program_name(), io::stdout().lock());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        std::process::exit(USAGE_EXIT);
    };

    let raw_args: Vec<String> = env::args().collect();
    let config = Config::from_cli(&cli, command, &raw_args)?;

    let log_path = config.log_path();
    let target = if command == Commands::Start && daemon::is_detached() {
        LogTarget::File(&log_path)
    } else {
        LogTarget::Terminal
    };
    logging::init(target);

    match command {
        Commands::Start => daemon::start(&config),
        Commands::Stop => commands::stop(&config),
        Commands::Status => commands::status(&config),
        Commands::Report => commands::report(&config),
    }
}

/// Base name of the executable as invoked.
fn program_name() -> String {
    env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jdowser".to_string())
}
