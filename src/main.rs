mod cli;
mod db;
mod detector;
mod enrichment;
mod error;
mod fmt;
mod importer;
mod journal;
mod lifecycle;
mod memory;
mod ml;
mod models;
mod normalizer;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, RulesCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, account } => cli::import::run(&file, account.as_deref()),
        Commands::Review => cli::review::run(),
        Commands::Suggest { id } => cli::classify::suggest(id),
        Commands::Classify {
            id,
            vendor,
            account,
            cost_center,
            notes,
            split,
            by,
        } => cli::classify::classify(
            id,
            vendor.as_deref(),
            account.as_deref(),
            cost_center.as_deref(),
            notes.as_deref(),
            &split,
            &by,
        ),
        Commands::Approve { id } => cli::classify::approve(id),
        Commands::Post { id, all } => cli::post::run(id, all),
        Commands::Reverse { id } => cli::post::reverse(id),
        Commands::Rules { command } => match command {
            RulesCommands::List { limit } => cli::rules::list(limit),
            RulesCommands::Feedback { pattern, reject } => cli::rules::feedback(&pattern, reject),
        },
        Commands::Batches => cli::batches::list(),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
