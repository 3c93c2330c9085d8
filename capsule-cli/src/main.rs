mod cli;
mod commands;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let directive = if cli.global.debug { "debug" } else { "warn" };
    let logs_dir = cli.global.options().home_dir.join("logs");
    let log_guard = match capsule::init_logging(&logs_dir, directive) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {e}");
            None
        }
    };

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    };

    // process::exit skips destructors
    drop(log_guard);
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global).map(|_| 0),
        Commands::Run(args) => commands::run::execute(args, &global).await,
        Commands::Images(args) => commands::images::execute(args, &global).map(|_| 0),
        Commands::Inspect(args) => commands::inspect::execute(args, &global).map(|_| 0),
        Commands::Rmi(args) => commands::rmi::execute(args, &global).map(|_| 0),
        Commands::Runtime(args) => commands::runtime::execute(args, &global).map(|_| 0),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<capsule::CapsuleError>())
        .map(capsule::CapsuleError::exit_code)
        .unwrap_or(1)
}
