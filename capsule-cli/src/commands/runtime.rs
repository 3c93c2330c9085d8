use std::path::PathBuf;

use clap::{Args, Subcommand};
use comfy_table::{Table, presets};

#[derive(Args, Debug)]
pub struct RuntimeArgs {
    #[command(subcommand)]
    pub command: RuntimeCommands,
}

#[derive(Subcommand, Debug)]
pub enum RuntimeCommands {
    /// Import a prepared runtime directory into the catalog
    Import {
        /// Pinned reference (name:tag)
        reference: String,

        /// Directory with runtime.json, rootfs/ and packages/
        dir: PathBuf,
    },

    /// List base runtimes
    #[command(alias = "list")]
    Ls,
}

pub fn execute(args: RuntimeArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;

    match args.command {
        RuntimeCommands::Import { reference, dir } => {
            let info = runtime.import_runtime(&reference, &dir)?;
            println!("{}", info.reference);
        }
        RuntimeCommands::Ls => {
            let mut table = Table::new();
            table
                .load_preset(presets::NOTHING)
                .set_header(vec!["RUNTIME", "INTERPRETER", "PACKAGES"]);
            for info in runtime.runtimes()? {
                table.add_row(vec![
                    info.reference,
                    info.interpreter,
                    info.packages.to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
