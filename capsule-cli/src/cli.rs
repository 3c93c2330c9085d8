use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "capsule", version, about = "Build and launch single-entrypoint process images")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an image from a context directory
    Build(commands::build::BuildArgs),

    /// Launch an image's entrypoint
    Run(commands::run::RunArgs),

    /// List images
    Images(commands::images::ImagesArgs),

    /// Show an image's frozen configuration
    Inspect(commands::inspect::InspectArgs),

    /// Remove image tags or images
    Rmi(commands::rmi::RmiArgs),

    /// Manage base runtimes
    Runtime(commands::runtime::RuntimeArgs),
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Capsule home directory
    #[arg(long, global = true, env = "CAPSULE_HOME")]
    pub home: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalFlags {
    pub fn options(&self) -> capsule::CapsuleOptions {
        match &self.home {
            Some(home) => capsule::CapsuleOptions {
                home_dir: absolute(home),
            },
            None => capsule::CapsuleOptions::default(),
        }
    }

    pub fn create_runtime(&self) -> anyhow::Result<capsule::CapsuleRuntime> {
        Ok(capsule::CapsuleRuntime::new(self.options())?)
    }
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
