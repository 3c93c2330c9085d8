use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Build context directory
    #[arg(default_value = ".")]
    pub context: PathBuf,

    /// Recipe file (default: <CONTEXT>/capsule.yaml)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Tag for the built image (name or name:tag)
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub fn execute(args: BuildArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;

    let outcome = runtime.build_dir(
        &args.context,
        args.file.as_deref(),
        capsule::BuildOptions { tag: args.tag.clone() },
    )?;

    if !outcome.created {
        eprintln!("Image already exists, reusing it");
    }
    if let Some(tag) = &args.tag {
        eprintln!("Tagged {}", tag);
    }
    println!("{}", outcome.image.id());
    Ok(())
}
