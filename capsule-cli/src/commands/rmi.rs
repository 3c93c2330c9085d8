use clap::Args;

#[derive(Args, Debug)]
pub struct RmiArgs {
    /// Image id, id prefix or tag
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub fn execute(args: RmiArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;

    let mut errors = Vec::new();
    for target in &args.targets {
        match runtime.remove_image(target) {
            Ok(removed) => {
                for tag in &removed.untagged {
                    println!("Untagged: {}", tag);
                }
                if let Some(id) = &removed.deleted {
                    println!("Deleted: {}", id);
                }
            }
            Err(e) => {
                eprintln!("Error removing image '{}': {}", target, e);
                errors.push(e);
            }
        }
    }

    match errors.len() {
        0 => Ok(()),
        // keep the typed error so main picks its exit code
        1 if args.targets.len() == 1 => Err(errors.remove(0).into()),
        n => anyhow::bail!("Failed to remove {} of {} image(s)", n, args.targets.len()),
    }
}
