use clap::Args;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image id, id prefix or tag
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub fn execute(args: InspectArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;

    let mut documents = Vec::with_capacity(args.targets.len());
    for target in &args.targets {
        let image = runtime.inspect(target)?;
        documents.push(serde_json::json!({
            "id": image.id(),
            "config": image.config(),
        }));
    }

    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}
