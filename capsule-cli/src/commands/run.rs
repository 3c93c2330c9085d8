use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Set environment variables (KEY=VALUE)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Image id, id prefix or tag
    pub image: String,

    /// Arguments appended to the entrypoint, verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Returns the process exit code.
pub async fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<i32> {
    let runtime = global.create_runtime()?;
    let options = capsule::LaunchOptions::default().with_env_pairs(&args.env)?;

    let outcome = runtime.launch(&args.image, &args.args, options).await?;
    tracing::debug!(
        instance_id = %outcome.instance_id,
        exit_code = outcome.exit_code,
        "Launch finished"
    );
    Ok(outcome.exit_code)
}
