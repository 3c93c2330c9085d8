use clap::Args;
use comfy_table::{Table, presets};

#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Only show image ids
    #[arg(short, long)]
    pub quiet: bool,

    /// Show full image ids
    #[arg(long)]
    pub no_trunc: bool,
}

pub fn execute(args: ImagesArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    let images = runtime.images()?;

    if args.quiet {
        for image in &images {
            println!("{}", display_id(&image.id, args.no_trunc));
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_header(vec!["REPOSITORY", "TAG", "IMAGE ID", "BASE", "CREATED", "SIZE"]);

    for image in &images {
        let id = display_id(&image.id, args.no_trunc);
        let created = image.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let size = human_size(image.size);

        if image.tags.is_empty() {
            table.add_row(vec![
                "<none>".to_string(),
                "<none>".to_string(),
                id,
                image.base.clone(),
                created,
                size,
            ]);
            continue;
        }
        for tag in &image.tags {
            let (repository, tag) = tag.rsplit_once(':').unwrap_or((tag.as_str(), "latest"));
            table.add_row(vec![
                repository.to_string(),
                tag.to_string(),
                id.clone(),
                image.base.clone(),
                created.clone(),
                size.clone(),
            ]);
        }
    }

    println!("{table}");
    Ok(())
}

fn display_id(id: &capsule::ImageId, full: bool) -> String {
    if full {
        id.to_string()
    } else {
        id.short().to_string()
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "kB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{size:.1}{}", UNITS[unit])
    }
}
