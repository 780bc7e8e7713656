//! Fetch command - materialize one chart version to a local archive

use chartstreams_core::list_archive;
use chartstreams_repo::{ChartProvider, RepoError, StreamConfig};
use console::style;
use std::path::Path;

use super::open_provider;
use crate::error::Result;
use crate::util::{describe_commit, format_size};

pub async fn run(
    config: StreamConfig,
    name: &str,
    version: &str,
    output: Option<&Path>,
) -> Result<()> {
    let provider = open_provider(config).await?;

    println!(
        "{} {} v{}",
        style("Fetching").cyan().bold(),
        name,
        version
    );

    let chart = provider.get_chart(name, version).await?;

    let dir = output.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let path = dir.join(chart.file_name());
    std::fs::write(&path, &chart.archive)?;

    println!("  {} {}", style("Commit").dim(), describe_commit(&chart.commit));
    println!("  {} {}", style("Created").green().bold(), path.display());
    println!(
        "  {} {}",
        style("Size").dim(),
        format_size(chart.archive.len() as u64)
    );

    let entries = list_archive(&chart.archive).map_err(RepoError::from)?;

    println!();
    println!("{}:", style("Contents").bold());
    for entry in &entries {
        if entry.is_symlink {
            println!("  {} {}", entry.path, style("(symlink)").dim());
        } else {
            println!("  {}", entry.path);
        }
    }

    println!();
    println!("{}: {}", style("Digest").bold(), chart.digest);

    Ok(())
}
