//! Index command - build and print the repository index

use chartstreams_repo::{ChartProvider, StreamConfig};
use console::style;
use std::path::Path;

use super::open_provider;
use crate::error::Result;

pub async fn run(config: StreamConfig, json: bool, output: Option<&Path>) -> Result<()> {
    let provider = open_provider(config).await?;
    let catalog = provider.index_file()?;

    let document = if json {
        catalog.to_json()?
    } else {
        catalog.to_yaml()?
    };

    match output {
        Some(path) => {
            std::fs::write(path, &document)?;
            eprintln!(
                "{} {} ({} charts, {} versions)",
                style("Wrote").green().bold(),
                path.display(),
                catalog.names().len(),
                catalog.len()
            );
        }
        None => {
            print!("{}", document);
            if json {
                println!();
            }
        }
    }

    Ok(())
}
