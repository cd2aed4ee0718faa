//! # wdcaption
//!
//! Image captioning service. By default this runs the HTTP server; the `tag`
//! subcommand tags local files with the WD tagger instead.

mod args;
mod core;
mod logging;

use anyhow::Result;
use args::{Args, Commands};
use clap::Parser;
use wdcaption::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    logging::init(&settings.logging, args.verbose, args.json_logs);

    match args.command {
        Some(Commands::Tag {
            image_files,
            model,
            gen_threshold,
            char_threshold,
        }) => {
            core::run_tag(settings, image_files, model, gen_threshold, char_threshold).await?;
        }
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            core::run_server(settings).await?;
        }
        None => {
            core::run_server(settings).await?;
        }
    }

    Ok(())
}
