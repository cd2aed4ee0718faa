use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wdcaption::settings::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP tagging service (default)
    Serve {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Tag local image files with the WD tagger and print the results
    Tag {
        /// Image files to tag
        #[arg(required = true)]
        image_files: Vec<PathBuf>,

        /// Model to use: vit, swinv2, convnext, vit-large, eva02-large
        #[arg(short, long)]
        model: Option<String>,

        /// General label threshold
        #[arg(long)]
        gen_threshold: Option<f32>,

        /// Character label threshold
        #[arg(long)]
        char_threshold: Option<f32>,
    },
}
