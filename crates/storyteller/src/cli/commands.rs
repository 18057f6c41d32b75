//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storyteller_core::ConfigOverrides;

/// Storyteller - illustrated children's stories from a one-line idea
#[derive(Parser, Debug)]
#[command(name = "storyteller")]
#[command(about = "Generate illustrated children's stories with AI text and image models", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute; generates a story when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Story idea; asked for interactively when omitted
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Number of illustrations
    #[arg(short, long)]
    pub images: Option<usize>,

    /// Output directory for story folders
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Model for story text
    #[arg(long)]
    pub model: Option<String>,

    /// Model for illustrations
    #[arg(long)]
    pub image_model: Option<String>,

    /// Story sampling temperature (0.0 to 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Optimize prompts and analyze story quality
    #[arg(long)]
    pub optimize: bool,

    /// Skip the content safety filter
    #[arg(long)]
    pub no_filter: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(long, global = true, env = "STORYTELLER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List generated stories, newest first
    List {
        /// Output directory to scan
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Configuration values given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            story_model: self.model.clone(),
            story_temperature: self.temperature,
            image_model: self.image_model.clone(),
            output_dir: self.output.clone(),
            images_per_story: self.images,
            optimize_prompts: self.optimize.then_some(true),
            content_filter: self.no_filter.then_some(false),
        }
    }
}
