pub mod settings;
pub mod toml_config;

use crate::domain::model::{AspectRatio, ImageSize, PersonGeneration};
use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "imagenation", version)]
#[command(about = "AI image generation tool using Google's Imagen")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print the request that would be sent without calling the API
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate images from a single prompt
    Generate {
        /// Text prompt describing the image
        prompt: String,

        #[command(flatten)]
        options: GenerationArgs,
    },

    /// Generate images for every prompt in a file (one per line)
    Batch {
        /// Prompt file; falls back to `batch.prompts_file` in the config file
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,

        /// Number of prompts generated in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        options: GenerationArgs,
    },

    /// List the known Imagen models
    Models,

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        options: GenerationArgs,
    },
}

/// Per-invocation overrides. Unset flags fall back to the config file,
/// then the environment, then built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct GenerationArgs {
    /// Imagen model id
    #[arg(short, long)]
    pub model: Option<String>,

    /// Images to generate per prompt (1-4)
    #[arg(short = 'n', long)]
    pub number_of_images: Option<u8>,

    /// 1:1, 3:4, 4:3, 9:16 or 16:9
    #[arg(short, long)]
    pub aspect_ratio: Option<AspectRatio>,

    /// dont_allow, allow_adult or allow_all
    #[arg(long)]
    pub person_generation: Option<PersonGeneration>,

    /// 1K or 2K (Imagen 4 standard and ultra only)
    #[arg(long)]
    pub image_size: Option<ImageSize>,

    #[arg(long)]
    pub negative_prompt: Option<String>,

    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Filename prefix for saved images
    #[arg(long)]
    pub prefix: Option<String>,

    /// Do not write a JSON metadata file next to each image
    #[arg(long)]
    pub no_metadata: bool,

    /// Gemini API key (defaults to GEMINI_API_KEY / GOOGLE_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries for rate-limited or failed requests
    #[arg(long)]
    pub retries: Option<u32>,
}
