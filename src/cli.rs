//! Command-line interface definitions for thumber.
//!
//! Defined with the clap derive API: global options (verbosity, config,
//! directories) and one subcommand per operation.
//!
//! # Example
//!
//! ```bash
//! # Delete every thumbnail of one image
//! thumber clear photos/400x400.png
//!
//! # Clear the whole cache, reporting the count
//! thumber -v clear-all
//!
//! # Create a 200px wide PNG thumbnail and print its URL
//! thumber create 400x400.png --operation resize --width 200 --format png --url
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::spec::Operation;

/// Thumbnail cache manager.
///
/// Creates thumbnails of local or remote images on demand, caches them on
/// disk and clears them when their source changes.
#[derive(Debug, Parser)]
#[command(name = "thumber")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory relative image paths are resolved against
    #[arg(long, value_name = "DIR", global = true)]
    pub image_dir: Option<PathBuf>,

    /// Root directory of the thumbnail cache
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete all thumbnails derived from an image
    Clear(ClearArgs),
    /// Delete every thumbnail in the cache
    #[command(name = "clear-all", alias = "clear_all")]
    ClearAll,
    /// Create (or reuse) a thumbnail and print its path or URL
    Create(CreateArgs),
    /// List cached thumbnails
    List(ListArgs),
    /// Map a served thumbnail URL to its cached file
    Locate(LocateArgs),
}

/// Arguments for the clear subcommand.
#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Image path (relative to the image directory, absolute, or URL)
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Arguments for the create subcommand.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Image path (relative to the image directory, absolute, or URL)
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Transformation to apply
    #[arg(short, long, value_enum)]
    pub operation: OperationArg,

    /// Target width in pixels
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub width: Option<String>,

    /// Target height in pixels
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub height: Option<String>,

    /// Output format (jpg, png, gif, bmp, tiff, webp, ico)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Operation option as key=value (repeatable), e.g. quality=80
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    /// Print the served URL instead of the file path
    #[arg(long)]
    pub url: bool,
}

/// Arguments for the list subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only list thumbnails of this image
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Print a JSON array instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the locate subcommand.
#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Thumbnail URL as produced by `create --url` or the helper
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Operation names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    /// Cut an exact region
    Crop,
    /// Scale to fit inside the box
    Fit,
    /// Scale to an exact size
    Resize,
    /// Change the canvas size without scaling
    #[value(alias = "resizeCanvas")]
    ResizeCanvas,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Crop => Operation::Crop,
            OperationArg::Fit => Operation::Fit,
            OperationArg::Resize => Operation::Resize,
            OperationArg::ResizeCanvas => Operation::ResizeCanvas,
        }
    }
}

/// Parse a `key=value` operation option.
///
/// # Examples
///
/// ```
/// use thumber::cli::parse_option;
///
/// assert_eq!(
///     parse_option("quality=80").unwrap(),
///     ("quality".to_string(), "80".to_string())
/// );
/// assert!(parse_option("quality").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is empty.
pub fn parse_option(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Option name cannot be empty in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
