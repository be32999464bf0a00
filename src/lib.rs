//! thumber - on-demand image thumbnails with a content-addressed disk cache.
//!
//! A request names a source image (relative path, absolute path or URL) and
//! a [`ThumbnailSpec`](spec::ThumbnailSpec). The [`engine`] resolves the
//! source, derives a deterministic cache key, and either serves the cached
//! file or generates, stores and serves it. Thumbnails are cleared per
//! source or wholesale through the [`invalidate`] module or the CLI.
//!
//! # Modules
//!
//! * [`source`]: Path Resolver
//! * [`spec`]: thumbnail specs and the Transform Key Builder
//! * [`cache`]: Cache Store
//! * [`generator`]: Thumbnail Generator
//! * [`invalidate`]: Invalidation Manager
//! * [`helper`]: helper surface for templating layers and served URLs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod helper;
pub mod invalidate;
pub mod logging;
pub mod source;
pub mod spec;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::Serialize;

use cli::{Cli, Commands, CreateArgs, ListArgs};
use config::Config;
use engine::ThumbEngine;
use error::ExitCode;
use helper::{ThumbParams, ThumbUrls};
use source::SourceId;
use spec::{parse_dimension, OutputFormat, ThumbnailSpec};

/// Run the CLI, writing command output to stdout.
///
/// # Errors
///
/// Returns an error if configuration, resolution, generation or cache
/// operations fail. [`ExitCode::for_error`] maps it to an exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_app_with_output(cli, &mut out)
}

/// Run the CLI, writing command output to `out`.
///
/// # Errors
///
/// As for [`run_app`].
pub fn run_app_with_output<W: Write>(cli: Cli, out: &mut W) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    config.validate()?;
    log::debug!("Using cache directory: {}", config.cache_dir.display());

    let engine = ThumbEngine::new(config).context("Failed to open the thumbnail cache")?;

    match cli.command {
        Commands::Clear(args) => {
            let removed = engine.invalidator().clear(&args.path)?;
            if cli.verbose > 0 {
                writeln!(out, "Thumbnails deleted: {removed}")?;
            }
        }
        Commands::ClearAll => {
            let removed = engine.invalidator().clear_all()?;
            if cli.verbose > 0 {
                writeln!(out, "Thumbnails deleted: {removed}")?;
            }
        }
        Commands::Create(args) => run_create(&engine, args, out)?,
        Commands::List(args) => run_list(&engine, &args, out)?,
        Commands::Locate(args) => {
            let entry = ThumbUrls::new(&engine).locate(&args.url)?;
            writeln!(out, "{}", entry.file_path.display())?;
        }
    }

    Ok(ExitCode::Success)
}

fn run_create<W: Write>(engine: &ThumbEngine, args: CreateArgs, out: &mut W) -> Result<()> {
    let params = ThumbParams {
        width: args
            .width
            .as_deref()
            .map(|w| parse_dimension("width", w))
            .transpose()?,
        height: args
            .height
            .as_deref()
            .map(|h| parse_dimension("height", h))
            .transpose()?,
        format: args
            .format
            .as_deref()
            .map(str::parse::<OutputFormat>)
            .transpose()?,
        options: args.options.into_iter().collect(),
    };
    let spec = params.to_spec(args.operation.into(), engine.config().default_format)?;
    let entry = engine.get_or_create(&args.path, &spec)?;

    if args.url {
        writeln!(out, "{}", ThumbUrls::new(engine).url_for(&entry, true))?;
    } else {
        writeln!(out, "{}", entry.file_path.display())?;
    }
    Ok(())
}

/// One row of `list --json`.
#[derive(Debug, Serialize)]
struct ListItem<'a> {
    key: &'a str,
    source: &'a SourceId,
    spec: &'a ThumbnailSpec,
    path: &'a Path,
    size: u64,
    created_at: DateTime<Utc>,
    fresh: bool,
}

fn run_list<W: Write>(engine: &ThumbEngine, args: &ListArgs, out: &mut W) -> Result<()> {
    let entries = match &args.path {
        Some(path) => {
            let id = engine.resolver().canonical_id(path)?;
            engine.store().entries(Some(&id))
        }
        None => engine.store().entries(None),
    };

    if args.json {
        let items: Vec<ListItem<'_>> = entries
            .iter()
            .map(|entry| ListItem {
                key: entry.key.as_str(),
                source: &entry.source,
                spec: &entry.spec,
                path: &entry.file_path,
                size: entry.size_on_disk(),
                created_at: entry.created_at,
                fresh: engine.is_fresh(entry),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &items)?;
        writeln!(out)?;
        return Ok(());
    }

    for entry in &entries {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            entry.file_path.display(),
            ByteSize::b(entry.size_on_disk()),
            entry.spec.describe(),
            entry.source
        )?;
    }
    log::info!("{} thumbnails listed", entries.len());
    Ok(())
}
