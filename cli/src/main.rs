//! sidedoc CLI - edit Word documents as Markdown

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use sidedoc::sync::{preview, CONTENT_PREVIEW_LENGTH};
use sidedoc::{BuildOptions, ErrorKind, ExtractOptions, MatchOptions, SyncOptions};

/// Characters of a SHA-256 digest shown by `info`.
const HASH_DISPLAY_LENGTH: usize = 16;

#[derive(Parser)]
#[command(name = "sidedoc")]
#[command(author = "sidedoc contributors")]
#[command(version)]
#[command(about = "Extract Word documents to editable Markdown archives and build them back", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a .docx file into a .sidedoc archive
    Extract {
        /// Input Word document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output archive (defaults to FILE with a .sidedoc extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Build a .docx file from a .sidedoc archive
    Build {
        /// Input archive
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output document (defaults to FILE with a .docx extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Extra directory to look for images in
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,
    },

    /// Re-match edited content.md and update the archive metadata
    Sync {
        /// Archive to sync
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Write the synced archive here instead of in place
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Similarity needed to treat a changed block as an edit
        #[arg(long, default_value_t = sidedoc::sync::SIMILARITY_THRESHOLD)]
        threshold: f64,
    },

    /// Check an archive's structure and metadata
    Validate {
        /// Archive to check
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show archive information
    Info {
        /// Archive to inspect
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the information as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract archive entries into a directory
    Unpack {
        /// Archive to unpack
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Destination directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Pack a directory back into an archive
    Pack {
        /// Directory holding content.md and the metadata files
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Output archive
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Show what changed in content.md since the last sync
    Diff {
        /// Archive to compare
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Similarity needed to treat a changed block as an edit
        #[arg(long, default_value_t = sidedoc::sync::SIMILARITY_THRESHOLD)]
        threshold: f64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Extract { input, output } => cmd_extract(&input, output.as_deref()),
        Commands::Build {
            input,
            output,
            assets,
        } => cmd_build(&input, output.as_deref(), assets),
        Commands::Sync {
            input,
            output,
            threshold,
        } => cmd_sync(&input, output, threshold),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Unpack { input, output } => cmd_unpack(&input, &output),
        Commands::Pack { input, output } => cmd_pack(&input, &output),
        Commands::Diff {
            input,
            threshold,
            json,
        } => cmd_diff(&input, threshold, json),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(exit_code(e.kind()));
    }
}

/// Process exit code for an error. Code 4 is reserved for sync conflicts.
fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => 2,
        ErrorKind::InvalidFormat => 3,
        ErrorKind::ValidationFailed | ErrorKind::Generic => 1,
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(message);
    pb
}

fn success(message: String) {
    println!("{} {}", "✓".green().bold(), message);
}

fn print_json<T: serde::Serialize>(value: &T) -> sidedoc::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| sidedoc::Error::Other(format!("failed to serialize report: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn cmd_extract(input: &Path, output: Option<&Path>) -> sidedoc::Result<()> {
    let pb = spinner(format!("Extracting {}...", input.display()));
    let result = sidedoc::extract_file(input, output, &ExtractOptions::default());
    pb.finish_and_clear();
    let report = result?;

    success(format!(
        "Extracted {} blocks to {}",
        report.blocks,
        report.output.display()
    ));
    if report.images > 0 {
        println!("  {} {} images stored", "├─".dimmed(), report.images);
    }
    if report.rejected_images > 0 {
        println!(
            "  {} {} images replaced by placeholders",
            "└─".dimmed(),
            report.rejected_images.to_string().yellow()
        );
    }
    Ok(())
}

fn cmd_build(input: &Path, output: Option<&Path>, assets: Option<PathBuf>) -> sidedoc::Result<()> {
    let mut options = BuildOptions::new();
    if let Some(dir) = assets {
        options = options.with_assets_dir(dir);
    }
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("docx"));

    let pb = spinner(format!("Building {}...", input.display()));
    let result = sidedoc::build_file(input, Some(&output), &options);
    pb.finish_and_clear();
    let report = result?;

    success(format!(
        "Built {} ({} paragraphs, {} images)",
        output.display(),
        report.paragraphs,
        report.images
    ));
    for path in &report.missing_images {
        println!("  {} missing image {}", "!".yellow(), path);
    }
    if report.style_failures > 0 {
        println!(
            "  {} {} blocks kept default styling",
            "!".yellow(),
            report.style_failures
        );
    }
    Ok(())
}

fn cmd_sync(input: &Path, output: Option<PathBuf>, threshold: f64) -> sidedoc::Result<()> {
    let mut options =
        SyncOptions::new().with_matching(MatchOptions::new().with_threshold(threshold));
    if let Some(path) = output {
        options = options.with_output(path);
    }

    let report = sidedoc::sync_file(input, &options)?;
    if !report.content_changed {
        success(format!("{} is already in sync", report.output.display()));
        return Ok(());
    }
    success(format!("Synced {}", report.output.display()));
    println!("  {} {} unchanged", "├─".dimmed(), report.exact);
    println!("  {} {} edited", "├─".dimmed(), report.edited.to_string().yellow());
    println!("  {} {} added", "├─".dimmed(), report.added.to_string().green());
    println!("  {} {} removed", "└─".dimmed(), report.removed.to_string().red());
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> sidedoc::Result<()> {
    let report = sidedoc::validate_file(input)?;
    if json {
        return print_json(&report);
    }
    success(format!(
        "{} is valid ({} blocks, {} styles, {} assets)",
        input.display(),
        report.blocks,
        report.styles,
        report.assets
    ));
    if report.content_modified {
        println!("  {} content.md has unsynced edits", "!".yellow());
    }
    for warning in &report.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..HASH_DISPLAY_LENGTH).unwrap_or(hash)
}

fn cmd_info(input: &Path, json: bool) -> sidedoc::Result<()> {
    let info = sidedoc::archive_info(input)?;
    if json {
        return print_json(&info);
    }
    let manifest = &info.manifest;

    println!("{}", "Archive Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Source".bold(), manifest.source_file);
    println!("{}: {}", "Format".bold(), manifest.version);
    println!("{}: {}", "Generator".bold(), manifest.generator);
    println!("{}: {}", "Created".bold(), manifest.created_at.to_rfc3339());
    println!("{}: {}", "Modified".bold(), manifest.modified_at.to_rfc3339());
    println!("{}: {}", "Source hash".bold(), short_hash(&manifest.source_hash));
    println!("{}: {}", "Content hash".bold(), short_hash(&manifest.content_hash));

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Blocks".bold(), info.blocks);
    println!("{}: {}", "Headings".bold(), info.headings);
    println!("{}: {}", "Paragraphs".bold(), info.paragraphs);
    println!("{}: {}", "List items".bold(), info.list_items);
    println!("{}: {}", "Images".bold(), info.images);
    println!("{}: {} ({} bytes)", "Assets".bold(), info.assets, info.asset_bytes);
    println!(
        "{}: {}",
        "Unsynced edits".bold(),
        if info.content_modified { "Yes" } else { "No" }
    );
    Ok(())
}

fn cmd_unpack(input: &Path, output: &Path) -> sidedoc::Result<()> {
    let written = sidedoc::unpack_file(input, output)?;
    success(format!(
        "Unpacked {} files to {}",
        written.len(),
        output.display()
    ));
    Ok(())
}

fn cmd_pack(input: &Path, output: &Path) -> sidedoc::Result<()> {
    let count = sidedoc::pack_dir(input, output)?;
    success(format!("Packed {} files into {}", count, output.display()));
    Ok(())
}

fn cmd_diff(input: &Path, threshold: f64, json: bool) -> sidedoc::Result<()> {
    let report = sidedoc::diff_file(input, &MatchOptions::new().with_threshold(threshold))?;
    if json {
        return print_json(&report);
    }
    if !report.has_changes() {
        success(format!("No changes in {}", input.display()));
        return Ok(());
    }

    for block in &report.removed {
        println!(
            "{} {}",
            "-".red().bold(),
            preview(&block.content, CONTENT_PREVIEW_LENGTH).red()
        );
    }
    for change in &report.modified {
        println!(
            "{} {} {}",
            "~".yellow().bold(),
            preview(&change.new.content, CONTENT_PREVIEW_LENGTH),
            format!("({:.0}% similar)", change.similarity * 100.0).dimmed()
        );
    }
    for block in &report.added {
        println!(
            "{} {}",
            "+".green().bold(),
            preview(&block.content, CONTENT_PREVIEW_LENGTH).green()
        );
    }
    println!();
    println!("{}", report.summary());
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "sidedoc".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Word documents as editable Markdown archives");
    println!();
    println!("Repository: {}", "https://github.com/sidedoc/sidedoc".dimmed());
    println!("License: MIT");
}
