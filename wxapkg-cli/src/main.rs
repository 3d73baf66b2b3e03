use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

use wxapkg_core::{
    orchestrator, transform, ExtractStats, RestoredConfig, WxapkgError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decrypt, extract, and restore wxapkg mini-program archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory for wxid subdirectories and unpack one
    Scan {
        /// Root directory containing wxid subdirectories
        #[arg(short, long)]
        root: PathBuf,
        /// Output directory (defaults to the chosen wxid)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker pool width
        #[arg(short = 'n', long, default_value_t = 30)]
        thread: usize,
        /// Disable the .json/.js/.html pretty-printers
        #[arg(long)]
        disable_beautify: bool,
    },
    /// Decrypt and extract a single archive or a directory of archives
    Unpack {
        /// Path to a .wxapkg file or a directory containing them
        #[arg(short, long)]
        root: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "unpack")]
        output: PathBuf,
        /// Explicit identifier, overriding path inference
        #[arg(long)]
        identifier: Option<String>,
        /// Worker pool width
        #[arg(short = 'n', long, default_value_t = 30)]
        thread: usize,
        /// Disable the .json/.js/.html pretty-printers
        #[arg(long)]
        disable_beautify: bool,
        /// Emit a machine-readable JSON summary instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Reconstruct WXSS / WXML / config sources from an unpacked tree
    Restore {
        /// Unpacked mini-program directory
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for restored sources
        #[arg(short, long)]
        output: PathBuf,
        /// Which restoration subsystem to run
        #[arg(short = 't', long, default_value = "all")]
        r#type: RestoreType,
        /// Emit a machine-readable JSON summary instead of tables
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum RestoreType {
    Wxss,
    Wxml,
    Config,
    All,
}

#[derive(Debug, Serialize)]
struct UnpackSummary {
    archive: String,
    total: usize,
    failed: usize,
    by_extension: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct RestoreSummary {
    wxss_files: usize,
    wxml_files: usize,
    config_files: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<WxapkgError>() {
        Some(WxapkgError::BadMarks { .. })
        | Some(WxapkgError::NameTooLong(_))
        | Some(WxapkgError::EntryOutOfBounds { .. })
        | Some(WxapkgError::Truncated(_))
        | Some(WxapkgError::InvalidEntryName)
        | Some(WxapkgError::ArchiveTooShort { .. }) => 2,
        Some(WxapkgError::BadIdentifier(_)) | Some(WxapkgError::UnresolvedIdentifier(_)) => 1,
        Some(WxapkgError::NoArchives(_)) => 1,
        Some(WxapkgError::Io { .. }) => 3,
        None => 3,
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Scan {
            root,
            output,
            thread,
            disable_beautify,
        } => run_scan(root, output, thread, disable_beautify),
        Commands::Unpack {
            root,
            output,
            identifier,
            thread,
            disable_beautify,
            json,
        } => run_unpack(root, output, identifier, thread, disable_beautify, json),
        Commands::Restore {
            input,
            output,
            r#type,
            json,
        } => run_restore(input, output, r#type, json),
    }
}

fn run_scan(root: PathBuf, output: Option<PathBuf>, thread: usize, disable_beautify: bool) -> Result<i32> {
    if !root.exists() {
        anyhow::bail!("root directory does not exist: {}", root.display());
    }

    println!("{} scanning {}", "→".cyan(), root.display());

    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&root).with_context(|| format!("reading {}", root.display()))? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(wxid) = orchestrator::infer_identifier(&PathBuf::from(&name)) {
            candidates.push((wxid, entry.path()));
        }
    }

    if candidates.is_empty() {
        println!("{} no mini-programs found under {}", "!".yellow(), root.display());
        return Ok(0);
    }

    candidates.sort();
    println!("{} found {} mini-program(s):", "✓".green(), candidates.len());
    for (i, (wxid, path)) in candidates.iter().enumerate() {
        println!("  [{i}] {wxid}  ({})", path.display());
    }

    let (wxid, chosen_root) = candidates.into_iter().next().expect("checked non-empty above");
    let output_dir = output.unwrap_or_else(|| PathBuf::from(&wxid));

    println!("{} unpacking {wxid} -> {}", "→".cyan(), output_dir.display());
    let transforms = registry_for(disable_beautify);
    let archives = orchestrator::scan_wxapkg_files(&chosen_root);
    if archives.is_empty() {
        anyhow::bail!("no .wxapkg files found under {}", chosen_root.display());
    }

    let mut summaries = Vec::new();
    for archive in archives {
        let stats = unpack_one(&archive, &wxid, &output_dir, thread, &transforms)?;
        summaries.push(stats_to_summary(&archive, &stats));
    }

    render_unpack_summaries(&summaries, false);
    Ok(0)
}

fn run_unpack(
    root: PathBuf,
    output: PathBuf,
    identifier: Option<String>,
    thread: usize,
    disable_beautify: bool,
    json: bool,
) -> Result<i32> {
    if !root.exists() {
        anyhow::bail!("path does not exist: {}", root.display());
    }

    let wxid = orchestrator::resolve_identifier(identifier.as_deref(), &root)?;
    tracing::info!(identifier = %wxid, root = %root.display(), "resolved identifier");
    if !json {
        println!("{} identifier: {wxid}", "→".cyan());
        println!("{} worker threads: {thread}", "→".cyan());
        println!(
            "{} code pretty-printing: {}",
            "→".cyan(),
            if disable_beautify { "disabled" } else { "enabled" }
        );
    }

    let transforms = registry_for(disable_beautify);
    let archives = orchestrator::scan_wxapkg_files(&root);
    if archives.is_empty() {
        anyhow::bail!("no .wxapkg files found at {}", root.display());
    }

    let mut summaries = Vec::new();
    for archive in archives {
        let stats = unpack_one(&archive, &wxid, &output, thread, &transforms)?;
        summaries.push(stats_to_summary(&archive, &stats));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        render_unpack_summaries(&summaries, true);
    }

    Ok(0)
}

fn unpack_one(
    archive: &PathBuf,
    identifier: &str,
    output: &PathBuf,
    thread: usize,
    transforms: &HashMap<&'static str, transform::Transform>,
) -> Result<ExtractStats> {
    let on_progress = |done: usize, total: usize| {
        eprint!("\rextracting {done}/{total}");
        if done == total {
            eprintln!();
        }
    };

    orchestrator::unpack_archive(
        archive,
        identifier,
        output,
        thread,
        transforms,
        Some(&on_progress),
    )
    .with_context(|| format!("unpacking {}", archive.display()))
}

fn registry_for(disable_beautify: bool) -> HashMap<&'static str, transform::Transform> {
    if disable_beautify {
        transform::disabled_registry()
    } else {
        transform::default_registry()
    }
}

fn stats_to_summary(archive: &std::path::Path, stats: &ExtractStats) -> UnpackSummary {
    UnpackSummary {
        archive: archive.display().to_string(),
        total: stats.total,
        failed: stats.failed,
        by_extension: stats.by_extension.clone(),
    }
}

fn render_unpack_summaries(summaries: &[UnpackSummary], per_archive_heading: bool) {
    for summary in summaries {
        if per_archive_heading {
            println!("\n{} {}", "✓".green(), summary.archive);
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Extension").fg(comfy_table::Color::Blue),
                Cell::new("Count").fg(comfy_table::Color::Blue),
            ]);
        for (ext, count) in &summary.by_extension {
            table.add_row(vec![Cell::new(ext), Cell::new(count.to_string())]);
        }
        println!("{table}");
        println!(
            "{} {} entries extracted, {} failed",
            "✓".green(),
            summary.total,
            summary.failed
        );
    }
}

fn run_restore(input: PathBuf, output: PathBuf, kind: RestoreType, json: bool) -> Result<i32> {
    if !input.exists() {
        anyhow::bail!("input directory does not exist: {}", input.display());
    }
    std::fs::create_dir_all(&output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let mut summary = RestoreSummary {
        wxss_files: 0,
        wxml_files: 0,
        config_files: 0,
    };

    if matches!(kind, RestoreType::Wxss | RestoreType::All) {
        let styles = wxapkg_core::restore::wxss::restore(&input);
        for record in styles.values() {
            write_output(&output, &record.logical_path, &record.css_text)?;
        }
        summary.wxss_files = styles.len();
    }

    if matches!(kind, RestoreType::Wxml | RestoreType::All) {
        let templates = wxapkg_core::restore::wxml::restore(&input);
        for (path, content) in &templates {
            write_output(&output, path, content)?;
        }
        summary.wxml_files = templates.len();
    }

    if matches!(kind, RestoreType::Config | RestoreType::All) {
        let restored: RestoredConfig = wxapkg_core::restore::config::restore(&input);
        let rendered = wxapkg_core::restore::config::render(&input, &restored);
        for (path, content) in &rendered {
            write_output(&output, path, content)?;
        }
        summary.config_files = rendered.len();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} restored {} wxss, {} wxml, {} config file(s) to {}",
            "✓".green(),
            summary.wxss_files,
            summary.wxml_files,
            summary.config_files,
            output.display()
        );
    }

    Ok(0)
}

fn write_output(output_root: &std::path::Path, rel_path: &str, content: &str) -> Result<()> {
    let dest = output_root.join(rel_path);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&dest, content).with_context(|| format!("writing {}", dest.display()))
}
