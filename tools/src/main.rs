use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use busmsg_tools::{dump_message, format_report_pretty, inspect_message};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;

#[derive(Parser)]
#[command(
    name = "busmsg-tools",
    version,
    about = "Inspect and dump serialized D-Bus messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize the header and header fields of captured messages.
    Inspect {
        /// A message capture, or a directory of captures.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected captures.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected captures (after sorting).
        #[arg(long)]
        limit: Option<usize>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = InspectFormat::Pretty)]
        format: InspectFormat,
    },
    /// Render the full body walk of one captured message.
    Dump {
        /// A message capture.
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectFormat {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect {
            path,
            glob,
            sort,
            limit,
            format,
        } => {
            if path.is_dir() {
                let mut entries = collect_capture_entries(&path, glob.as_deref())?;
                entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    let bytes = fs::read(&entry.path)
                        .with_context(|| format!("read capture {}", entry.path.display()))?;
                    println!("== {} ({} bytes) ==", entry.path.display(), entry.size);
                    print_report(&bytes, format)?;
                }
            } else {
                let bytes = fs::read(&path)
                    .with_context(|| format!("read capture {}", path.display()))?;
                print_report(&bytes, format)?;
            }
        }
        Command::Dump { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("read capture {}", file.display()))?;
            let text = dump_message(&bytes)
                .map_err(|err| anyhow::anyhow!("parse capture {}: {err}", file.display()))?;
            print!("{text}");
        }
    }
    Ok(())
}

fn print_report(bytes: &[u8], format: InspectFormat) -> Result<()> {
    let report =
        inspect_message(bytes).map_err(|err| anyhow::anyhow!("parse capture: {err}"))?;
    match format {
        InspectFormat::Pretty => print!("{}", format_report_pretty(&report)),
        InspectFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("serialize json")?;
            println!("{json}");
        }
    }
    Ok(())
}

struct CaptureEntry {
    path: PathBuf,
    size: u64,
}

fn collect_capture_entries(dir: &PathBuf, glob: Option<&str>) -> Result<Vec<CaptureEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(CaptureEntry { path, size });
    }
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<CaptureEntry>,
    sort: Option<InspectSort>,
) -> Vec<CaptureEntry> {
    match sort {
        Some(InspectSort::Size) => {
            entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        }
        None => {}
    }
    entries
}
