mod batch;
mod dataset;
mod error;
mod parser;
mod runs;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use parser::assemble::LabelStyle;

#[derive(Parser)]
#[command(name = "html_pairs", about = "Build problem/solution training pairs from HTML pages")]
struct Cli {
    /// Config file (default: ./html_pairs.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract pairs from every page in the input directory
    Extract {
        /// Directory of exported pages
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write rejected pages and reasons to this file
        #[arg(long)]
        rejects: Option<PathBuf>,
        /// File extension to pick up (without the dot)
        #[arg(short, long)]
        extension: Option<String>,
        /// How target sections are labelled
        #[arg(long, value_enum)]
        style: Option<LabelStyle>,
        /// Reject pages with invalid UTF-8 instead of dropping the bad bytes
        #[arg(long)]
        strict_utf8: bool,
    },
    /// Show the sections found in one page
    Inspect { file: PathBuf },
    /// Check a training-pair file before handing it to fine-tuning
    Validate { file: PathBuf },
    /// Validate a training-pair file and snapshot it into a new run directory
    Stage { file: PathBuf },
    /// Manage versioned run directories
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List runs, newest first
    List,
    /// Print the newest run directory
    Latest,
    /// Delete all but the newest runs
    Prune {
        /// Runs to keep (default: keep_runs from config)
        #[arg(short, long)]
        keep: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            rejects,
            extension,
            style,
            strict_utf8,
        } => {
            if let Some(v) = input {
                settings.input_dir = v;
            }
            if let Some(v) = output {
                settings.output = v;
            }
            if rejects.is_some() {
                settings.rejects = rejects;
            }
            if let Some(v) = extension {
                settings.extension = v;
            }
            if let Some(v) = style {
                settings.label_style = v;
            }
            if strict_utf8 {
                settings.strict_utf8 = true;
            }
            extract(&settings)
        }
        Commands::Inspect { file } => {
            let markup = batch::read_document(&file, settings.strict_utf8)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let sections = parser::extract(&markup, &settings.labels.vocabulary())?;
            for section in sections.iter() {
                println!("── {} ──", section.label);
                if section.text.is_empty() {
                    println!("(not found)\n");
                } else {
                    println!("{}\n", section.text);
                }
            }
            Ok(())
        }
        Commands::Validate { file } => {
            let ds = dataset::load(&file)?;
            dataset::validate(&ds)?;
            println!("{:?}: {} pairs OK", file, ds.data.len());
            Ok(())
        }
        Commands::Stage { file } => {
            let ds = dataset::load(&file)?;
            dataset::validate(&ds)?;
            let registry = runs::RunRegistry::new(&settings.runs_dir);
            let run = registry.stage(&file, &ds)?;
            println!("Staged {} pairs → {}", ds.data.len(), run.display());
            let pruned = registry.prune(settings.keep_runs)?;
            if !pruned.is_empty() {
                println!("Pruned {} old runs (keeping {})", pruned.len(), settings.keep_runs);
            }
            Ok(())
        }
        Commands::Runs { action } => {
            let registry = runs::RunRegistry::new(&settings.runs_dir);
            match action {
                RunsAction::List => {
                    let all = registry.list()?;
                    if all.is_empty() {
                        println!("No runs in {:?}.", registry.root());
                    }
                    for run in &all {
                        println!("{}", run.display());
                    }
                }
                RunsAction::Latest => match registry.latest()? {
                    Some(run) => println!("{}", run.display()),
                    None => println!("No runs in {:?}.", registry.root()),
                },
                RunsAction::Prune { keep } => {
                    let keep = keep.unwrap_or(settings.keep_runs);
                    let removed = registry.prune(keep)?;
                    println!("Removed {} runs (keeping {}).", removed.len(), keep);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn extract(settings: &settings::Settings) -> anyhow::Result<()> {
    let paths = batch::list_documents(&settings.input_dir, &settings.extension)?;
    if paths.is_empty() {
        warn!(input = ?settings.input_dir, extension = %settings.extension, "no matching documents");
    }
    info!(documents = paths.len(), input = ?settings.input_dir, "extracting");

    let vocab = settings.labels.vocabulary();
    let collection = batch::run(&paths, &vocab, settings.label_style, settings.strict_utf8);

    dataset::write_collection(&settings.output, &collection)?;
    if let Some(rejects) = &settings.rejects {
        dataset::write_rejects(rejects, &collection.rejected)?;
    }

    println!(
        "\nGenerated {} pairs → {} ({} rejected)",
        collection.pairs.len(),
        settings.output.display(),
        collection.rejected.len()
    );
    if !collection.rejected.is_empty() {
        println!("Skipped:");
        for r in &collection.rejected {
            println!("  - {} ({})", r.file, truncate(&r.reason, 80));
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
