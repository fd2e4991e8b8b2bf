mod page;
mod pipeline;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use page::ParsedPage;
use pipeline::PageArtifacts;

#[derive(Parser)]
#[command(name = "aeo_scan", about = "AEO/GEO readiness analyzer for parsed pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one parsed-page JSON file and write its artifacts
    Analyze {
        /// ParsedPage JSON file
        input: PathBuf,
        /// Output directory for markdown/schema/artifact files
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Analyze every parsed-page JSON file in a directory
    Batch {
        /// Directory containing ParsedPage JSON files
        dir: PathBuf,
        /// Max pages to analyze (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Print the score breakdown for one parsed-page JSON file
    Score {
        /// ParsedPage JSON file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze { input, out } => {
            let page = load_page(&input)?;
            let artifacts = pipeline::build_page_artifacts(&page)
                .with_context(|| format!("pipeline failed for {}", page.url))?;
            fs::create_dir_all(&out)?;
            write_artifacts(&out, &artifacts)?;
            println!("{}", pipeline::build_summary_text(&page, &artifacts.score_pack));
            print_score_table(&artifacts);
            Ok(())
        }
        Commands::Batch { dir, limit, out } => {
            let pages = load_pages(&dir, limit)?;
            if pages.is_empty() {
                println!("No parsed-page JSON files found in {}", dir.display());
                return Ok(());
            }
            fs::create_dir_all(&out)?;
            println!("Analyzing {} pages...", pages.len());
            let (artifacts, errors) = run_batch(&pages);
            for a in &artifacts {
                write_artifacts(&out, a)?;
            }

            // Sitewide folds only once every per-page artifact exists
            let entities = pipeline::site_entities(&artifacts);
            let graph = pipeline::build_internal_link_graph(&pages);
            fs::write(out.join("entities.json"), serde_json::to_string_pretty(&entities)?)?;
            fs::write(out.join("link_graph.json"), serde_json::to_string_pretty(&graph)?)?;

            println!(
                "Done: {} analyzed, {} failed, {} sitewide entities, {} link edges.",
                artifacts.len(),
                errors,
                entities.len(),
                graph.len()
            );
            print_batch_table(&artifacts);
            Ok(())
        }
        Commands::Score { input } => {
            let page = load_page(&input)?;
            let artifacts = pipeline::build_page_artifacts(&page)
                .with_context(|| format!("pipeline failed for {}", page.url))?;
            print_score_table(&artifacts);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_page(path: &Path) -> Result<ParsedPage> {
    let payload =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let page = ParsedPage::from_json(&payload)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(page)
}

fn load_pages(dir: &Path, limit: Option<usize>) -> Result<Vec<ParsedPage>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    let mut pages = Vec::new();
    for path in entries {
        match load_page(&path) {
            Ok(page) => pages.push(page),
            // Malformed input isolates to the one file
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
        if let Some(limit) = limit {
            if pages.len() >= limit {
                break;
            }
        }
    }
    Ok(pages)
}

fn run_batch(pages: &[ParsedPage]) -> (Vec<PageArtifacts>, usize) {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results: Vec<_> = pages
        .par_iter()
        .map(|page| {
            let result = pipeline::build_page_artifacts(page);
            pb.inc(1);
            (page.url.clone(), result)
        })
        .collect();
    pb.finish_and_clear();

    let mut artifacts = Vec::new();
    let mut errors = 0usize;
    for (url, result) in results {
        match result {
            Ok(a) => artifacts.push(a),
            // Page-level failures never abort the batch
            Err(e) => {
                warn!("Page failed: {}: {}", url, e);
                errors += 1;
            }
        }
    }
    (artifacts, errors)
}

fn write_artifacts(out: &Path, artifacts: &PageArtifacts) -> Result<()> {
    let base = pipeline::safe_filename(&artifacts.page_meta.url);
    fs::write(
        out.join(format!("{}_page.md", base)),
        &artifacts.content_pack.markdown,
    )?;
    fs::write(
        out.join(format!("{}_schema.json", base)),
        serde_json::to_string_pretty(&artifacts.schema)?,
    )?;
    fs::write(
        out.join(format!("{}_artifacts.json", base)),
        serde_json::to_string_pretty(artifacts)?,
    )?;
    Ok(())
}

fn print_score_table(artifacts: &PageArtifacts) {
    let b = &artifacts.score_pack.breakdown;
    let rows = [
        ("answer_first", &b.answer_first),
        ("extractability", &b.extractability),
        ("entity_clarity", &b.entity_clarity),
        ("coverage", &b.coverage),
        ("schema_parity", &b.schema_parity),
    ];

    println!("\n{:<16} | {:>5} | {}", "Category", "Score", "Rules failed");
    println!("{}", "-".repeat(60));
    for (name, cat) in rows {
        println!(
            "{:<16} | {:>2}/{:<2} | {}",
            name,
            cat.score,
            cat.max,
            if cat.rules_failed.is_empty() {
                "-".to_string()
            } else {
                cat.rules_failed.join("; ")
            }
        );
    }
    println!(
        "{:<16} | {:>5} | intent={}, faq={}, checks={}/{}",
        "total",
        artifacts.score_pack.total,
        artifacts.intent.as_str(),
        artifacts.content_pack.faq.len(),
        artifacts.test_report.passed_checks,
        artifacts.test_report.total_checks
    );
}

fn print_batch_table(artifacts: &[PageArtifacts]) {
    println!(
        "\n{:>3} | {:<48} | {:<26} | {:>5} | {:>6}",
        "#", "URL", "Intent", "Score", "Checks"
    );
    println!("{}", "-".repeat(100));
    for (i, a) in artifacts.iter().enumerate() {
        println!(
            "{:>3} | {:<48} | {:<26} | {:>5} | {:>3}/{:<2}",
            i + 1,
            truncate(&a.page_meta.url, 48),
            a.intent.as_str(),
            a.score_pack.total,
            a.test_report.passed_checks,
            a.test_report.total_checks
        );
    }
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
