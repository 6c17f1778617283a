//! CLI tool for removing "Made with ..." watermarks from presentations and PDFs.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use unmark_engine::{output_filename, PageOutcome, Remover, StripReport};

/// Remove watermark badges, links and footer text from .pptx and .pdf files.
#[derive(Parser, Debug)]
#[command(name = "unmark")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s) (.pptx or .pdf)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name (only with a single input)
    #[arg(long)]
    output_name: Option<String>,

    /// Also blank author, title and company metadata
    #[arg(long)]
    scrub_metadata: bool,

    /// Print a JSON report per file instead of a summary line
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// One line of `--json` output.
#[derive(Debug, Serialize)]
struct FileReport<'a> {
    input: String,
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a StripReport>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if args.output_name.is_some() && args.input.len() > 1 {
        eprintln!("--output-name can only be used with a single input file");
        return ExitCode::from(2);
    }

    let remover = Remover::new().with_metadata_scrub(args.scrub_metadata);
    let mut failed = false;

    for input_path in &args.input {
        if args.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        match process_file(input_path, &args, &remover) {
            Ok((output_path, report)) => {
                if args.json {
                    print_json(&FileReport {
                        input: input_path.display().to_string(),
                        output: Some(output_path.display().to_string()),
                        error: None,
                        kind: None,
                        report: Some(&report),
                    });
                } else {
                    println!("{}", summary(input_path, &output_path, &report));
                }
            }
            Err(e) => {
                failed = true;
                if args.json {
                    print_json(&FileReport {
                        input: input_path.display().to_string(),
                        output: None,
                        error: Some(format!("{:#}", e)),
                        kind: e.downcast_ref::<unmark_engine::Error>().map(|e| e.kind()),
                        report: None,
                    });
                } else {
                    eprintln!("Error processing {}: {:#}", input_path.display(), e);
                }
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Clean a single file and write the result; returns the output path.
fn process_file(input_path: &Path, args: &Args, remover: &Remover) -> Result<(PathBuf, StripReport)> {
    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let bytes = fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    log::debug!("Read {} bytes from {}", bytes.len(), input_path.display());

    let cleaned = remover.clean_upload(&bytes, filename)?;

    if args.verbose {
        eprintln!(
            "  {} unit(s), {} removal(s)",
            cleaned.report.unit_count,
            cleaned.report.removed_count()
        );
    }

    let name = args.output_name.clone().unwrap_or(cleaned.filename);
    let output_path = get_output_path(input_path, args.output.as_ref(), &name)?;
    fs::write(&output_path, &cleaned.bytes)
        .with_context(|| format!("Failed to write to {}", output_path.display()))?;

    if args.verbose {
        eprintln!("Written to: {}", output_path.display());
    }

    Ok((output_path, cleaned.report))
}

/// Determine the output path for a processed file.
fn get_output_path(input_path: &Path, output_dir: Option<&PathBuf>, name: &str) -> Result<PathBuf> {
    let output_path = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(name)
        }
        None => match input_path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        },
    };

    Ok(output_path)
}

/// One-line human summary of a cleaned file.
fn summary(input_path: &Path, output_path: &Path, report: &StripReport) -> String {
    let mut line = format!(
        "{} -> {}: removed {} element(s)",
        input_path.display(),
        output_path.display(),
        report.removed_count()
    );

    let failed = report.failed_pages();
    if !failed.is_empty() {
        let pages: Vec<String> = failed.iter().map(|(page, _)| page.to_string()).collect();
        line.push_str(&format!(
            "; {} page(s) could not be parsed and were left as is ({})",
            failed.len(),
            pages.join(", ")
        ));
    } else if report.removals.is_empty() && !report.pages.is_empty() {
        let unchanged = report
            .pages
            .values()
            .filter(|o| **o == PageOutcome::Unchanged)
            .count();
        line.push_str(&format!("; {} page(s) unchanged", unchanged));
    }

    if report.metadata_scrubbed {
        line.push_str("; metadata scrubbed");
    }
    line
}

fn print_json(report: &FileReport) {
    match serde_json::to_string(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize report: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unmark_engine::{DocumentFormat, Location, Removal, RemovalKind};

    #[test]
    fn test_output_path_next_to_input() {
        let path = get_output_path(Path::new("decks/board.pptx"), None, "board-clean.pptx").unwrap();
        assert_eq!(path, PathBuf::from("decks/board-clean.pptx"));
        assert_eq!(output_filename("board.pptx"), "board-clean.pptx");
    }

    #[test]
    fn test_summary_mentions_failed_pages() {
        let mut report = StripReport::new(DocumentFormat::PageDocument);
        report.add_removal(Removal::new(Location::Page(1), RemovalKind::TextOperator, "Tj 'Made with Gamma'"));
        report.set_page(1, PageOutcome::Cleaned { removed: 1 });
        report.set_page(3, PageOutcome::Failed { reason: "unterminated string".into() });

        let line = summary(Path::new("a.pdf"), Path::new("a-clean.pdf"), &report);
        assert!(line.starts_with("a.pdf -> a-clean.pdf: removed 1 element(s)"));
        assert!(line.contains("1 page(s) could not be parsed and were left as is (3)"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["unmark", "a.pptx", "-o", "out", "--scrub-metadata", "--json"]).unwrap();
        assert_eq!(args.input, vec![PathBuf::from("a.pptx")]);
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert!(args.scrub_metadata);
        assert!(args.json);
        assert!(!args.verbose);

        assert!(Args::try_parse_from(["unmark"]).is_err());
    }
}
