use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ctxsteer::config::load_config;
use ctxsteer::rules::RuleKind;
use ctxsteer::server::run_stdio_server;
use ctxsteer::session::{scan_repo, Session};
use ctxsteer::view::{RuleFilter, RuleView, SortDirection, SortKey};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "ctxsteer")]
#[command(version)]
#[command(about = "Steer which files of a codebase become assistant context")]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a pattern to a rule collection (include, autoInclude, exclude)
    Add { kind: RuleKind, pattern: String },

    /// Remove a pattern from a rule collection
    Remove { kind: RuleKind, pattern: String },

    /// Show every rule with the files and tokens it matches
    Rules {
        /// Sort by tokens, files or rule kind
        #[arg(long)]
        sort: Option<SortKey>,

        /// Ascending order
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        /// Descending order
        #[arg(long)]
        desc: bool,

        /// Only show one collection: all, include, autoInclude, exclude
        #[arg(long)]
        filter: Option<RuleFilter>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the rules and write {output_dir}/active_context.xml
    Snapshot {
        /// Also print the XML payload to stdout
        #[arg(long)]
        xml: bool,

        /// Print the selected files as JSON
        #[arg(long, conflicts_with = "xml")]
        json: bool,
    },

    /// Start the JSON-RPC stdio server
    Serve,
}

fn open_session(repo_root: &Path) -> Result<Session> {
    let cfg = load_config(repo_root);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} scanning files...")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let report = scan_repo(repo_root, &cfg)?;
    spinner.finish_with_message(format!("scanned {} files", report.listing.len()));

    if report.skipped_size > 0 {
        eprintln!("[ctxsteer] skipped {} empty or oversized files", report.skipped_size);
    }
    for path in &report.unreadable {
        eprintln!("[ctxsteer] WARN: could not read {path}");
    }

    Ok(Session::from_parts(repo_root, cfg, report))
}

fn percent(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

fn print_table(view: &RuleView) {
    if view.rows.is_empty() {
        if view.rule_count == 0 {
            println!("No rules yet; every scanned file is included.");
        } else {
            println!("No {} rules ({} in total).", view.view.rule_filter, view.rule_count);
        }
        return;
    }

    let width = view
        .rows
        .iter()
        .map(|r| r.rule.pattern.chars().count())
        .max()
        .unwrap_or(0)
        .max("PATTERN".len());

    println!("{:<14} {:<width$} {:>14} {:>16}", "RULE", "PATTERN", "FILES", "TOKENS");
    for row in &view.rows {
        let files = format!("{} ({})", row.rule.matched_file_count, percent(row.file_share));
        let tokens = format!("{} ({})", row.rule.matched_token_count, percent(row.token_share));
        println!(
            "{:<14} {:<width$} {:>14} {:>16}",
            row.rule.kind.label(),
            row.rule.pattern,
            files,
            tokens
        );
    }
    println!(
        "{} of {} rules, {} files, {} tokens ({} by {}, {})",
        view.rows.len(),
        view.rule_count,
        view.total_files,
        view.total_tokens,
        view.view.rule_filter,
        view.view.sort_key,
        view.view.sort_direction
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let repo_root = match cli.repo {
        Some(p) => p,
        None => std::env::current_dir().context("Failed to get current dir")?,
    };

    match cli.cmd {
        Command::Serve => return run_stdio_server(),
        Command::Add { kind, pattern } => {
            let mut session = open_session(&repo_root)?;
            if session.add_pattern(kind, &pattern)? {
                eprintln!("Added {kind} rule `{}`", pattern.trim());
            } else {
                eprintln!("No change: {kind} rule `{}` is blank or already present", pattern.trim());
            }
            print_table(session.engine().rule_view());
        }
        Command::Remove { kind, pattern } => {
            let mut session = open_session(&repo_root)?;
            if session.remove_pattern(kind, &pattern)? {
                eprintln!("Removed {kind} rule `{}`", pattern.trim());
            } else {
                eprintln!("No change: no {kind} rule `{}`", pattern.trim());
            }
            print_table(session.engine().rule_view());
        }
        Command::Rules {
            sort,
            asc,
            desc,
            filter,
            json,
        } => {
            let mut session = open_session(&repo_root)?;
            let engine = session.engine();
            if let Some(key) = sort {
                engine.set_sort_key(key);
            }
            if asc {
                engine.set_sort_direction(SortDirection::Asc);
            } else if desc {
                engine.set_sort_direction(SortDirection::Desc);
            }
            if let Some(filter) = filter {
                engine.set_rule_filter(filter);
            }

            for bad in &engine.resolution().invalid_patterns {
                eprintln!("[ctxsteer] WARN: invalid {} pattern `{}` matches nothing", bad.kind, bad.pattern);
            }

            let view = engine.rule_view();
            if json {
                println!("{}", serde_json::to_string_pretty(view)?);
            } else {
                print_table(view);
            }
        }
        Command::Snapshot { xml, json } => {
            let mut session = open_session(&repo_root)?;
            let (out_path, payload) = session.write_payload()?;
            let snapshot = session.engine().snapshot();
            if xml {
                print!("{}", payload);
            } else if json {
                let out = json!({
                    "files": snapshot.files,
                    "fileCount": snapshot.len(),
                    "totalTokens": snapshot.total_tokens(),
                    "payloadPath": out_path.to_string_lossy(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!(
                    "Wrote {} files ({} tokens) to {}",
                    snapshot.len(),
                    snapshot.total_tokens(),
                    out_path.display()
                );
            }
        }
    }

    Ok(())
}
