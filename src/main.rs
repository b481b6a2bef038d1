// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thin command-line front-end. All behaviour lives in the library; this
//! file only parses flags, wires signals and prints.

use std::collections::HashSet;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};
use tracing::info;
use tracing_subscriber::EnvFilter;

use macsweep::engine::Engine;
use macsweep::error::Error;
use macsweep::registry::{help_manifest, Registry};
use macsweep::report::ScanSummary;
use macsweep::safety::Safety;
use macsweep::scanners::register_defaults;
use macsweep::server::{Server, ServerConfig};
use macsweep::walkthrough::walkthrough;
use macsweep::ScanEvent;

#[derive(Parser)]
#[command(name = "macsweep", version, about = "Reclaim disk space from caches, logs and leftovers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the engine over a local Unix socket
    Serve {
        /// Socket path to listen on
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Close idle connections after this many seconds
        #[arg(long, default_value_t = 300)]
        idle_timeout: u64,
    },
    /// Scan and print what could be reclaimed
    Scan {
        /// Category ids to exclude
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
        /// Print the raw scan summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan, pick entries interactively, confirm, delete
    Clean {
        /// Only clean these category ids
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },
    /// List registered scanners
    Categories,
    /// Print the JSON manifest of scanners, categories and risk levels
    Manifest,
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("macsweep.sock")
}

fn build_engine() -> Result<Engine, Error> {
    let mut registry = Registry::new();
    register_defaults(&mut registry);
    Ok(Engine::new(registry, Safety::new()?))
}

fn print_summary(summary: &ScanSummary) {
    for category in &summary.categories {
        println!(
            "{:<24} {:>12}   {} entries",
            category.category,
            format_size(category.total_size, DECIMAL),
            category.entries.len()
        );
    }
    if !summary.permission_issues.is_empty() {
        println!("{} path(s) could not be read:", summary.permission_issues.len());
        for issue in &summary.permission_issues {
            println!("  {}: {}", issue.path, issue.description);
        }
    }
    println!(
        "total reclaimable: {}",
        format_size(summary.total_size, DECIMAL)
    );
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            socket,
            idle_timeout,
        } => {
            let config = ServerConfig::new(socket.unwrap_or_else(default_socket_path))
                .idle_timeout(Duration::from_secs(idle_timeout));
            let server = Server::new(build_engine()?, config);

            let shutdown = server.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
            });

            server.run().await
        }
        Command::Scan { skip, json } => {
            let engine = build_engine()?;
            let skip: HashSet<String> = skip.into_iter().collect();
            let (summary, _token) = engine
                .scan_to_end(skip, |event| {
                    if let ScanEvent::ScannerStart { label, .. } = event {
                        eprintln!("scanning {label}...");
                    }
                })
                .await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .map_err(|err| Error::Protocol(err.to_string()))?
                );
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        Command::Clean { categories } => {
            let engine = build_engine()?;
            let (summary, _token) = engine.scan_to_end(HashSet::new(), |_| {}).await?;

            let considered: Vec<_> = if categories.is_empty() {
                summary.categories
            } else {
                summary
                    .categories
                    .into_iter()
                    .filter(|c| categories.contains(&c.category))
                    .collect()
            };
            if considered.iter().all(|c| c.entries.is_empty()) {
                println!("nothing to clean");
                return Ok(());
            }

            let selected = {
                let stdin = stdin();
                let mut input = stdin.lock();
                let mut output = stdout();
                walkthrough(&mut input, &mut output, &considered)?
            };
            if selected.is_empty() {
                println!("nothing selected");
                return Ok(());
            }

            let total: u64 = selected.iter().map(|c| c.total_size).sum();
            let count: usize = selected.iter().map(|c| c.entries.len()).sum();
            print!(
                "delete {count} entr{} ({})? [y/N] ",
                if count == 1 { "y" } else { "ies" },
                format_size(total, DECIMAL)
            );
            stdout().flush()?;
            let mut answer = String::new();
            stdin().read_line(&mut answer)?;
            if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                println!("aborted");
                return Ok(());
            }

            let result = engine.cleanup_selected(selected).await;
            println!(
                "removed {} entr{}, freed {}; {} failure(s)",
                result.removed,
                if result.removed == 1 { "y" } else { "ies" },
                format_size(result.bytes_freed, DECIMAL),
                result.failed
            );
            for error in &result.errors {
                eprintln!("  {error}");
            }
            Ok(())
        }
        Command::Categories => {
            let engine = build_engine()?;
            for info in engine.registry().categories() {
                match &info.description {
                    Some(description) => println!("{:<20} {}: {}", info.id, info.name, description),
                    None => println!("{:<20} {}", info.id, info.name),
                }
            }
            Ok(())
        }
        Command::Manifest => {
            let engine = build_engine()?;
            let manifest = help_manifest(engine.registry());
            println!(
                "{}",
                serde_json::to_string_pretty(&manifest)
                    .map_err(|err| Error::Protocol(err.to_string()))?
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}
