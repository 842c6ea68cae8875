//! repomind CLI — thin front end over `repomind-engine`.
//!
//! Owns everything the engine deliberately doesn't: argv parsing, config
//! file loading, and logging setup.

use clap::{Parser, Subcommand};
use repomind_engine::config::EngineConfig;
use repomind_engine::engine::{suggest_session_id, Engine, SearchMode};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repomind", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to a `.repomind.toml` config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and index the project
    Analyze,
    /// Search identifiers
    Search {
        query: String,
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: SearchModeArg,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Rank symbols relevant to an intent
    Rank {
        intent: String,
        #[arg(long, default_value = "2000")]
        budget: usize,
    },
    /// Discover and cluster entrypoints
    Discover,
    /// Show dependency-impact analysis for changed files
    Impact {
        files: Vec<String>,
        #[arg(long, default_value = "2")]
        depth: usize,
    },
    /// List dependency cycles
    Cycles,
    /// Suggest a session id for a query
    SuggestSessionId { query: String },
    /// List saved sessions
    Sessions,
}

#[derive(Clone, clap::ValueEnum)]
enum SearchModeArg {
    Fuzzy,
    Semantic,
    Hybrid,
}

fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| std::env::current_dir().expect("could not determine current directory"))
        .canonicalize()
        .expect("project root not found")
}

fn load_config(path: Option<PathBuf>) -> EngineConfig {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(&p).unwrap_or_else(|e| {
                eprintln!("could not read {}: {e}", p.display());
                std::process::exit(1);
            });
            EngineConfig::from_toml_str(&text).unwrap_or_else(|e| {
                eprintln!("invalid config at {}: {e}", p.display());
                std::process::exit(1);
            })
        }
        None => EngineConfig::default(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("repomind=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = resolve_root(cli.root.clone());
    let config = load_config(cli.config.clone());
    let mut engine = Engine::new(root, config);

    match cli.command {
        Commands::Analyze => {
            let summary = engine.analyze().unwrap_or_else(|e| {
                eprintln!("analyze failed: {e}");
                std::process::exit(1);
            });
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "files_indexed": summary.files_indexed,
                        "tags_extracted": summary.tags_extracted,
                        "edges_built": summary.edges_built,
                        "cycles_found": summary.cycles_found,
                        "file_type_histogram": summary.file_type_histogram,
                        "identifier_kind_histogram": summary.identifier_kind_histogram,
                        "analyze_ms": summary.analyze_ms,
                    })
                );
            } else {
                println!("files indexed:  {}", summary.files_indexed);
                println!("tags extracted: {}", summary.tags_extracted);
                println!("edges built:    {}", summary.edges_built);
                println!("cycles found:   {}", summary.cycles_found);
                println!("analyze time:   {}ms", summary.analyze_ms);
                println!("file types:");
                for (ext, count) in &summary.file_type_histogram {
                    println!("  .{ext:<10} {count}");
                }
                println!("identifier kinds:");
                for (kind, count) in &summary.identifier_kind_histogram {
                    println!("  {kind:<14} {count}");
                }
            }
        }
        Commands::Search { query, mode, limit } => {
            engine.analyze().ok();
            let mode = match mode {
                SearchModeArg::Fuzzy => SearchMode::Fuzzy,
                SearchModeArg::Semantic => SearchMode::Semantic,
                SearchModeArg::Hybrid => SearchMode::Hybrid,
            };
            let results = engine.search(&query, mode);
            if cli.json {
                let items: Vec<_> = results.iter().take(limit).map(|r| serde_json::json!({"identifier": r.identifier, "score": r.score})).collect();
                println!("{}", serde_json::to_string_pretty(&items).unwrap());
            } else if results.is_empty() {
                eprintln!("no results for '{query}'");
                std::process::exit(1);
            } else {
                for r in results.iter().take(limit) {
                    println!("{:<40} {:>6.3}", r.identifier, r.score);
                }
            }
        }
        Commands::Rank { intent, budget } => {
            engine.analyze().ok();
            let ranked = engine.rank_for_intent(&intent, &BTreeSet::new(), budget);
            if cli.json {
                let items: Vec<_> = ranked
                    .iter()
                    .map(|r| serde_json::json!({"name": r.name, "file": r.file, "line": r.line, "score": r.score}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items).unwrap());
            } else {
                for r in &ranked {
                    println!("{:<30} {}:{:<6} {:>6.3}", r.name, r.file, r.line, r.score);
                }
            }
        }
        Commands::Discover => {
            engine.analyze().ok();
            let clusters = engine.discover();
            if cli.json {
                let items: Vec<_> = clusters
                    .iter()
                    .map(|c| serde_json::json!({"context_name": c.context_name, "confidence": c.confidence, "entrypoints": c.entrypoints.iter().map(|e| &e.identifier).collect::<Vec<_>>()}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items).unwrap());
            } else {
                for c in &clusters {
                    println!("{} (confidence {:.2})", c.context_name, c.confidence);
                    for ep in &c.entrypoints {
                        println!("  {} @ {}", ep.identifier, ep.location);
                    }
                }
            }
        }
        Commands::Impact { files, depth } => {
            engine.analyze().ok();
            let changed: BTreeSet<String> = files.into_iter().collect();
            let (affected, risk) = engine.impact(&changed, depth);
            if cli.json {
                println!("{}", serde_json::json!({"affected": affected, "risk": risk}));
            } else {
                println!("risk: {risk:.2}");
                for f in &affected {
                    println!("  {f}");
                }
            }
        }
        Commands::Cycles => {
            engine.analyze().ok();
            let cycles = engine.find_cycles();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cycles).unwrap());
            } else if cycles.is_empty() {
                println!("no cycles found");
            } else {
                for cycle in &cycles {
                    println!("{}", cycle.join(" -> "));
                }
            }
        }
        Commands::SuggestSessionId { query } => {
            let today = current_month_day();
            println!("{}", suggest_session_id(&query, today));
        }
        Commands::Sessions => match engine.session_list() {
            Ok(ids) => {
                for id in ids {
                    println!("{id}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    }
}

fn current_month_day() -> (u32, u32) {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let days_since_epoch = secs / 86_400;
    // Civil-from-days (Howard Hinnant's algorithm), good enough for a
    // human-facing session-name suggestion.
    let z = days_since_epoch as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (month, day)
}
