//! ResultSieve CLI
//!
//! Normalize block lists, check links or saved result pages against them, and
//! keep a file-backed copy of the extension storage with a refreshed remote list.

mod file_store;
mod http;

use std::fs;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};

use sieve_core::link::resolve_href;
use sieve_core::{EffectiveLists, FilterEngine, MatchDecision, MemoryDocument, PageContext, RenderSurface};
use sieve_lists::{build_effective_lists, parse_domain_list, ListSources, ListToggles};
use sieve_runtime::{
    clear_remote_cache, load_snapshot, refresh_remote_list, RefreshOrigin, RefreshPolicy, RuntimeConfig,
};

use crate::file_store::FileStore;
use crate::http::HttpFetcher;

#[derive(Parser)]
#[command(name = "sieve-cli")]
#[command(about = "ResultSieve block list tools")]
struct Cli {
    /// JSON runtime configuration (storage keys, remote URL, link settings)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize list files into one canonical domain per line
    Normalize {
        /// Input list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Print per-file counts
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decide links against block and allow lists
    Check {
        /// Blocklist files; the built-in defaults apply when they yield nothing
        #[arg(short, long)]
        block: Vec<String>,

        /// Allowlist files
        #[arg(short, long)]
        allow: Vec<String>,

        /// Remote (hosts-format) list file to include
        #[arg(short, long)]
        remote: Option<String>,

        /// Page the links appear on
        #[arg(short, long, default_value = "https://www.google.com/search")]
        page: String,

        /// Hrefs to check, as found in result anchors
        #[arg(required = true)]
        links: Vec<String>,
    },

    /// Run the filter over a saved results page
    Scan {
        /// Saved HTML page
        html: String,

        /// Blocklist files; the built-in defaults apply when they yield nothing
        #[arg(short, long)]
        block: Vec<String>,

        /// Allowlist files
        #[arg(short, long)]
        allow: Vec<String>,

        /// Remote (hosts-format) list file to include
        #[arg(short, long)]
        remote: Option<String>,

        /// URL the page was saved from
        #[arg(short, long, default_value = "https://www.google.com/search")]
        page: String,

        /// Write the filtered page here
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Refresh the cached remote list in a storage file
    Fetch {
        /// Storage JSON file
        #[arg(short, long, default_value = "sieve-storage.json")]
        store: String,

        /// List URL (defaults to the configured remote list)
        #[arg(short, long)]
        url: Option<String>,

        /// Fetch even if the cache is fresh
        #[arg(short, long)]
        force: bool,

        /// Drop the cached list instead of fetching
        #[arg(long, conflicts_with = "force")]
        clear: bool,
    },

    /// Show settings and effective list sizes from a storage file
    Status {
        /// Storage JSON file
        #[arg(short, long, default_value = "sieve-storage.json")]
        store: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Normalize {
            input,
            output,
            verbose,
        } => cmd_normalize(&input, output.as_deref(), verbose),
        Commands::Check {
            block,
            allow,
            remote,
            page,
            links,
        } => cmd_check(&config, &block, &allow, remote.as_deref(), &page, &links),
        Commands::Scan {
            html,
            block,
            allow,
            remote,
            page,
            output,
        } => cmd_scan(&config, &html, &block, &allow, remote.as_deref(), &page, output.as_deref()),
        Commands::Fetch {
            store,
            url,
            force,
            clear,
        } => cmd_fetch(&config, &store, url.as_deref(), force, clear),
        Commands::Status { store } => cmd_status(&config, &store),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<RuntimeConfig, String> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    RuntimeConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn read_lines(paths: &[String]) -> Result<Vec<String>, String> {
    let mut lines = Vec::new();
    for path in paths {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        lines.extend(content.lines().map(str::to_string));
    }
    Ok(lines)
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn cmd_normalize(inputs: &[String], output: Option<&str>, verbose: bool) -> Result<(), String> {
    let start = Instant::now();
    let mut merged = Vec::new();

    for path in inputs {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        let parsed = parse_domain_list(&content);
        if verbose {
            eprintln!(
                "  {} - {} lines, {} domains, {} rejected, {} duplicates",
                path,
                parsed.stats.lines,
                parsed.stats.accepted,
                parsed.stats.rejected,
                parsed.stats.duplicates
            );
        }
        merged.extend(parsed.domains.into_iter().map(|d| d.into_string()));
    }

    // Re-parse the union to drop cross-file duplicates, keeping first-seen order.
    let all = sieve_lists::parse_domain_lines(&merged);
    let mut text = all
        .domains
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    text.push('\n');

    match output {
        Some(path) => {
            fs::write(path, &text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            eprintln!(
                "Wrote {} domains to '{}' in {:.1}ms",
                all.domains.len(),
                path,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn load_lists(block: &[String], allow: &[String], remote: Option<&str>) -> Result<EffectiveLists, String> {
    let mut sources = ListSources::with_default_fallback();
    sources.local = read_lines(block)?;
    sources.allow = read_lines(allow)?;
    if let Some(path) = remote {
        sources.remote = read_lines(&[path.to_string()])?;
    }
    let toggles = ListToggles {
        filtering_enabled: true,
        use_remote_list: remote.is_some(),
    };

    let (lists, stats) = build_effective_lists(&sources, toggles);
    eprintln!(
        "Lists: {} blocked, {} allowed, {} removed by allowlist{}",
        stats.blocked,
        stats.allowed,
        stats.allowlisted,
        if stats.used_fallback { " (built-in defaults)" } else { "" }
    );
    Ok(lists)
}

fn cmd_check(
    config: &RuntimeConfig,
    block: &[String],
    allow: &[String],
    remote: Option<&str>,
    page: &str,
    links: &[String],
) -> Result<(), String> {
    let lists = load_lists(block, allow, remote)?;
    let page = PageContext::new(page);
    for href in links {
        let verdict = match resolve_href(href, &page, &config.filter.links) {
            None => "unresolved".to_string(),
            Some(link) if page.is_exempt(&link.host) => format!("exempt    {}", link.host),
            Some(link) => match lists.decide(&link.host) {
                MatchDecision::Block => format!("block     {}", link.host),
                MatchDecision::Allow => format!("allow     {}", link.host),
                MatchDecision::NotListed => format!("pass      {}", link.host),
            },
        };
        println!("{verdict:<40} {href}");
    }
    Ok(())
}

fn cmd_scan(
    config: &RuntimeConfig,
    html_path: &str,
    block: &[String],
    allow: &[String],
    remote: Option<&str>,
    page: &str,
    output: Option<&str>,
) -> Result<(), String> {
    let html = fs::read_to_string(html_path).map_err(|e| format!("Failed to read '{}': {}", html_path, e))?;
    let lists = load_lists(block, allow, remote)?;

    let mut doc = MemoryDocument::parse(&html);
    let engine = FilterEngine::new(config.filter.clone());
    let root = engine.find_root(&doc).ok_or_else(|| {
        format!(
            "No results root '{}' in '{}'",
            config.filter.results_root, html_path
        )
    })?;

    let start = Instant::now();
    let report = engine.scan(&mut doc, &root, &lists, &PageContext::new(page));

    let filtered = format!("[{}]", config.filter.markers.filtered);
    for container in doc.query_all(&filtered) {
        let href = doc
            .query_within(&container, &config.filter.anchor_selector)
            .first()
            .and_then(|anchor| doc.attribute(anchor, "href"))
            .unwrap_or_default();
        println!("hidden    {href}");
    }
    eprintln!(
        "Scanned {} links in {:.1}ms: {} hidden, {} blocked, {} allowed, {} exempt, {} unresolved",
        report.evaluated,
        start.elapsed().as_secs_f64() * 1000.0,
        report.hidden,
        report.matched,
        report.allowed,
        report.exempt,
        report.unresolved
    );

    if let Some(path) = output {
        fs::write(path, doc.html()).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
        eprintln!("Wrote filtered page to '{}'", path);
    }
    Ok(())
}

fn cmd_fetch(
    config: &RuntimeConfig,
    store_path: &str,
    url: Option<&str>,
    force: bool,
    clear: bool,
) -> Result<(), String> {
    let store = FileStore::new(store_path);
    let rt = runtime()?;

    if clear {
        rt.block_on(clear_remote_cache(&store, &config.keys))
            .map_err(|e| format!("Failed to clear cache: {}", e))?;
        println!("Cleared remote list cache in '{}'", store.path().display());
        return Ok(());
    }

    let fetcher = HttpFetcher::new()?;
    let url = url.unwrap_or(&config.remote_list_url);
    let policy = RefreshPolicy {
        ttl_ms: config.cache_ttl_ms,
        force,
    };
    let refreshed = rt
        .block_on(refresh_remote_list(&store, &fetcher, &config.keys, url, now_ms(), policy))
        .map_err(|e| format!("Failed to refresh remote list: {}", e))?;

    match refreshed.origin {
        RefreshOrigin::FreshCache => println!("Cache is fresh: {} domains", refreshed.domains.len()),
        RefreshOrigin::Fetched(stats) => println!(
            "Imported {} domains ({} lines, {} rejected, {} duplicates)",
            refreshed.domains.len(),
            stats.lines,
            stats.rejected,
            stats.duplicates
        ),
        RefreshOrigin::StaleCache => {
            return Err(format!(
                "Fetch failed; kept {} cached domains",
                refreshed.domains.len()
            ))
        }
        RefreshOrigin::Empty => return Err("Fetch failed and nothing is cached".to_string()),
    }
    Ok(())
}

fn cmd_status(config: &RuntimeConfig, store_path: &str) -> Result<(), String> {
    let store = FileStore::new(store_path);
    let snapshot = runtime()?
        .block_on(load_snapshot(&store, &config.keys))
        .map_err(|e| format!("Failed to read '{}': {}", store_path, e))?;

    let toggles = snapshot.toggles();
    let (_, stats) = build_effective_lists(&snapshot.sources(), toggles);

    println!("Storage:       {}", store.path().display());
    println!("Filtering:     {}", if toggles.filtering_enabled { "on" } else { "off" });
    println!("Remote list:   {}", if toggles.use_remote_list { "on" } else { "off" });
    println!("User blocks:   {}", snapshot.blocklist.len());
    println!("User allows:   {}", snapshot.allowlist.len());
    println!("Remote cache:  {} (fetched at {})", snapshot.remote_list.len(), snapshot.remote_fetched_at);
    println!(
        "Effective:     {} blocked, {} allowlisted{}",
        stats.blocked,
        stats.allowlisted,
        if stats.used_fallback { ", built-in defaults" } else { "" }
    );
    Ok(())
}
