mod echo;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use feedharvest_core::{
    AnalyticsOptions, Controller, EntityKind, FetchConfig, HarvestEvent, HarvestSettings, Harvester, JsonFileBackend,
    LocatorLoader, MergeOutcome, PageInput, SearchQuery, SnapshotSource, Store, TextConfig, Timing, control_channel,
    export_json, load_page, search, summarize, to_csv,
};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

/// Harvest posts, comments and replies from saved feed pages
#[derive(Parser, Debug)]
#[command(name = "feedharvest")]
#[command(author = "feedharvest contributors")]
#[command(version)]
#[command(about = "Harvest posts, comments and replies from saved feed pages", long_about = None)]
struct Cli {
    /// Directory holding the dataset (default: platform data directory)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest saved feed pages into the dataset
    Harvest(HarvestArgs),
    /// Show storage statistics and analytics
    Stats(StatsArgs),
    /// Export the dataset as JSON or CSV
    Export(ExportArgs),
    /// Search the dataset
    Search(SearchArgs),
    /// Remove every stored record and the stored analytics
    Clear,
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Feed pages in scroll order: URLs, local HTML files, or "-" for stdin
    #[arg(value_name = "PAGE", required = true)]
    pages: Vec<String>,

    /// Detail page opened by links to KEY (repeatable)
    #[arg(long = "detail", value_name = "KEY=PAGE", value_parser = parse_detail)]
    details: Vec<(String, String)>,

    /// Selector of the elements that close a detail page
    #[arg(long, value_name = "SELECTOR")]
    dismiss: Option<String>,

    /// Named locator set to overlay on the built-in locators
    #[arg(long, value_name = "NAME")]
    locators: Option<String>,

    /// Locator file to overlay on the built-in locators
    #[arg(long, value_name = "FILE", conflicts_with = "locators")]
    locator_file: Option<PathBuf>,

    /// Stop after this many posts
    #[arg(long, value_name = "N")]
    max_posts: Option<usize>,

    /// Delay after each scroll in milliseconds
    #[arg(long, value_name = "MS")]
    scroll_delay: Option<u64>,

    /// Skip the settle delays after clicks
    #[arg(long)]
    no_settle: bool,

    /// Do not store posts
    #[arg(long)]
    no_posts: bool,

    /// Do not expand or store comments
    #[arg(long)]
    no_comments: bool,

    /// Do not store author profiles
    #[arg(long)]
    no_profiles: bool,

    /// Save the resulting settings as the new defaults
    #[arg(long)]
    save_settings: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Print the analytics snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Include the per-day table
    #[arg(long)]
    daily: bool,

    /// Days in the daily activity window
    #[arg(long, default_value = "30", value_name = "DAYS")]
    window: u32,

    /// Length of the top author and commentator lists
    #[arg(long, default_value = "10", value_name = "N")]
    top: usize,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "json", value_name = "FORMAT")]
    format: ExportFormat,

    /// Collection to export as CSV (posts, comments, profiles)
    #[arg(long, default_value = "posts", value_name = "KIND")]
    kind: EntityKind,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Text to look for, case-insensitive
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Only search one collection (posts, comments, profiles)
    #[arg(long, value_name = "KIND")]
    kind: Option<EntityKind>,

    /// Author name substring
    #[arg(long, value_name = "NAME")]
    author: Option<String>,

    /// Earliest date, in any format the timestamp normalizer accepts
    #[arg(long, value_name = "DATE")]
    from: Option<String>,

    /// Latest date
    #[arg(long, value_name = "DATE")]
    to: Option<String>,

    /// Minimum reactions (posts only)
    #[arg(long, value_name = "N")]
    min_reactions: Option<u64>,

    /// Print matches as JSON
    #[arg(long)]
    json: bool,
}

fn parse_detail(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .filter(|(key, page)| !key.is_empty() && !page.is_empty())
        .map(|(key, page)| (key.to_string(), page.to_string()))
        .ok_or_else(|| format!("Invalid detail page '{}': expected KEY=PAGE", value))
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose { "feedharvest_core=debug" } else { "feedharvest_core=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn data_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => JsonFileBackend::default_dir().context("Could not determine a data directory; pass --data-dir"),
    }
}

fn write_output(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => println!("{}", content),
    }
    Ok(())
}

async fn harvest(args: HarvestArgs, backend: JsonFileBackend, verbose: bool) -> anyhow::Result<()> {
    let fetch = FetchConfig {
        timeout: args.timeout,
        user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
    };

    if verbose {
        echo::print_step(1, 3, &format!("Loading {} feed pages", args.pages.len()));
    }

    let mut pages = Vec::with_capacity(args.pages.len());
    for page in &args.pages {
        let html = load_page(&PageInput::parse(page), &fetch)
            .await
            .with_context(|| format!("Failed to load page: {}", page))?;
        if verbose {
            eprintln!("  {} {} ({})", "Page:".dimmed(), page.bright_white(), echo::format_size(html.len()));
        }
        pages.push(html);
    }

    tracing::debug!(pages = pages.len(), details = args.details.len(), "Loaded snapshot pages");
    let mut source = SnapshotSource::new(pages).context("Failed to build feed snapshot")?;
    for (key, page) in &args.details {
        let html = load_page(&PageInput::parse(page), &fetch)
            .await
            .with_context(|| format!("Failed to load detail page: {}", page))?;
        source.add_detail(key.clone(), &html);
    }
    if let Some(selector) = &args.dismiss {
        source = source.with_dismiss_selector(selector).context("Invalid dismiss selector")?;
    }

    let mut loader = LocatorLoader::default();
    let locators = match (&args.locator_file, &args.locators) {
        (Some(path), _) => loader
            .load_file(path)
            .with_context(|| format!("Failed to load locator file: {}", path.display()))?,
        (None, Some(name)) => loader.load(name).with_context(|| format!("Failed to load locators: {}", name))?,
        (None, None) => loader.load("default").context("Failed to load locators")?,
    };
    locators.validate().context("Invalid locator set")?;

    let settings_path = backend.settings_path();
    let mut settings = HarvestSettings::load(&settings_path).context("Failed to read saved settings")?;
    if let Some(max_posts) = args.max_posts {
        settings.max_posts = Some(max_posts);
    }
    if let Some(delay) = args.scroll_delay {
        settings.scroll_delay_ms = delay;
    }
    settings.collect.posts &= !args.no_posts;
    settings.collect.comments &= !args.no_comments;
    settings.collect.profiles &= !args.no_profiles;
    settings.validate().context("Invalid settings")?;
    if args.save_settings {
        settings.save(&settings_path).context("Failed to save settings")?;
        echo::print_info(&format!("Settings saved to {}", settings_path.display()));
    }

    let timing = if args.no_settle { Timing::immediate() } else { Timing::default() };
    let store = Store::open(backend).context("Failed to open dataset")?;
    let before = store.stats().context("Failed to read dataset")?;
    let harvester = Harvester::new(source, locators, store).with_timing(timing);

    if verbose {
        echo::print_step(2, 3, "Harvesting");
    }

    let (client, commands) = control_channel(8);
    let (events, mut events_rx) = mpsc::unbounded_channel();

    let session = async move {
        client.start(settings).await?;

        let mut finished = None;
        let mut saved = true;
        while let Some(event) = events_rx.recv().await {
            match event {
                HarvestEvent::Progress(progress) => {
                    if verbose {
                        echo::print_progress(&progress);
                    }
                }
                HarvestEvent::Error { context, message } => {
                    saved &= context != "flush";
                    echo::print_warning(&format!("{}: {}", context, message));
                }
                HarvestEvent::Completed { reason, .. } => {
                    finished = Some(reason);
                    break;
                }
            }
        }

        client.shutdown().await?;
        Ok::<_, feedharvest_core::HarvestError>((finished, saved))
    };

    let (harvester, session) = tokio::join!(Controller::new(harvester).serve(commands, events), session);
    let (finished, saved) = session.context("Harvest session failed")?;
    let reason = finished.context("Harvest ended without completing")?;

    if verbose {
        echo::print_step(3, 3, "Saving");
    }

    let after = harvester.store().stats().context("Failed to read dataset")?;
    let merged = saved.then(|| MergeOutcome {
        added_posts: after.posts - before.posts,
        added_comments: after.comments - before.comments,
        added_profiles: after.profiles - before.profiles,
    });
    echo::print_outcome(reason, merged.as_ref());

    if verbose {
        echo::print_storage(&after);
    }

    Ok(())
}

fn stats(args: StatsArgs, backend: JsonFileBackend) -> anyhow::Result<()> {
    let mut store = Store::open(backend).context("Failed to open dataset")?;
    let options = AnalyticsOptions { window_days: args.window, top_k: args.top };
    let snapshot = store.analytics(&options).context("Failed to compute analytics")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        echo::print_storage(&store.stats()?);
        let config = TextConfig { include_daily: args.daily, ..Default::default() };
        println!("{}", summarize(&snapshot, &config));
    }

    Ok(())
}

fn export(args: ExportArgs, backend: JsonFileBackend) -> anyhow::Result<()> {
    let mut store = Store::open(backend).context("Failed to open dataset")?;

    let output = match args.format {
        ExportFormat::Json => {
            let snapshot = store.analytics(&AnalyticsOptions::default()).context("Failed to compute analytics")?;
            export_json(store.dataset(), &snapshot).context("Failed to export JSON")?
        }
        ExportFormat::Csv => to_csv(store.dataset(), args.kind),
    };

    write_output(args.output.as_deref(), &output)
}

fn search_dataset(args: SearchArgs, backend: JsonFileBackend) -> anyhow::Result<()> {
    let store = Store::open(backend).context("Failed to open dataset")?;

    let mut query = SearchQuery::new();
    query.text = args.query;
    query.kind = args.kind;
    query.author = args.author;
    query.min_reactions = args.min_reactions;
    if let Some(from) = &args.from {
        query.date_from = Some(SearchQuery::parse_date(from).context("Invalid --from date")?);
    }
    if let Some(to) = &args.to {
        query.date_to = Some(SearchQuery::parse_date(to).context("Invalid --to date")?);
    }

    let results = search(store.dataset(), &query);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for post in &results.posts {
        println!("{} {} {}: {}", "post".dimmed(), post.id, post.author.display_name.bold(), preview(&post.text));
    }
    for comment in &results.comments {
        println!(
            "{} {} {}: {}",
            "comment".dimmed(),
            comment.id,
            comment.author.display_name.bold(),
            preview(&comment.text)
        );
    }
    for profile in &results.profiles {
        println!("{} {} {}", "profile".dimmed(), profile.name.bold(), profile.profile_url);
    }
    echo::print_info(&format!("{} matches", results.len()));

    Ok(())
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        format!("{}…", text.chars().take(LIMIT).collect::<String>())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    if cli.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let backend = JsonFileBackend::new(data_dir(cli.data_dir.as_deref())?);

    match cli.command {
        Command::Harvest(args) => harvest(args, backend, cli.verbose).await,
        Command::Stats(args) => stats(args, backend),
        Command::Export(args) => export(args, backend),
        Command::Search(args) => search_dataset(args, backend),
        Command::Clear => {
            let mut store = Store::open(backend).context("Failed to open dataset")?;
            store.clear().context("Failed to clear dataset")?;
            echo::print_success("Dataset cleared");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detail() {
        assert_eq!(parse_detail("/posts/1=detail.html"), Ok(("/posts/1".to_string(), "detail.html".to_string())));
        assert!(parse_detail("detail.html").is_err());
        assert!(parse_detail("=detail.html").is_err());
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(100)).chars().count(), 81);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
