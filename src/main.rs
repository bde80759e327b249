use clap::{CommandFactory, Parser};
use colored::Colorize;
use scopusid::cache::ResultCache;
use scopusid::config::{self, ExtractorConfig, Paths};
use scopusid::credential::{self, KeyStore};
use scopusid::entry::SearchMode;
use scopusid::interrupt::Interrupt;
use scopusid::lookup::openalex::OpenAlexClient;
use scopusid::lookup::scopus::{ScopusClient, TEST_DOI};
use scopusid::lookup::LookupClient;
use scopusid::stats::RunStats;
use scopusid::BatchRunner;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scopusid")]
#[command(version)]
#[command(about = "Resolve DOIs or titles to Scopus IDs", long_about = None)]
#[command(after_help = "Input files: dois.txt or titles.txt (one per line)\nOutput: scopus_results.csv")]
struct Args {
    /// Search by DOI (reads dois.txt)
    #[arg(long, conflicts_with = "title")]
    doi: bool,

    /// Search by title (reads titles.txt)
    #[arg(long)]
    title: bool,

    /// Limit number of items to process
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    limit: Option<usize>,

    /// Number of concurrent lookups
    #[arg(long, default_value_t = config::DEFAULT_WORKERS)]
    workers: usize,

    /// Resume from last checkpoint
    #[arg(long)]
    resume: bool,

    /// Skip duplicate entries
    #[arg(long)]
    skip_duplicates: bool,

    /// Bypass response cache
    #[arg(long)]
    no_cache: bool,

    /// Validate only, do not process
    #[arg(long)]
    dry_run: bool,

    /// Test Scopus API key
    #[arg(long)]
    test_key: bool,

    /// Delete saved Scopus API key
    #[arg(long)]
    reset_key: bool,

    /// Show cache statistics
    #[arg(long)]
    cache_stats: bool,

    /// Clear response cache
    #[arg(long)]
    clear_cache: bool,

    /// Directory holding input, output, cache and key files
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Input file (overrides dois.txt / titles.txt)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "scopusid=debug" } else { "scopusid=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("{} {}", "Error:".red().bold(), message);
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let interrupt = Interrupt::new();

    let mut paths = Paths::in_dir(&args.dir);
    if let Some(input) = &args.input {
        paths.doi_input = input.clone();
        paths.title_input = input.clone();
    }
    if let Some(output) = &args.output {
        paths.output = output.clone();
    }

    match credential::ensure_gitignored(&args.dir, &[config::API_KEY_FILE, config::CACHE_FILE]) {
        Ok(added) if !added.is_empty() => println!("Updated .gitignore with: {}", added.join(", ")),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Could not update .gitignore"),
    }

    let cache = Arc::new(ResultCache::open(paths.cache.clone()));
    let keys = KeyStore::new(paths.api_key.clone());

    if args.cache_stats {
        let stats = cache.stats();
        println!("{}", "CACHE STATISTICS".bold());
        println!("Total entries: {}", stats.total_entries);
        println!("Cache file: {}", stats.path.display());
        println!("File exists: {}", stats.file_exists);
        return ExitCode::SUCCESS;
    }

    if args.clear_cache {
        cache.clear();
        println!("{}", "Cache cleared".green());
        return ExitCode::SUCCESS;
    }

    if args.reset_key {
        return match keys.reset() {
            Ok(true) => {
                println!("{}", "Scopus API key deleted".green());
                ExitCode::SUCCESS
            }
            Ok(false) => {
                println!("No API key file found");
                ExitCode::SUCCESS
            }
            Err(e) => fail(format!("Could not delete API key: {}", e)),
        };
    }

    if args.test_key {
        let scopus = match load_key(&keys).map(ScopusClient::new) {
            Some(Ok(client)) => client,
            Some(Err(e)) => return fail(format!("Failed to initialize HTTP client: {}", e)),
            None => return fail("Scopus API key is required (get one at https://dev.elsevier.com)"),
        };
        println!("Testing API key with DOI {}...", TEST_DOI.cyan());
        let status = scopus.verify_key().await;
        if let scopusid::lookup::scopus::KeyStatus::Valid(hit) = &status {
            println!("  Found: {}", hit.title.as_deref().unwrap_or("N/A"));
            println!("  Scopus ID: {}", hit.scopus_id.as_deref().unwrap_or("N/A"));
        }
        return if status.is_valid() {
            println!("{}", status.message().green());
            ExitCode::SUCCESS
        } else {
            fail(status.message())
        };
    }

    let mode = match (args.doi, args.title) {
        (true, _) => SearchMode::Doi,
        (_, true) => SearchMode::Title,
        _ => {
            let _ = Args::command().print_help();
            return ExitCode::SUCCESS;
        }
    };

    let mut config = ExtractorConfig::new(mode, paths);
    config.limit = args.limit;
    config.workers = args.workers;
    config.resume = args.resume;
    config.skip_duplicates = args.skip_duplicates;
    config.use_cache = !args.no_cache;
    config.dry_run = args.dry_run;

    println!("{}", "DOI/Title to Scopus ID Extractor".bold());
    println!("Mode: {}", mode);
    println!("Primary: Scopus Search API");
    println!("Fallback: OpenAlex (title/DOI lookup only)");
    println!("Cache: {}", if config.use_cache { "Enabled" } else { "Disabled" });
    println!("Workers: {}", config.workers);
    if let Some(limit) = config.limit {
        println!("Limit: {} items", limit);
    }
    if config.resume {
        println!("Resume: Enabled");
    }
    println!();

    let stats = Arc::new(RunStats::new());
    let runner = BatchRunner::new(config, Arc::clone(&cache), Arc::clone(&stats), interrupt.clone());

    let batch = match runner.prepare() {
        Ok(batch) => batch,
        Err(e) => return fail(e),
    };

    if runner.config().dry_run {
        println!("{}", "Dry run complete (no API calls made)".green());
        return ExitCode::SUCCESS;
    }

    let Some(api_key) = load_key(&keys) else {
        return fail("Scopus API key is required (get one at https://dev.elsevier.com)");
    };

    let primary = match ScopusClient::new(api_key) {
        Ok(client) => client,
        Err(e) => return fail(format!("Failed to initialize HTTP client: {}", e)),
    };
    let fallback = match OpenAlexClient::new() {
        Ok(client) => client,
        Err(e) => return fail(format!("Failed to initialize HTTP client: {}", e)),
    };
    let lookup = LookupClient::new(Box::new(primary), Box::new(fallback), stats, interrupt.clone());

    interrupt.listen_for_ctrl_c();
    let summary = runner.execute(&batch, &lookup).await;
    summary.print();

    ExitCode::SUCCESS
}

fn load_key(keys: &KeyStore) -> Option<String> {
    match keys.load_or_prompt_terminal() {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read API key");
            None
        }
    }
}
