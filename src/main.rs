use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ultra_core::{OutputFormat, SearchMatch, UltraConfig};
use ultra_vector::{
    provider_from_config, IndexEvent, IndexStats, Indexer, SearchEngine, StoreOptions, VectorStore,
};

#[derive(Parser)]
#[command(
    name = "ultra-index",
    version,
    about = "Local semantic search over your project files",
    long_about = "ultra-index splits project files into chunks, embeds them with your\n\
                   configured provider, and stores the vectors in .ultra-mcp/ so you can\n\
                   search the codebase in natural language.\n\n\
                   Examples:\n  \
                     ultra-index init                          Create a .ultra-mcp.toml config file\n  \
                     ultra-index index --path .                Index (or re-index) the project\n  \
                     ultra-index search 'token validation'     Semantic search\n  \
                     ultra-index related 'database migrations' Files related to a topic\n  \
                     ultra-index stats                         Show index statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .ultra-mcp.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default .ultra-mcp.toml in the current directory
    #[command(long_about = "Create a default .ultra-mcp.toml in the current directory.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .ultra-mcp.toml already exists.")]
    Init,
    /// Index the project's files
    #[command(long_about = "Index the project's files.\n\n\
        Scans the project (honoring .gitignore), chunks each file, and embeds only\n\
        chunks whose content or modification time changed since the last run.\n\
        Requires an embedding provider API key.\n\n\
        Examples:\n  ultra-index index\n  ultra-index index --path ../other-repo --force")]
    Index {
        /// Project path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Re-embed every chunk, even unchanged ones
        #[arg(long)]
        force: bool,
    },
    /// Search the index in natural language
    #[command(long_about = "Search the index in natural language.\n\n\
        Embeds the query and returns the most similar chunks. Run `ultra-index index`\n\
        first.\n\n\
        Examples:\n  ultra-index search 'error handling'\n  ultra-index search 'auth middleware' --limit 5 --threshold 0.3")]
    Search {
        /// Search query
        query: String,

        /// Project path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum results to return (default: search.limit from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum similarity, -1.0 to 1.0 (default: search.similarity_threshold)
        #[arg(long)]
        threshold: Option<f64>,

        /// Print only the distinct matching files
        #[arg(long)]
        files_only: bool,
    },
    /// List files related to a topic
    Related {
        /// Topic or question
        query: String,

        /// Project path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum chunks to consider (default: search.limit from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum similarity (default: search.similarity_threshold)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Show index statistics
    Stats {
        /// Project path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Delete every indexed chunk
    Clear {
        /// Project path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# ultra-index configuration

[embedding]
# provider = "openai"        # openai | azure | gemini | voyage
# model = "text-embedding-3-small"
# api_key = "..."            # or OPENAI_API_KEY / AZURE_OPENAI_API_KEY / GEMINI_API_KEY / VOYAGE_API_KEY
# base_url = "https://api.openai.com/v1"
# api_version = "2024-02-01" # Azure only
# dimensions = 1536

[index]
# chunk_size = 1500
# chunk_overlap = 200
# batch_size = 10
# include = ["**/*.rs", "**/*.ts", "**/*.py", "**/*.md"]
# exclude = ["fixtures/", "*.generated.ts"]
# max_file_bytes = 1048576

[search]
# limit = 10
# similarity_threshold = 0.5

[store]
# accelerated = true
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => UltraConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".ultra-mcp.toml");
            if default_path.exists() {
                UltraConfig::from_file(default_path)?
            } else {
                UltraConfig::default()
            }
        }
    };

    tracing::debug!(config = ?cli.config, provider = %config.embedding.provider, "configuration loaded");

    match cli.command {
        Command::Init => {
            let path = Path::new(".ultra-mcp.toml");
            if path.exists() {
                miette::bail!(".ultra-mcp.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .ultra-mcp.toml with default configuration");
        }
        Command::Index { ref path, force } => {
            let provider = provider_from_config(&config.embedding)?;
            let store = VectorStore::open_project(path, StoreOptions::from(&config.store))?;
            let indexer = Indexer::new(&store, provider.as_ref(), config.index.clone())?;

            let (tx, rx) = mpsc::unbounded_channel();
            let reporter = tokio::spawn(report_progress(rx, std::io::stderr().is_terminal()));
            let result = indexer.run(path, force, Some(tx)).await;
            let _ = reporter.await;
            let summary = result?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Index Summary\n");
                    println!("| Files indexed | Chunks created | Elapsed |");
                    println!("|---|---|---|");
                    println!(
                        "| {} | {} | {} ms |",
                        summary.files_indexed, summary.chunks_created, summary.elapsed_ms
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "Indexed {} chunks from {} files in {} ms",
                        summary.chunks_created, summary.files_indexed, summary.elapsed_ms
                    );
                }
            }
        }
        Command::Search {
            ref query,
            ref path,
            limit,
            threshold,
            files_only,
        } => {
            let provider = provider_from_config(&config.embedding)?;
            let store = open_existing(path, &config)?;
            let engine = SearchEngine::new(&store, provider.as_ref());
            let limit = limit.unwrap_or(config.search.limit);
            let threshold = threshold.unwrap_or(config.search.similarity_threshold);

            if files_only {
                let files = engine.related_files(query, limit, threshold).await?;
                print_files(&files, cli.format)?;
            } else {
                let matches = engine.search(query, limit, threshold).await?;
                print_matches(&matches, cli.format)?;
            }
        }
        Command::Related {
            ref query,
            ref path,
            limit,
            threshold,
        } => {
            let provider = provider_from_config(&config.embedding)?;
            let store = open_existing(path, &config)?;
            let engine = SearchEngine::new(&store, provider.as_ref());
            let files = engine
                .related_files(
                    query,
                    limit.unwrap_or(config.search.limit),
                    threshold.unwrap_or(config.search.similarity_threshold),
                )
                .await?;
            print_files(&files, cli.format)?;
        }
        Command::Stats { ref path } => {
            let store = open_existing(path, &config)?;
            print_stats(&store.stats()?, cli.format)?;
        }
        Command::Clear { ref path } => {
            let store = open_existing(path, &config)?;
            let removed = store.count();
            store.clear()?;
            println!("Removed {removed} chunks from {}", VectorStore::project_path(path).display());
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ultra-index", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "ultra_vector=debug,ultra_index=debug"
    } else {
        "ultra_vector=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Open the project's store, refusing to create one as a side effect.
fn open_existing(path: &Path, config: &UltraConfig) -> Result<VectorStore> {
    let db = VectorStore::project_path(path);
    if !db.exists() {
        miette::bail!(miette::miette!(
            help = format!("Run `ultra-index index --path {}` first", path.display()),
            "No index found at {}",
            db.display()
        ));
    }
    Ok(VectorStore::open(&db, StoreOptions::from(&config.store))?)
}

async fn report_progress(mut rx: mpsc::UnboundedReceiver<IndexEvent>, is_tty: bool) {
    let mut bar: Option<indicatif::ProgressBar> = None;

    while let Some(event) = rx.recv().await {
        match event {
            IndexEvent::Started { total_files } => {
                if is_tty && total_files > 0 {
                    let pb = indicatif::ProgressBar::new(total_files as u64);
                    pb.set_style(
                        indicatif::ProgressStyle::with_template(
                            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} files ({elapsed}) {msg}",
                        )
                        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                        .progress_chars("=> "),
                    );
                    bar = Some(pb);
                } else if !is_tty {
                    eprintln!("Indexing {total_files} files ...");
                }
            }
            IndexEvent::BatchCompleted {
                files_processed,
                chunks_written,
                ..
            } => {
                if let Some(pb) = &bar {
                    pb.set_position(files_processed as u64);
                    pb.set_message(format!("+{chunks_written} chunks"));
                }
            }
            IndexEvent::Finished(_) => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }

    if let Some(pb) = bar {
        pb.abandon_with_message("failed");
    }
}

fn print_matches(matches: &[SearchMatch], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(matches).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if matches.is_empty() {
                println!("No results found.");
            } else {
                println!("# Search Results\n");
                for (i, m) in matches.iter().enumerate() {
                    println!(
                        "## {}. `{}` (similarity: {:.4})\n\n```\n{}\n```\n",
                        i + 1,
                        m.chunk_id,
                        m.similarity,
                        m.chunk_text.trim_end(),
                    );
                }
            }
        }
        OutputFormat::Text => {
            if matches.is_empty() {
                println!("No results found.");
            } else {
                for (i, m) in matches.iter().enumerate() {
                    println!("{}. {} (similarity: {:.4})", i + 1, m.chunk_id, m.similarity);
                    let preview: String = m
                        .chunk_text
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .take(3)
                        .map(|l| format!("   {l}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{preview}\n");
                }
            }
        }
    }
    Ok(())
}

fn print_files(files: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(files).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if files.is_empty() {
                println!("No related files found.");
            } else {
                println!("# Related Files\n");
                for file in files {
                    println!("- `{file}`");
                }
            }
        }
        OutputFormat::Text => {
            if files.is_empty() {
                println!("No related files found.");
            }
            for file in files {
                println!("{file}");
            }
        }
    }
    Ok(())
}

fn print_stats(stats: &IndexStats, format: OutputFormat) -> Result<()> {
    let dimensions = stats
        .dimensions
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Index Statistics\n");
            println!("| Chunks | Files | Dimensions | Size | Backend |");
            println!("|---|---|---|---|---|");
            println!(
                "| {} | {} | {dimensions} | {} bytes | {} |",
                stats.total_chunks, stats.total_files, stats.index_size_bytes, stats.backend
            );
        }
        OutputFormat::Text => {
            println!("Chunks:     {}", stats.total_chunks);
            println!("Files:      {}", stats.total_files);
            println!("Dimensions: {dimensions}");
            println!("Size:       {} bytes", stats.index_size_bytes);
            println!("Backend:    {}", stats.backend);
        }
    }
    Ok(())
}
