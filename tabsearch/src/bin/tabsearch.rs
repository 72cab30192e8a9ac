//! tabsearch CLI - index files and query them from the terminal
//!
//! Usage:
//!     tabsearch --data-dir ./db add notes/*.txt
//!     tabsearch --data-dir ./db search "ownership rules"
//!     tabsearch --data-dir ./db deep 3 "lifetimes"

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tabsearch::{open_engine, DocumentInput, EngineConfig, SearchEngine, SearchRequest, SourceDocument};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tabsearch", version, about = "Full-text search over indexed pages")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep the store, index and source table under this directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index files, or stdin when no file is given
    Add {
        files: Vec<PathBuf>,
        /// Language tag of the documents
        #[arg(long, default_value = "en")]
        lang: String,
        /// Inputs are JSON arrays of documents instead of plain text
        #[arg(long)]
        json: bool,
        /// Title of a document read from stdin
        #[arg(long)]
        title: Option<String>,
    },
    /// Run a ranked query
    Search {
        query: String,
        #[arg(long, default_value = "")]
        lang: String,
        #[arg(long, default_value_t = 0)]
        start: u32,
        #[arg(long)]
        length: Option<u32>,
        /// Snippet length in characters, 0 to omit snippets
        #[arg(long)]
        snippet: Option<u32>,
        #[arg(long)]
        spell_correction: bool,
        #[arg(long)]
        synonyms: bool,
        /// Weakest matches first
        #[arg(long)]
        ascending: bool,
    },
    /// Remove documents by guid
    Remove { guids: Vec<String> },
    /// Rank the paragraphs of one document
    Deep {
        guid: String,
        query: String,
        #[arg(long, default_value = "")]
        lang: String,
    },
    /// Show partition and store counters
    Stats,
    /// Commit and compact the index
    Compact,
    /// Drop every document
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    let config = load_config(&cli)?;
    let engine = open_engine(config).await.context("failed to open search engine")?;

    match cli.command {
        Commands::Add { files, lang, json, title } => add(&engine, &files, &lang, json, title)?,
        Commands::Search { query, lang, start, length, snippet, spell_correction, synonyms, ascending } => {
            let config = engine.config();
            let request = SearchRequest {
                start,
                length: length.unwrap_or(config.search_size),
                partial: config.partial,
                spell_correction: spell_correction || config.spell_correction,
                synonyms: synonyms || config.synonyms,
                descending: !ascending,
                ..SearchRequest::new(query, lang)
            };
            search(&engine, request, snippet.unwrap_or(config.snippet_size))?;
        }
        Commands::Remove { guids } => {
            let count = guids.len();
            engine.remove_documents(guids)?;
            engine.commit()?;
            println!("removed {count} document(s)");
        }
        Commands::Deep { guid, query, lang } => {
            for hit in engine.deep_search(guid, query, lang)? {
                println!("{:>3} {:>3}%  {}", hit.rank, hit.percent, hit.snippet);
            }
        }
        Commands::Stats => {
            let stats = engine.stats(0)?;
            println!("stored documents:   {}", engine.count()?);
            println!("indexed documents:  {}", stats.documents);
            println!("terms:              {}", stats.terms);
            println!("pending operations: {}", stats.pending);
        }
        Commands::Compact => {
            engine.sync()?;
            println!("index compacted");
        }
        Commands::Reset => {
            engine.reset_partition()?;
            println!("index reset");
        }
    }
    Ok(())
}

fn initialize_logging(verbose: bool) {
    let default = if verbose { "tabsearch=debug" } else { "tabsearch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        let defaults = EngineConfig::in_dir(dir);
        config.database_path = defaults.database_path;
        config.index_dir = defaults.index_dir;
        config.sources_path = defaults.sources_path;
    }
    config.apply_env()?;
    Ok(config)
}

fn add(engine: &SearchEngine, files: &[PathBuf], lang: &str, json: bool, title: Option<String>) -> Result<()> {
    let mut batch = Vec::new();
    if files.is_empty() {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        batch.extend(documents_from(&text, None, lang, json, title)?);
    } else {
        for file in files {
            let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            batch.extend(documents_from(&text, Some(file), lang, json, None)?);
        }
    }

    let outcome = engine.add_documents(batch)?;
    engine.commit()?;
    for guid in &outcome.guids {
        println!("{guid}");
    }
    if outcome.ignored > 0 {
        eprintln!("{} document(s) ignored", outcome.ignored);
    }
    Ok(())
}

fn documents_from(
    text: &str,
    file: Option<&Path>,
    lang: &str,
    json: bool,
    title: Option<String>,
) -> Result<Vec<SourceDocument>> {
    if json {
        let inputs: Vec<DocumentInput> = serde_json::from_str(text).context("expected a JSON array of documents")?;
        return Ok(inputs
            .into_iter()
            .map(|record| SourceDocument { record, hidden: Default::default() })
            .collect());
    }

    let (url, file_title) = match file {
        Some(path) => {
            let absolute = std::fs::canonicalize(path)?;
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            (format!("file://{}", absolute.display()), name)
        }
        None => (String::new(), String::new()),
    };
    let record = DocumentInput {
        lang: lang.to_string(),
        url,
        title: title.unwrap_or(file_title),
        body: text.to_string(),
        ..Default::default()
    };
    Ok(vec![SourceDocument { record, hidden: Default::default() }])
}

fn search(engine: &SearchEngine, request: SearchRequest, snippet_size: u32) -> Result<()> {
    let summary = engine.search(request)?;
    if summary.widened {
        println!("(no exact matches; showing close matches)");
    }
    println!("{} of about {} match(es)", summary.size, summary.estimated_total);

    for hit in engine.hits()? {
        let doc = engine.document(hit.guid.clone())?;
        let title = if doc.title.is_empty() { &doc.url } else { &doc.title };
        println!("{:>3} {:>3}%  [{}] {}", hit.rank, hit.percent, hit.guid, title);
        if snippet_size > 0 {
            let snippet = engine.snippet_at(hit.rank, snippet_size)?;
            if !snippet.is_empty() {
                println!("          {snippet}");
            }
        }
    }
    Ok(())
}
