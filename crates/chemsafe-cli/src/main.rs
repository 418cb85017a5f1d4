//! ChemSafe CLI
//!
//! Thin presentation layer over the library crates:
//! - `import` — extract rule records from a free-form source file into JSONL
//! - `rebuild` — embed the corpus and rebuild the retrieval index
//! - `status` — report the persisted rule count (gates `review`)
//! - `lookup` — query the knowledge base directly, no reasoning backend
//! - `scan` — structural hazard scan of a single molecule
//! - `review` — retrieval-grounded safety review of a synthesis plan

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use chemsafe_agent::{Config, OpenAiChatClient, ReviewAgent};
use chemsafe_index::{RuleIndex, TokenHashEmbedder};

const DEFAULT_COLLECTION: &str = "safety_rules";
const LOOKUP_TOP_K: usize = 3;

#[derive(Parser)]
#[command(name = "chemsafe")]
#[command(author, version, about = "Retrieval-grounded chemical synthesis safety review")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract rule records from a free-form source file into normalized JSONL.
    Import {
        /// Source file containing embedded JSON rule arrays
        input: PathBuf,
        /// Output JSONL corpus path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Embed the corpus and rebuild the persisted retrieval index.
    Rebuild {
        /// JSONL rule corpus
        #[arg(long)]
        corpus: PathBuf,
        /// Index directory
        #[arg(long)]
        dir: PathBuf,
    },

    /// Report the persisted rule count and collection metadata.
    Status {
        /// Index directory
        #[arg(long)]
        dir: PathBuf,
    },

    /// Query the knowledge base directly (no reasoning backend).
    Lookup {
        /// Query text
        query: String,
        /// Index directory
        #[arg(long)]
        dir: PathBuf,
        /// Number of rules to return
        #[arg(short, long, default_value_t = LOOKUP_TOP_K)]
        k: usize,
    },

    /// Structural hazard scan of a single molecule.
    Scan {
        /// Molecule in SMILES notation
        smiles: String,
        /// Also render a depiction PNG to this path
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Retrieval-grounded safety review of a synthesis plan.
    Review {
        /// Synthesis plan text, or a path prefixed with `@` to read from file
        plan: String,
        /// Target molecule in SMILES notation
        #[arg(long)]
        smiles: Option<String>,
        /// Index directory
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import { input, out } => cmd_import(&input, &out),
        Commands::Rebuild { corpus, dir } => cmd_rebuild(&corpus, &dir),
        Commands::Status { dir } => cmd_status(&dir),
        Commands::Lookup { query, dir, k } => cmd_lookup(&query, &dir, k),
        Commands::Scan { smiles, png } => cmd_scan(&smiles, png.as_deref()),
        Commands::Review { plan, smiles, dir } => cmd_review(&plan, smiles.as_deref(), &dir),
    }
}

fn open_index(dir: &std::path::Path) -> Result<RuleIndex> {
    RuleIndex::open(dir, DEFAULT_COLLECTION, Arc::new(TokenHashEmbedder))
        .with_context(|| format!("failed to open index at {}", dir.display()))
}

fn cmd_import(input: &std::path::Path, out: &std::path::Path) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let records = chemsafe_index::import_raw(&text);
    if records.is_empty() {
        return Err(anyhow!("no rule records found in {}", input.display()));
    }
    chemsafe_index::write_jsonl(&records, out)?;
    eprintln!(
        "{} {} rules -> {}",
        "imported".green().bold(),
        records.len(),
        out.display().to_string().bold()
    );
    Ok(())
}

fn cmd_rebuild(corpus: &std::path::Path, dir: &std::path::Path) -> Result<()> {
    let units = chemsafe_index::load_jsonl(corpus)?;
    let index = open_index(dir)?;
    let count = index.rebuild(units)?;
    eprintln!(
        "{} {} rules indexed in {}",
        "rebuilt".green().bold(),
        count,
        dir.display().to_string().bold()
    );
    Ok(())
}

fn cmd_status(dir: &std::path::Path) -> Result<()> {
    let index = open_index(dir)?;
    match index.status() {
        Some(status) => {
            println!("collection: {}", index.collection());
            println!("rules:      {}", status.rules);
            println!("embedder:   {} (dim {})", status.embedder, status.dim);
            println!("built_at:   {}", status.built_at_unix_secs);
            println!("digest:     {}", status.corpus_digest);
        }
        None => {
            println!("collection: {}", index.collection());
            println!("rules:      0");
            eprintln!(
                "{} knowledge base not built; run `chemsafe rebuild` first",
                "warning:".yellow().bold()
            );
        }
    }
    Ok(())
}

fn cmd_lookup(query: &str, dir: &std::path::Path, k: usize) -> Result<()> {
    let index = open_index(dir)?;
    let hits = index.search(query, k)?;
    if hits.is_empty() {
        eprintln!("{} no matching rules", "info:".yellow().bold());
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{} (sim {:.3}, {})",
            format!("规则{}: {}", i + 1, hit.rule.text()).bold(),
            hit.similarity,
            hit.rule.source
        );
    }
    Ok(())
}

fn cmd_scan(smiles: &str, png: Option<&std::path::Path>) -> Result<()> {
    let result = chemsafe_mol::analyze(smiles);
    println!("{}", result.summary);
    if !result.valid {
        return Err(anyhow!("invalid SMILES: {smiles}"));
    }
    if let Some(path) = png {
        match chemsafe_mol::depict(smiles, (480, 480)) {
            Some(bytes) => {
                fs::write(path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!(
                    "{} depiction -> {}",
                    "wrote".green().bold(),
                    path.display().to_string().bold()
                );
            }
            None => eprintln!(
                "{} could not render a depiction for this molecule",
                "warning:".yellow().bold()
            ),
        }
    }
    Ok(())
}

fn cmd_review(plan_arg: &str, smiles: Option<&str>, dir: &std::path::Path) -> Result<()> {
    let plan = match plan_arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file {path}"))?,
        None => plan_arg.to_string(),
    };

    let index = Arc::new(open_index(dir)?);
    if index.count() == 0 {
        return Err(anyhow!(
            "knowledge base not built (0 rules at {}); run `chemsafe rebuild` first",
            dir.display()
        ));
    }

    let config = Config::from_env();
    if config.api_key.is_empty() {
        return Err(anyhow!("CHEMSAFE_API_KEY is not set"));
    }
    let backend = Arc::new(OpenAiChatClient::new(
        &config.api_base,
        &config.api_key,
        &config.model,
        config.max_tokens,
        config.timeout,
    )?);
    tracing::debug!(model = %config.model, timeout_secs = config.timeout.as_secs(), "starting review");

    let agent = ReviewAgent::new(index, backend, config);
    let report = agent.review(&plan, smiles)?;
    println!("{report}");
    Ok(())
}
