use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imgsearch_core::{JsonSource, SledStore};
use imgsearch_indexer::{build, import, stats};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "imgsearch-indexer")]
#[command(about = "Build and publish the image text index", long_about = None)]
struct Cli {
    /// Root directory of the sled document store
    #[arg(long, env = "IMG_DB_PATH", default_value = "./data/imgsearch.db", global = true)]
    db: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from scratch and publish it atomically
    Build {
        /// Read source records from a JSON/JSONL file or directory instead of the store
        #[arg(long)]
        input: Option<String>,
    },
    /// Load source records from a JSON/JSONL file or directory into the store
    Import {
        #[arg(long)]
        input: String,
    },
    /// Print the published index generation
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = SledStore::open(&cli.db).with_context(|| format!("opening document store at {}", cli.db))?;

    match cli.command {
        Commands::Build { input } => {
            match input {
                Some(path) => build(&store, &JsonSource::new(path))?,
                None => build(&store, &store)?,
            };
        }
        Commands::Import { input } => {
            import(&store, &input)?;
        }
        Commands::Stats => println!("{}", stats(&store)?),
    }
    Ok(())
}
