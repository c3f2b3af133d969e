use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use imgsearch_core::{IndexStore, SledStore};
use imgsearch_server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Root directory of the sled document store
    #[arg(long, env = "IMG_DB_PATH", default_value = "./data/imgsearch.db")]
    db: String,
    /// Host to bind
    #[arg(long, env = "IMG_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "IMG_PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let store = SledStore::open(&args.db).with_context(|| format!("opening document store at {}", args.db))?;
    match store.meta()? {
        Some(meta) => tracing::info!(generation = meta.generation, documents = meta.num_documents, "serving index"),
        None => tracing::warn!("no index published yet; searches return no results until a build completes"),
    }
    let app: Router = build_app(Arc::new(store));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
