use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::{load_engine, router, MAX_K};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "server", about = "Serve ranked queries over a merged index")]
struct Args {
    /// Merged index directory
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Upper bound for the `k` query parameter
    #[arg(long, default_value_t = MAX_K)]
    max_k: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    // fail before binding if the index is missing or was built with another pipeline
    let engine = match load_engine(&args.index) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(index = %args.index, error = %e, "index failed validation");
            return Err(e);
        }
    };
    tracing::info!(
        index = %args.index,
        num_docs = engine.num_docs(),
        num_terms = engine.num_terms(),
        stemmer = ?engine.pipeline().config().stemmer,
        max_k = args.max_k,
        "index validated"
    );
    let app = router(engine, args.max_k);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
