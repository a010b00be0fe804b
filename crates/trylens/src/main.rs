use anyhow::Context;
use clap::{Parser, Subcommand};
use trylens::service::TryService;
use trylens::{http, telemetry};
use trylens_capture::sampler::Sampler;
use trylens_core::config::{Config, StoreMode};
use trylens_store::{BackendStore, MemoryStore, TraceStore, TryRegistry};

#[derive(Parser, Debug)]
#[command(name = "trylens")]
#[command(about = "Opt-in request-scoped trace capture and bottleneck analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the analysis HTTP server")]
    Run {
        #[arg(long)]
        http_addr: Option<String>,
        #[arg(long)]
        store_mode: Option<String>,
        #[arg(long)]
        backend_endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            http_addr,
            store_mode,
            backend_endpoint,
        } => run_server(http_addr, store_mode, backend_endpoint).await,
    }
}

async fn run_server(
    http_addr: Option<String>,
    store_mode: Option<String>,
    backend_endpoint: Option<String>,
) -> anyhow::Result<()> {
    telemetry::init_tracing();

    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = store_mode {
        cfg.store_mode = v.parse::<StoreMode>()?;
    }
    if let Some(v) = backend_endpoint {
        cfg.backend_endpoint = v;
    }

    let store = match cfg.store_mode {
        StoreMode::Memory => TraceStore::Memory(MemoryStore::new(cfg.memory_span_cap)),
        StoreMode::Backend => TraceStore::Backend(BackendStore::from_config(&cfg)),
    };
    let registry = TryRegistry::new();
    let service = TryService::new(store.clone(), registry.clone());
    let sampler = Sampler::new(registry.clone());
    let app = http::router(service, sampler);

    eprintln!("trylens run");
    eprintln!("  http: {}", cfg.http_addr);
    eprintln!("  store: {:?}", cfg.store_mode);
    if cfg.store_mode == StoreMode::Backend {
        eprintln!("  backend: {}", cfg.backend_endpoint);
    }

    let retention_task = tokio::spawn({
        let store = store.clone();
        let registry = registry.clone();
        let ttl = cfg.retention_ttl;
        let max_tries = cfg.retention_max_tries;
        async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.run_retention(ttl, max_tries);
                registry.run_retention(ttl, max_tries);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("bind {}", cfg.http_addr))?;
    tracing::info!(addr = %cfg.http_addr, "serving analysis api");

    tokio::select! {
        res = axum::serve(listener, app) => {
            res.context("http server")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    retention_task.abort();
    Ok(())
}
