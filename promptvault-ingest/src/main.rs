use clap::Parser;
use promptvault_core::{PromptVaultConfig, Store};
use promptvault_ingest::{drain_queue, run_ingest_loop, Ingester, Queue};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "promptvault.toml")]
    config: String,

    /// Drain the queue once and exit
    #[arg(long)]
    once: bool,

    /// Recompute conversation counters from their messages and exit
    #[arg(long, conflicts_with = "once")]
    recount: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match PromptVaultConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let (store, _) = match Store::open(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    if args.recount {
        let drifted = store.recount_all().await?;
        for r in &drifted {
            println!(
                "conversation {}: prompts {} -> {}, characters {} -> {}",
                r.conversation_id, r.before.0, r.after.0, r.before.1, r.after.1
            );
        }
        println!("Recount complete: {} conversation(s) corrected", drifted.len());
        store.close().await;
        return Ok(());
    }

    let ingester = Ingester::new(store.clone());
    let queue = Queue::new(&config.ingest.queue_dir);

    if args.once {
        let report = drain_queue(&ingester, &queue).await?;
        println!(
            "Ingested {} event(s) from {} file(s): {} skipped, {} failed",
            report.events_ingested, report.files, report.events_skipped, report.events_failed
        );
        store.close().await;
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    run_ingest_loop(
        ingester,
        queue,
        config.ingest.poll_interval_seconds,
        tx.subscribe(),
    )
    .await;

    store.close().await;
    Ok(())
}
