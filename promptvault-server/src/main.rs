use clap::Parser;
use promptvault_core::{MigrationRunner, PromptVaultConfig, Store};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "promptvault.toml")]
    config: String,

    /// Check the database and print store stats, then exit
    #[arg(long)]
    health: bool,

    /// Apply pending migrations, then exit
    #[arg(long)]
    migrate_only: bool,

    /// Roll back the most recently applied migration, then exit
    #[arg(long, conflicts_with_all = ["health", "migrate_only"])]
    rollback: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match PromptVaultConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.rollback {
        let pool = match promptvault_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };
        let runner = MigrationRunner::new(&pool, &config.database.migrations_dir);
        match runner.rollback_latest().await {
            Ok(Some(version)) => println!("Rolled back migration {}", version),
            Ok(None) => println!("No applied migrations to roll back"),
            Err(e) => {
                eprintln!("Rollback failed: {}", e);
                std::process::exit(1);
            }
        }
        pool.close().await;
        return Ok(());
    }

    // Migrations run as part of opening; any failure is fatal.
    let (store, report) = match Store::open(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    if args.migrate_only {
        println!(
            "Migrations applied: {:?} (already applied: {})",
            report.applied,
            report.skipped.len()
        );
        for script in store.migrations().status().await? {
            let state = if script.applied { "applied" } else { "pending" };
            println!("  {} {} {}", script.version, script.name, state);
        }
        store.close().await;
        return Ok(());
    }

    if args.health {
        if let Err(e) = store.health().await {
            println!("❌ Database unhealthy: {}", e);
            std::process::exit(1);
        }
        let stats = store.stats().await?;
        println!("✅ Database connected: {}", config.database.path);
        println!(
            "   conversations={} messages={} ratings={}",
            stats.conversations, stats.messages, stats.ratings
        );
        if let Some(bytes) = stats.database_size_bytes {
            println!("   size={} bytes", bytes);
        }
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

    let result =
        promptvault_server::http::start_http_server(store.clone(), config, tx.subscribe()).await;
    store.close().await;
    result
}
