pub use self::error::{Error, Result};
mod error;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{AccountCommands, Cli, Commands};
use serde::Serialize;
use shelfsync_core::credentials::PlaintextCipher;
use shelfsync_core::store::PgStore;
use shelfsync_core::upstream::http::HttpUpstream;
use shelfsync_core::{CacheConfig, CacheService, Envelope};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

mod cli;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    if let Commands::Version = args.command {
        println!("shelfsync {}", shelfsync_core::version());
        return Ok(ExitCode::SUCCESS);
    }

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    if let Commands::Migrate = args.command {
        info!("running database migrations");
        shelfsync_core::migrate::migrate(&pool).await?;
        return print(Envelope::ok("migrations applied"));
    }

    let config = CacheConfig::from_env()?;
    info!(
        strategy = config.sync_strategy.name(),
        product_ttl_hours = config.product_ttl.num_hours(),
        characteristics_ttl_days = config.characteristics_ttl.num_days(),
        "cache configured"
    );
    let upstream = HttpUpstream::new(&config.upstream)?;
    let service = CacheService::new(
        &config,
        Arc::new(PgStore::new(pool)),
        Arc::new(upstream),
        Arc::new(PlaintextCipher),
    );

    if let Commands::Recover = args.command {
        return print(service.recover_interrupted_runs().await);
    }
    let recovered = service.recover_interrupted_runs().await;
    if let Some(err) = recovered.error {
        warn!(error = %err.message, "startup recovery of sync runs failed");
    }

    match args.command {
        Commands::Account(cmd) => match cmd {
            AccountCommands::Add {
                name,
                secret,
                environment,
            } => print(
                service
                    .register_account(&name, environment.as_deref(), &secret)
                    .await,
            ),
            AccountCommands::List => print(service.list_accounts().await),
            AccountCommands::Enable { account_id } => {
                print(service.set_account_active(account_id, true).await)
            }
            AccountCommands::Disable { account_id } => {
                print(service.set_account_active(account_id, false).await)
            }
        },
        Commands::Products {
            account_id,
            limit,
            offset,
            force,
        } => print(
            service
                .get_cached_products(account_id, limit, offset, force)
                .await,
        ),
        Commands::Sync { account_id } => print(service.sync_products_now(account_id).await),
        Commands::Stats { account_id } => print(service.get_product_cache_stats(account_id).await),
        Commands::Sweep => print(service.clear_expired_product_cache().await),
        Commands::Characteristics {
            account_id,
            subject_id,
            force,
        } => print(
            service
                .get_subject_characteristics(account_id, subject_id, force)
                .await,
        ),
        Commands::Invalidate { subject_id } => print(
            service
                .invalidate_subject_characteristics_cache(subject_id)
                .await,
        ),
        Commands::CharacteristicsStats => print(service.get_characteristics_cache_stats().await),
        Commands::Version | Commands::Migrate | Commands::Recover => {
            Err(Error::Custom("command already handled".into()))
        }
    }
}

/// Print the envelope as JSON; a failed envelope exits non-zero.
fn print<T: Serialize>(envelope: Envelope<T>) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
