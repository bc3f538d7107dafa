use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "shelfsync",
    version,
    about = "Caching proxy for marketplace catalogs and subject characteristics"
)]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/shelfsync"
    )]
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(
        long,
        global = true,
        env = "SHELFSYNC_MAX_CONNECTIONS",
        default_value_t = 5
    )]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information.
    Version,

    /// Apply database migrations.
    Migrate,

    /// Manage seller accounts.
    #[command(subcommand)]
    Account(AccountCommands),

    /// Read an account's cached products, refreshing when stale.
    Products {
        account_id: Uuid,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Resync even if the cache is fresh.
        #[arg(long)]
        force: bool,
    },

    /// Resync an account's products now.
    Sync { account_id: Uuid },

    /// Product cache statistics.
    Stats {
        #[arg(long)]
        account_id: Option<Uuid>,
    },

    /// Deactivate product rows older than twice the TTL.
    Sweep,

    /// Read a subject's characteristics, authenticating refreshes with the
    /// given account.
    Characteristics {
        account_id: Uuid,
        subject_id: i64,
        #[arg(long)]
        force: bool,
    },

    /// Invalidate a subject's cached characteristics.
    Invalidate { subject_id: i64 },

    /// Characteristics cache statistics.
    CharacteristicsStats,

    /// Mark sync runs interrupted by a crash as failed.
    Recover,
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Validate a credential upstream and store it.
    Add {
        name: String,
        #[arg(long, env = "SHELFSYNC_ACCOUNT_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long)]
        environment: Option<String>,
    },

    /// List stored accounts.
    List,

    /// Re-enable an account.
    Enable { account_id: Uuid },

    /// Disable an account; its cache stops refreshing.
    Disable { account_id: Uuid },
}
