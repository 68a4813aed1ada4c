use anyhow::Result;
use clap::{Parser, Subcommand};
use rxd_schemas::Role;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "rxd")]
#[command(about = "Pharma distribution operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (later files override earlier ones)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Account administration
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },

    /// Stock ledger utilities
    Stock {
        #[command(subcommand)]
        cmd: StockCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations (idempotent).
    Migrate,
}

#[derive(Subcommand)]
enum UserCmd {
    /// Create a user directly in the database and print their bearer token.
    /// Used to bootstrap the first admin.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// admin | distributor | employee
        #[arg(long)]
        role: String,
        #[arg(long)]
        phone: Option<String>,
        /// Company name (required for distributors)
        #[arg(long)]
        company: Option<String>,
        /// Drug licence number (required for distributors)
        #[arg(long)]
        license: Option<String>,
    },

    /// Issue a fresh token, invalidating the previous one.
    RotateToken {
        #[arg(long)]
        user_id: Uuid,
    },
}

#[derive(Subcommand)]
enum StockCmd {
    /// Replay stock ledgers and compare with current stock.
    /// Exits non-zero when any ledger is inconsistent.
    Verify {
        #[arg(long)]
        product_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = rxd_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = rxd_db::status(&pool).await?;
                    println!("db_ok={} has_schema={}", s.ok, s.has_schema);
                }
                DbCmd::Migrate => {
                    rxd_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rxd_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::User { cmd } => match cmd {
            UserCmd::Create {
                name,
                email,
                role,
                phone,
                company,
                license,
            } => {
                let role = Role::parse(&role)?;
                commands::user::create(name, email, role, phone, company, license).await?;
            }
            UserCmd::RotateToken { user_id } => commands::user::rotate_token(user_id).await?,
        },

        Commands::Stock { cmd } => match cmd {
            StockCmd::Verify { product_id } => {
                let consistent = commands::stock::verify(product_id).await?;
                if !consistent {
                    anyhow::bail!(
                        "LEDGER_INCONSISTENT: one or more stock ledgers failed verification"
                    );
                }
            }
        },
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the `key=value` output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
