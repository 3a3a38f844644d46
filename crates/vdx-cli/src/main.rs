use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vdx_collector::{CycleOptions, EnvCredentials};
use vdx_config::CollectorSettings;
use vdx_db::PgStateStore;
use vdx_portal::CantaloupeClient;

#[derive(Parser)]
#[command(name = "vdx")]
#[command(about = "vendex DEX telemetry CLI", long_about = None)]
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
        /// Paths in merge order (base -> env -> site...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Parse a raw DEX file and print the summary and grouped key-values
    Parse {
        /// Path to a raw DEX document
        path: String,

        /// Also print the flat key-value map
        #[arg(long, default_value_t = false)]
        flat: bool,
    },

    /// Provision companies and machines
    Provision {
        #[command(subcommand)]
        cmd: ProvisionCmd,
    },

    /// Run one collection cycle now and print the per-company report
    Collect,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ProvisionCmd {
    /// Create a company (no-op if the name exists). Prints its id.
    Company {
        #[arg(long)]
        name: String,
    },

    /// Create a machine under a company, keyed by case serial.
    Machine {
        /// Company name (must already exist)
        #[arg(long)]
        company: String,

        /// Machine case serial as the portal reports it
        #[arg(long)]
        case_serial: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = vdx_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = vdx_db::status(&pool).await?;
                    println!("db_ok={} has_machines_table={}", s.ok, s.has_machines_table);
                }
                DbCmd::Migrate => {
                    vdx_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = vdx_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Parse { path, flat } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read DEX file: {path}"))?;
            let segments = vdx_dex::tokenize(&raw);
            let map = vdx_dex::extract(&segments);
            let summary = vdx_dex::summarize(&map);
            let groups = vdx_dex::format_groups(&map);

            let mut out = serde_json::json!({
                "summary": summary,
                "groups": groups,
            });
            if flat {
                out["flat"] = serde_json::to_value(&map)?;
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Provision { cmd } => {
            let pool = vdx_db::connect_from_env().await?;
            match cmd {
                ProvisionCmd::Company { name } => {
                    let id = vdx_db::upsert_company(&pool, &name).await?;
                    println!("company_id={id}");
                }
                ProvisionCmd::Machine {
                    company,
                    case_serial,
                } => {
                    let company_id = vdx_db::upsert_company(&pool, &company).await?;
                    let id = vdx_db::upsert_machine(&pool, company_id, &case_serial).await?;
                    println!("machine_id={id}");
                }
            }
        }

        Commands::Collect => {
            let settings = match std::env::var("VDX_CONFIG") {
                Ok(paths) => {
                    let paths: Vec<&str> = paths.split(',').map(str::trim).collect();
                    let loaded = vdx_config::load_layered_yaml(&paths)?;
                    CollectorSettings::from_config(&loaded.config_json)?
                }
                Err(_) => CollectorSettings::default(),
            };

            let pool = vdx_db::connect_from_env().await?;
            vdx_db::migrate(&pool).await?;
            let store = PgStateStore::new(pool);
            let portal = CantaloupeClient::new(&settings.portal_base_url)
                .map_err(|e| anyhow::anyhow!("portal client init failed: {e}"))?;
            let options = CycleOptions {
                inter_company_delay: Duration::from_secs(settings.inter_company_delay_secs),
            };

            let report =
                vdx_collector::run_cycle(&store, &portal, &EnvCredentials, &options).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_succeeded() {
                anyhow::bail!("cycle finished with failed companies");
            }
        }
    }

    Ok(())
}
