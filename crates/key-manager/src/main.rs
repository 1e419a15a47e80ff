use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use key_manager::configuration::Config;
use key_manager::{
    ApiKeyCreated, ApiKeyFilter, ApiKeyManager, ApiKeyRecord, ApiKeyType, Authentication,
    CreateApiKey, CreateRawApiKey, ExpirySweeper, FindOptions, SqliteApiKeyStore, UpdateApiKey,
    UpdateApiKeyDate,
};
use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

type Manager = ApiKeyManager<SqliteApiKeyStore>;

#[derive(Debug, Parser)]
#[command(name = "key-manager", about = "Issue and manage API keys")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, default_value = "key-manager.yaml")]
    config: PathBuf,

    /// Override `app.env`, the prefix of generated keys.
    #[arg(long)]
    env: Option<String>,

    /// Override `database.path`.
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a key with generated credentials.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "DEFAULT")]
        key_type: ApiKeyType,
        #[arg(long, value_parser = parse_date)]
        start_date: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_date)]
        end_date: Option<DateTime<Utc>>,
    },
    /// Create a key from a known key and secret.
    CreateRaw {
        #[arg(long)]
        name: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        secret: String,
        #[arg(long = "type", default_value = "DEFAULT")]
        key_type: ApiKeyType,
        #[arg(long, value_parser = parse_date)]
        start_date: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_date)]
        end_date: Option<DateTime<Utc>>,
    },
    /// List keys.
    List {
        /// Include soft-deleted keys.
        #[arg(long)]
        all: bool,
        /// Only inactive keys.
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    Show {
        id: Uuid,
    },
    Activate {
        id: Uuid,
    },
    Deactivate {
        id: Uuid,
    },
    Rename {
        id: Uuid,
        #[arg(long)]
        name: String,
    },
    UpdateDate {
        id: Uuid,
        #[arg(long, value_parser = parse_date)]
        start_date: DateTime<Utc>,
        #[arg(long, value_parser = parse_date)]
        end_date: DateTime<Utc>,
    },
    /// Generate a new secret for a key.
    Reset {
        id: Uuid,
    },
    /// Soft-delete a key.
    Delete {
        id: Uuid,
    },
    /// Permanently remove soft-deleted keys.
    Purge,
    /// Deactivate keys whose end date has passed.
    Sweep,
    /// Check a `key:secret` credential.
    Verify {
        credential: String,
    },
    /// Sweep periodically until interrupted.
    RunSweeper,
}

/// Accepts `YYYY-MM-DD` or RFC 3339.
fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

fn print_record(record: &ApiKeyRecord) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

fn print_created(created: &ApiKeyCreated) -> Result<(), Box<dyn Error>> {
    let out = json!({
        "record": created.record,
        "secret": created.secret.expose(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    eprintln!("Store the secret now, it cannot be shown again.");
    Ok(())
}

fn load(manager: &Manager, id: Uuid) -> Result<ApiKeyRecord, Box<dyn Error>> {
    manager
        .find_one_by_id(id, &FindOptions::default())?
        .ok_or_else(|| format!("API key {} not found", id).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Enable basic logging; set RUST_LOG=info for visibility.
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(env) = cli.env {
        config.app.env = env;
    }
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    let store = SqliteApiKeyStore::open(&config.database.path)?;
    let manager = ApiKeyManager::new(config.manager_config(), store);

    match cli.command {
        Command::Create {
            name,
            key_type,
            start_date,
            end_date,
        } => {
            let created = manager.create(CreateApiKey {
                name,
                key_type,
                start_date,
                end_date,
            })?;
            print_created(&created)?;
        }
        Command::CreateRaw {
            name,
            key,
            secret,
            key_type,
            start_date,
            end_date,
        } => {
            let created = manager.create_raw(CreateRawApiKey {
                name,
                key,
                secret: secret.into(),
                key_type,
                start_date,
                end_date,
            })?;
            print_created(&created)?;
        }
        Command::List {
            all,
            inactive,
            limit,
            offset,
        } => {
            let mut filter = ApiKeyFilter::new();
            if inactive {
                filter = filter.is_active(false);
            }
            let mut options = FindOptions::new().include_deleted(all);
            options.limit = limit;
            options.offset = offset;

            let records = manager.find_all(&filter, &options)?;
            let total = manager.get_total(&filter, &options)?;
            let out = json!({ "total": total, "data": records });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Show { id } => print_record(&load(&manager, id)?)?,
        Command::Activate { id } => print_record(&manager.active(load(&manager, id)?)?)?,
        Command::Deactivate { id } => print_record(&manager.inactive(load(&manager, id)?)?)?,
        Command::Rename { id, name } => {
            let record = manager.update(load(&manager, id)?, UpdateApiKey { name })?;
            print_record(&record)?;
        }
        Command::UpdateDate {
            id,
            start_date,
            end_date,
        } => {
            let record = manager.update_date(
                load(&manager, id)?,
                UpdateApiKeyDate {
                    start_date: Some(start_date),
                    end_date: Some(end_date),
                },
            )?;
            print_record(&record)?;
        }
        Command::Reset { id } => {
            let created = manager.reset_secret(load(&manager, id)?)?;
            print_created(&created)?;
        }
        Command::Delete { id } => print_record(&manager.delete(load(&manager, id)?)?)?,
        Command::Purge => {
            let purged = manager
                .delete_many(&ApiKeyFilter::new().deleted(true), &FindOptions::with_deleted())?;
            println!("{}", json!({ "purged": purged }));
        }
        Command::Sweep => {
            let updated = manager.inactive_many_by_end_date(&FindOptions::default())?;
            println!("{}", json!({ "deactivated": updated }));
        }
        Command::Verify { credential } => match manager.authenticate(&credential)? {
            Authentication::Granted(record) => print_record(&record)?,
            Authentication::Denied(reason) => {
                return Err(format!("access denied: {:?}", reason).into());
            }
        },
        Command::RunSweeper => {
            let interval = config.sweeper.interval();
            let sweeper = ExpirySweeper::new(Arc::new(manager), interval);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Shutting down expiry sweeper");
                }
                let _ = shutdown_tx.send(true);
            });

            log::info!("Sweeping expired API keys every {:?}", interval);
            sweeper.run(shutdown_rx).await;
        }
    }

    Ok(())
}
