//! cicero-se - Speech Extraction
//!
//! Imports legislative protocol transcripts into the Cicero database and
//! splits them into speeches attributed to speakers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use cicero_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use cicero_common::db::{load_institution, seed_defaults, Protocol};
use cicero_common::events::{EventBus, ExtractionEvent};
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};

use cicero_se::{ExtractorService, PatternRegistry, SpecOverrides, SqliteStore};

const MODULE_NAME: &str = "cicero-se";

/// Command-line arguments for cicero-se
#[derive(Parser, Debug)]
#[command(name = "cicero-se")]
#[command(about = "Speech extraction for legislative protocols")]
#[command(version)]
struct Args {
    /// Root folder holding cicero.db
    #[arg(short, long, env = "CICERO_ROOT_FOLDER", global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create default countries and institutions
    Seed,

    /// Store a protocol transcript
    Import {
        /// UTF-8 transcript file
        file: PathBuf,

        #[arg(long, default_value = "Germany")]
        country: CountryCode,

        #[arg(long, default_value = "Parliament")]
        institution: InstitutionKind,

        #[arg(long, default_value = "Plenary")]
        kind: ProtocolKind,

        /// Session date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Document label such as "19/236"
        #[arg(long)]
        label: Option<String>,
    },

    /// Extract the speeches of one protocol
    Extract {
        protocol_id: Uuid,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Report a protocol without speaker markers as an error
        #[arg(long, conflicts_with = "allow_empty")]
        deny_empty: bool,

        /// Accept a protocol without speaker markers
        #[arg(long)]
        allow_empty: bool,
    },

    /// Extract every protocol that has no speeches yet
    ExtractAll {
        /// Concurrent protocol runs
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print every extraction event to stdout as a JSON line
        #[arg(long)]
        json_events: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Delete a protocol together with its speeches
    Delete { protocol_id: Uuid },

    /// List registered extraction patterns
    Patterns,
}

#[derive(clap::Args, Debug, Default)]
struct OverrideArgs {
    #[arg(long)]
    country: Option<CountryCode>,

    #[arg(long)]
    institution: Option<InstitutionKind>,

    #[arg(long)]
    language: Option<Language>,

    #[arg(long)]
    kind: Option<ProtocolKind>,

    /// Pattern id, bypassing the context lookup
    #[arg(long)]
    pattern: Option<String>,
}

impl From<OverrideArgs> for SpecOverrides {
    fn from(args: OverrideArgs) -> Self {
        SpecOverrides {
            country: args.country,
            institution: args.institution,
            language: args.language,
            protocol_kind: args.kind,
            pattern: args.pattern,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder.clone());
    let config = resolver.load_toml().unwrap_or_default();

    init_tracing(&config)?;

    info!("Starting cicero-se (Speech Extraction) {}", env!("CARGO_PKG_VERSION"));

    if let Command::Patterns = args.command {
        return list_patterns();
    }

    // Root folder and database
    let initializer = RootFolderInitializer::new(resolver.resolve());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let pool = cicero_se::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    let store = Arc::new(SqliteStore::new(pool));

    match args.command {
        Command::Seed => {
            let report = seed_defaults(store.pool()).await?;
            println!(
                "Seeded {} countries, {} institutions",
                report.countries_created, report.institutions_created
            );
        }

        Command::Import {
            file,
            country,
            institution,
            kind,
            date,
            label,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            seed_defaults(store.pool()).await?;
            let institution = load_institution(store.pool(), country, institution)
                .await?
                .with_context(|| format!("No {} institution for {}", institution, country))?;

            let mut protocol = Protocol::new(Some(institution.id), date, kind, text);
            protocol.label = label;
            protocol.file_source = Some(file.display().to_string());
            store.save_protocol(&protocol).await?;

            info!(protocol_id = %protocol.id, "Imported {}", file.display());
            println!("{}", protocol.id);
        }

        Command::Extract {
            protocol_id,
            overrides,
            deny_empty,
            allow_empty,
        } => {
            let allow_empty = if deny_empty {
                false
            } else {
                allow_empty || config.extraction.allow_empty
            };
            let service = build_service(Arc::clone(&store))?.with_allow_empty(allow_empty);

            let spec = service
                .spec_for(protocol_id, &config.extraction, &overrides.into())
                .await?;
            match service.extract_speeches(&spec).await {
                Ok(speech_ids) => println!("{} speeches extracted", speech_ids.len()),
                Err(e) if e.is_benign() => println!("{}", e),
                Err(e) => return Err(e).context("Extraction failed"),
            }
        }

        Command::ExtractAll {
            workers,
            json_events,
            overrides,
        } => {
            let workers = workers.unwrap_or(config.extraction.workers);
            let service =
                build_service(Arc::clone(&store))?.with_allow_empty(config.extraction.allow_empty);
            let overrides: SpecOverrides = overrides.into();
            let printer = json_events.then(|| tokio::spawn(print_events(service.events().subscribe())));

            let mut specs = Vec::new();
            for protocol_id in store.unextracted_protocol_ids().await? {
                match service.spec_for(protocol_id, &config.extraction, &overrides).await {
                    Ok(spec) => specs.push(spec),
                    Err(e) => warn!(protocol_id = %protocol_id, "Skipping protocol: {}", e),
                }
            }

            let results = service.extract_batch(specs, workers).await;
            // Closing the bus ends the printer
            drop(service);
            if let Some(printer) = printer {
                printer.await.context("Event printer failed")?;
            }

            let mut speeches = 0usize;
            let mut failures = 0usize;
            for (protocol_id, result) in &results {
                match result {
                    Ok(ids) => speeches += ids.len(),
                    Err(e) if e.is_benign() => {}
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {}", protocol_id, e);
                    }
                }
            }
            println!(
                "{} protocols processed, {} speeches extracted, {} failed",
                results.len(),
                speeches,
                failures
            );
        }

        Command::Delete { protocol_id } => {
            if store.delete_protocol(protocol_id).await? {
                println!("Deleted protocol {}", protocol_id);
            } else {
                anyhow::bail!("Protocol {} not found", protocol_id);
            }
        }

        Command::Patterns => {}
    }

    Ok(())
}

/// Install the global subscriber: `RUST_LOG` wins over the configured level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<ExtractionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Cannot serialize event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged, {} events skipped", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn build_service(store: Arc<SqliteStore>) -> Result<ExtractorService<SqliteStore>> {
    let registry = PatternRegistry::global().context("Failed to build pattern registry")?;
    Ok(ExtractorService::new(store, EventBus::default(), registry))
}

fn list_patterns() -> Result<()> {
    let registry = PatternRegistry::global().context("Failed to build pattern registry")?;

    for pattern in registry.patterns() {
        let meta = &pattern.metadata;
        let rules: Vec<String> = meta
            .rules
            .iter()
            .map(|(id, version)| format!("{} v{}", id, version))
            .collect();
        println!(
            "{:<20} {}/{}/{}/{}  [{}]{}",
            meta.id,
            meta.key.country,
            meta.key.institution,
            meta.key.language,
            meta.key.protocol_kind,
            rules.join(", "),
            if meta.has_session_bounds { " (session bounds)" } else { "" }
        );
        println!("{:<20} {}", "", meta.description);
    }

    Ok(())
}
