//! hvgate - forward sensor channels to a personal health record.
//!
//! Run with: `cargo run -p hvgate-service -- run < samples.jsonl`

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hvgate_core::{
    ChannelBus, Client, FileCredentialStore, HttpsTransport, Transport, ensure_app_instance,
    ensure_client,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hvgate_service::{ChannelTable, Config, Pipeline, spawn_line_source};

/// hvgate - sensor channel to health record gateway.
#[derive(Parser, Debug)]
#[command(name = "hvgate")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Service host (overrides config).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Credential file path (overrides config).
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forward samples read from stdin (default behavior).
    Run,

    /// Load or create this gateway's application instance and print its id.
    Provision,

    /// List the persons this gateway is authorized for.
    People,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hvgate_service=info".parse()?)
                .add_directive("hvgate_core=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(&args)?;
    let transport: Arc<dyn Transport> =
        Arc::new(HttpsTransport::with_timeout(config.service.request_timeout())?);
    let store = FileCredentialStore::new(&config.service.credentials_path);

    match args.command {
        Some(Command::Provision) => {
            let app = ensure_app_instance(
                &store,
                transport.as_ref(),
                &config.service.host,
                &config.service.master_app_id,
            )
            .await?;
            println!("{}", app.app_id);
            Ok(())
        }
        Some(Command::People) => {
            let client = open_client(&config, &store, transport).await?;
            for (index, person) in client.persons().await.iter().enumerate() {
                println!(
                    "{:>3}  {}  person {}  record {}",
                    index, person.display_name, person.person_id, person.record_id
                );
            }
            Ok(())
        }
        Some(Command::Run) | None => run(config, &store, transport).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(host) = &args.host {
        config.service.host = host.clone();
    }
    if let Some(path) = &args.credentials {
        config.service.credentials_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn open_client(
    config: &Config,
    store: &FileCredentialStore,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<Client> {
    info!(
        "Opening session with {} (credentials at {:?})",
        config.service.host,
        store.path()
    );
    let client = ensure_client(
        store,
        transport,
        &config.service.host,
        &config.service.master_app_id,
    )
    .await
    .with_context(|| format!("could not open a session with {}", config.service.host))?;
    Ok(client)
}

async fn run(
    config: Config,
    store: &FileCredentialStore,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<()> {
    let client = open_client(&config, store, transport).await?;
    let person = client
        .select_person(config.service.person_selector())
        .await?;
    info!("Uploading for {}", person);

    let table = ChannelTable::from_config(config.bridge.channels.as_deref())
        .map_err(|unknown| anyhow::anyhow!("unknown channel(s): {}", unknown.join(", ")))?;

    let cancel = CancellationToken::new();
    let bus = ChannelBus::default();
    let pipeline = Pipeline::start(
        Arc::new(client),
        &bus,
        table,
        &config.bridge,
        cancel.clone(),
    );

    let source = spawn_line_source(io::BufReader::new(io::stdin()), bus.clone())?;
    // the source thread now owns the only publisher
    drop(bus);

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            ctrl_c.cancel();
        }
    });

    let stats = pipeline.join().await;
    if source.is_finished() {
        match source.join() {
            Ok(count) => info!("Read {} sample(s)", count),
            Err(_) => warn!("Sample source thread panicked"),
        }
    }

    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
