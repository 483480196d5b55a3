mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gigbridge_client::{GigClient, Urn};
use gigbridge_common::{Message, MessageContent, MessageDirection, RoomId, SimpleTemplate, UserId};
use gigbridge_db::{BridgeStore, Database, MessageRecord, migrations, registry};
use tokio::io::AsyncBufReadExt;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::CommandEvent;
use crate::config::{AppConfig, ConfigLoader};

#[derive(Parser)]
#[command(name = "gigbridge", version, about = "GigBridge - Matrix bridge for gig messaging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge
    Start,

    /// Run pending database migrations and exit
    Migrate,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("failed to load configuration")?;

    match cli.command {
        Commands::Start => start(config).await,
        Commands::Migrate => migrate(config),
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

/// Startup sequence: migrate the database, verify the gig API, then serve.
/// Any migration failure aborts startup before the bridge touches traffic.
async fn start(config: AppConfig) -> Result<()> {
    let store = open_store(&config).context("database migration failed")?;
    info!("database ready at {}", config.bridge.database);

    let puppet_mxid: SimpleTemplate<String> = SimpleTemplate::with_affixes(
        config.bridge.username_template.clone(),
        "userid",
        "@",
        &format!(":{}", config.homeserver.domain),
    )
    .context("bridge.username_template is invalid")?;
    info!(
        "puppet MXIDs look like {}",
        puppet_mxid.format_full(&"<userid>".to_string())
    );

    let client = GigClient::new(&config.gig.base_url, config.gig.token.clone())
        .context("failed to build gig client")?;
    client.ping().await.context("gig API check failed")?;

    info!("bridge started, waiting for events");
    run_event_loop(store, client).await
}

/// Placeholder event loop: the Matrix transport and the gig realtime feed
/// are out of scope, so management commands are taken from stdin instead of
/// a bridge admin room until those land.
async fn run_event_loop(store: BridgeStore, client: GigClient) -> Result<()> {
    let bot = UserId::from_str("@gigbot:localhost");
    let admin = UserId::from_str("@admin:localhost");
    let admin_room = RoomId::from_str("!admin:localhost");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(text) => {
                    if let Some(event) =
                        CommandEvent::parse(admin.clone(), admin_room.clone(), &text)
                    {
                        let reply = event.handle(&bot);
                        if let MessageContent::System(body) = &reply.content {
                            println!("{body}");
                        }
                    } else if !text.trim().is_empty() {
                        let message = Message::text(
                            admin_room.clone(),
                            admin.clone(),
                            MessageDirection::ToRemote,
                            text,
                        );
                        if let Err(e) = relay_to_gig(&store, &client, &message).await {
                            warn!("failed to relay message: {e:#}");
                        }
                    }
                }
                None => break,
            },
        }
    }

    info!("shutting down");
    Ok(())
}

/// Pushes one Matrix-side message into the gig thread bridged to its room,
/// recording the event/URN mapping once the event has a Matrix ID.
async fn relay_to_gig(store: &BridgeStore, client: &GigClient, message: &Message) -> Result<()> {
    let text = match &message.content {
        MessageContent::Text(text) => text,
        other => {
            debug!("not relaying unsupported content: {other:?}");
            return Ok(());
        }
    };
    let Some(portal) = store.get_portal_by_mxid(message.room_id.as_str())? else {
        debug!("no portal bridged to {}, dropping message", message.room_id);
        return Ok(());
    };

    let thread_urn = Urn::new(portal.gig_thread_urn.clone());
    let message_urn = client.send_message(&thread_urn, text).await?;
    info!("relayed {} message to {thread_urn} as {message_urn}", message.room_id);

    if let Some(event_id) = &message.event_id {
        let sender_urn = store
            .get_user(message.sender.as_str())?
            .and_then(|user| user.gig_member_urn)
            .unwrap_or_default();
        store.insert_message(&MessageRecord {
            mxid: event_id.to_string(),
            mx_room: message.room_id.to_string(),
            gig_message_urn: message_urn.to_string(),
            gig_thread_urn: portal.gig_thread_urn,
            gig_sender_urn: sender_urn,
            gig_receiver_urn: portal.gig_receiver_urn,
            index: 0,
            timestamp: message.timestamp.timestamp_millis() as f64 / 1000.0,
        })?;
    }
    Ok(())
}

fn migrate(config: AppConfig) -> Result<()> {
    let db = Database::open(&config.bridge.database)?;
    migrations::register_migrations()?;
    if config.bridge.allow_unsupported_db {
        registry::allow_unsupported(migrations::NAMESPACE, true)?;
    }
    registry::upgrade(migrations::NAMESPACE, &db).context("migration failed")?;
    let version: Option<i64> =
        db.fetch_optional("SELECT version FROM version LIMIT 1", [], |row| row.get(0))?;
    println!(
        "database at v{} ({})",
        version.unwrap_or(0),
        config.bridge.database
    );
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<BridgeStore> {
    migrations::register_migrations()?;
    if config.bridge.allow_unsupported_db {
        registry::allow_unsupported(migrations::NAMESPACE, true)?;
    }
    Ok(BridgeStore::open_uri(&config.bridge.database)?)
}
