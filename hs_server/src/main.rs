//! Hydraulisc server binary.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Error};
use chrono::Duration;
use hs_server::{
    api::{self, AppState},
    config::{CliOverrides, ServerConfig},
    logging, maintenance, metrics, reload,
};
use hydraulisc::{
    AdmissionConfig, AuthManager, InviteLedger,
    db::{Database, Stores},
};
use pico_args::Arguments;
use tracing::{info, warn};

const HELP: &str = "\
Run the Hydraulisc server

USAGE:
  hs_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT  Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:3000]
  --db-url        URL      Database connection string  [default: env DATABASE_URL]
  --config        PATH     Admission config file, re-read on SIGHUP  [default: env ADMISSION_CONFIG]
  --mint-invites  N        Mint N invite codes, print their links and exit

FLAGS:
  --memory                 Keep all data in process memory (development only)
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:3000)
  DATABASE_URL             PostgreSQL connection string
  PASSWORD_PEPPER          Password hashing pepper (required, 16+ characters)
  SESSION_TTL_SECS         Rolling session lifetime  [default: 86400]
  ADMISSION_MODE           open, inviteOnly or closed when no config file is given  [default: closed]
  PUBLIC_URL               Base URL used in invite links
  METRICS_BIND             Prometheus listener address (disabled when unset)
  TRUSTED_PROXIES          Comma-separated proxy IPs whose X-Forwarded-For is believed
  (See .env.example for all configuration options)
";

struct Args {
    overrides: CliOverrides,
    mint_invites: Option<usize>,
}

fn parse_args() -> Result<Args, Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        overrides: CliOverrides {
            bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
            database_url: pargs.opt_value_from_str("--db-url")?,
            admission_config: pargs.opt_value_from_str::<_, PathBuf>("--config")?,
            in_memory: pargs.contains("--memory"),
        },
        mint_invites: pargs.opt_value_from_str("--mint-invites")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {remaining:?}");
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let config = ServerConfig::from_env(args.overrides)?;
    config.validate()?;

    logging::init();

    let (stores, database) = open_stores(&config).await?;

    if let Some(count) = args.mint_invites {
        return mint_invites(&stores, &config.public_url, count).await;
    }

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics listening on {addr}");
    }

    let admission = match &config.admission.config_path {
        Some(path) => {
            let admission = AdmissionConfig::load_file(path)
                .with_context(|| format!("Failed to load admission config {}", path.display()))?;
            reload::spawn_sighup_handler(path.clone(), admission.clone());
            admission
        }
        None => AdmissionConfig::new(config.admission.mode),
    };
    info!("Admission mode: {}", admission.mode());

    let auth_manager = AuthManager::new(&stores, config.security.password_pepper.clone())
        .with_session_ttl(Duration::seconds(config.session.ttl_secs));

    if !config.trusted_proxies.is_empty() {
        info!("Trusting X-Forwarded-For from {:?}", config.trusted_proxies);
    }
    let mut state = AppState::new(&stores, auth_manager, admission, &config.public_url)
        .with_trusted_proxies(config.trusted_proxies.clone());
    if let Some(database) = database.clone() {
        state = state.with_database(database);
    }

    maintenance::spawn_cleanup_task(
        Arc::clone(&state.auth_manager),
        maintenance::DEFAULT_CLEANUP_INTERVAL,
    );

    let app = api::create_router(state);

    info!("Starting HTTP server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down server...");
    if let Some(database) = database {
        database.close().await;
    }

    Ok(())
}

/// PostgreSQL stores with the schema in place, or in-memory stores
async fn open_stores(config: &ServerConfig) -> Result<(Stores, Option<Database>), Error> {
    if config.in_memory {
        warn!("Running with in-memory storage; all data is lost on exit");
        return Ok((Stores::in_memory(), None));
    }

    info!("Connecting to database");
    let database = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    database
        .migrate()
        .await
        .context("Failed to prepare database schema")?;
    info!("Database connected successfully");

    Ok((Stores::postgres(database.pool().clone()), Some(database)))
}

/// Mint invites from the command line, for bootstrapping an invite-only instance
async fn mint_invites(stores: &Stores, public_url: &str, count: usize) -> Result<(), Error> {
    let ledger = InviteLedger::new(Arc::clone(&stores.invites));
    let minted = ledger.generate(count).await?;

    println!("Generated invite codes:");
    for invite in &minted {
        println!("{}", ServerConfig::invite_link(public_url, &invite.code));
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }
}
