//! tandem-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `TANDEM_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Development seeding
//!
//! Registration and sign-in live in an external identity provider. For local
//! use, seed a user and mint a bearer token for it:
//!
//! ```text
//! tandem-server add-user --name Alice
//! tandem-server issue-session <USER_ID>
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rand_core::{OsRng, RngCore as _};
use tandem_core::store::ChatStore as _;
use tandem_server::{AppState, ServerConfig, session::token_digest};
use tandem_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Tandem chat server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Create a user and print its id.
  AddUser {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    image: Option<String>,
  },
  /// Mint a bearer token for an existing user and print it.
  IssueSession { user_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so seeding commands can print plain values on stdout.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TANDEM"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, server_cfg).await,
    Command::AddUser { name, image } => {
      let user = store
        .add_user(Some(name), image)
        .await
        .context("failed to add user")?;
      println!("{}", user.id);
      Ok(())
    }
    Command::IssueSession { user_id } => {
      let mut bytes = [0u8; 32];
      OsRng.fill_bytes(&mut bytes);
      let token = hex::encode(bytes);
      store
        .add_session(user_id, token_digest(&token))
        .await
        .with_context(|| format!("failed to issue session for {user_id}"))?;
      println!("{token}");
      Ok(())
    }
  }
}

async fn serve(store: SqliteStore, config: ServerConfig) -> anyhow::Result<()> {
  let address = format!("{}:{}", config.host, config.port);
  let app = tandem_server::router(AppState::new(store, config));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
