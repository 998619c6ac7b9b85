use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;

use shelfpull::{
  app_state::{AppPaths, AppState, Config},
  client, engine, error, server,
  session::SessionRegistry,
};

#[derive(Parser)]
#[command(name = "shelfpull", version, about = "Reading-notes export with live progress")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the export server.
  Serve,
  /// Submit an extraction job and follow its progress in the terminal.
  Extract {
    /// Server base url.
    #[arg(long, default_value = "http://127.0.0.1:8930")]
    server: String,
    /// Reading-service cookie string; falls back to $SHELFPULL_COOKIE.
    #[arg(long)]
    cookie: Option<String>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  match Cli::parse().command {
    Command::Serve => {
      let paths = AppPaths::from_env()?;
      error::init_tracing(&paths)?;
      let config = Config::from_env()?;
      tracing::info!(data_dir = %paths.data_dir.display(), "starting shelfpull");

      let engine = engine::ExtractEngine::new(engine::JobContext {
        upstream_base: config.upstream_base.clone(),
        upstream_api_base: config.upstream_api_base.clone(),
        output_root: paths.output_dir.clone(),
        book_pause: Duration::from_millis(config.book_pause_ms),
      });
      engine.start();

      let state = AppState {
        config,
        paths,
        sessions: SessionRegistry::new(),
        engine: engine.handle(),
      };
      server::serve(state).await
    }
    Command::Extract { server, cookie } => {
      error::init_client_tracing();
      let cookie = cookie
        .or_else(|| std::env::var("SHELFPULL_COOKIE").ok())
        .context("no cookie given: pass --cookie or set SHELFPULL_COOKIE")?;
      client::run_extract(client::ClientOptions { server, cookie }).await
    }
  }
}
