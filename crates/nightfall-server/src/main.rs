use std::time::Duration;

use clap::Parser;
use nightfall::prelude::*;
use tracing_subscriber::EnvFilter;

/// nightfall-server - social deduction game coordinator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Log filter, e.g. `info` or `nightfall_room=debug`. `RUST_LOG` wins if set.
    #[arg(short, long, default_value = "info")]
    log: String,

    /// Seconds an ended room lingers before it is evicted
    #[arg(long, default_value_t = 300)]
    ended_ttl_secs: u64,

    /// Seconds a disconnected player keeps their seat mid-game
    #[arg(long, default_value_t = 30)]
    reconnect_grace_secs: u64,

    /// Seconds between janitor sweeps
    #[arg(long, default_value_t = 30)]
    janitor_secs: u64,
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            reconnect_grace: Duration::from_secs(self.reconnect_grace_secs),
            ended_room_ttl: Duration::from_secs(self.ended_ttl_secs),
            ..RoomConfig::default()
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_grace_secs: self.reconnect_grace_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), NightfallError> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let server = NightfallServer::builder()
        .bind(&args.bind)
        .room_config(args.room_config())
        .session_config(args.session_config())
        .janitor_interval(Duration::from_secs(args.janitor_secs))
        .build()
        .await?;

    match server.local_addr() {
        Ok(addr) => tracing::info!(%addr, "listening"),
        Err(e) => tracing::warn!(error = %e, "local address unavailable"),
    }

    server.run().await
}
