//! `NightfallServer` builder, accept loop, and janitor.
//!
//! This ties the layers together: transport → protocol → room registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use nightfall_protocol::{Codec, JsonCodec, SessionId};
use nightfall_room::{RoomConfig, RoomRegistry, find_ended};
use nightfall_session::SessionConfig;
use nightfall_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::NightfallError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: C,
    next_session: AtomicU64,
    started: Instant,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn next_session(&self) -> SessionId {
        SessionId(self.next_session.fetch_add(1, Ordering::Relaxed))
    }

    /// Milliseconds since the server started.
    pub(crate) fn server_time(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Nightfall server.
///
/// # Example
///
/// ```rust,ignore
/// use nightfall::prelude::*;
///
/// let server = NightfallServer::builder()
///     .bind("0.0.0.0:8080")
///     .room_config(RoomConfig { ended_room_ttl: Duration::from_secs(60), ..Default::default() })
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct NightfallServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    session_config: SessionConfig,
    janitor_interval: Duration,
}

impl NightfallServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            session_config: SessionConfig::default(),
            janitor_interval: Duration::from_secs(30),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every new room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how often ended rooms and expired sessions are swept.
    pub fn janitor_interval(mut self, every: Duration) -> Self {
        self.janitor_interval = every;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<NightfallServer<JsonCodec>, NightfallError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(self.room_config, self.session_config)),
            codec: JsonCodec,
            next_session: AtomicU64::new(1),
            started: Instant::now(),
        });

        Ok(NightfallServer {
            transport,
            state,
            janitor_interval: self.janitor_interval,
        })
    }
}

impl Default for NightfallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Nightfall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NightfallServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    janitor_interval: Duration,
}

impl NightfallServer<JsonCodec> {
    pub fn builder() -> NightfallServerBuilder {
        NightfallServerBuilder::new()
    }
}

impl<C: Codec> NightfallServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the janitor and the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run(mut self) -> Result<(), NightfallError> {
        tracing::info!("Nightfall server running");

        tokio::spawn(run_janitor(Arc::clone(&self.state), self.janitor_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically evicts ended rooms and forgets expired sessions.
async fn run_janitor<C: Codec>(state: Arc<ServerState<C>>, every: Duration) {
    let mut interval = tokio::time::interval(every.max(Duration::from_millis(10)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let (handles, ttl) = {
            let registry = state.registry.lock().await;
            (registry.handles(), registry.config().ended_room_ttl)
        };
        let evicted = find_ended(handles, ttl).await;

        let mut registry = state.registry.lock().await;
        registry.destroy_rooms(&evicted).await;
        let swept = registry.sweep_sessions();
        if !evicted.is_empty() || swept > 0 {
            tracing::info!(
                rooms = evicted.len(),
                sessions = swept,
                remaining = registry.room_count(),
                "janitor sweep"
            );
        }
    }
}
