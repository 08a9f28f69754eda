//! `Server` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → registry → rooms.
//! Exactly one registry/lifecycle pair exists per server instance, built
//! explicitly here and shared with every connection handler.

use std::sync::Arc;

use parlor_protocol::JsonCodec;
use parlor_registry::ConnectionRegistry;
use parlor_room::{GameRules, LifecycleManager, OutcomeStore, RoomConfig};
use parlor_transport::{Transport, WebSocketTransport};

use crate::ParlorError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<R: GameRules, S: OutcomeStore> {
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) lifecycle: LifecycleManager<R, S>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .room_config(RoomConfig { min_participants: 3, ..RoomConfig::default() })
///     .build(MyRules, store)
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the transport and wires up the core with the given game rules
    /// and outcome store.
    pub async fn build<R: GameRules, S: OutcomeStore>(
        self,
        rules: R,
        store: S,
    ) -> Result<Server<R, S>, ParlorError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = Arc::new(ConnectionRegistry::new());
        let lifecycle = LifecycleManager::new(
            self.room_config,
            rules,
            store,
            Arc::clone(&registry),
        );

        let state = Arc::new(ServerState {
            registry,
            lifecycle,
            codec: JsonCodec,
        });

        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Parlor server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server<R: GameRules, S: OutcomeStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, S>>,
}

impl<R: GameRules, S: OutcomeStore> Server<R, S> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task per connection. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!("Parlor server running");

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
