//! The Crashpot server: acceptor, player table, round engine.
//!
//! Task layout:
//! - the acceptor loop admits connections into the bounded [`PlayerTable`]
//!   and spawns a reader and a writer task per player,
//! - the round manager drives the betting → flight → explosion lifecycle
//!   and is the only writer of phase transitions and broadcasts,
//! - all socket writes go through per-seat outbound queues, so no lock is
//!   ever held across a write and a slow peer cannot stall a broadcast.
//!
//! Lock order where both are needed: table before round state.

pub mod handler;
pub mod manager;
pub mod round;
pub mod table;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::logging::EventLine;
use crate::protocol::{wire, Frame, FrameKind, PlayerId};
use self::round::RoundState;
use self::table::PlayerTable;

pub struct GameServer {
    pub config: ServerConfig,
    pub table: PlayerTable,
    pub round: RoundState,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let table = PlayerTable::new(config.capacity);
        let round = RoundState::new(config.capacity);
        Arc::new(Self {
            config,
            table,
            round,
        })
    }

    /// Bind the configured family and port with address reuse. Failure here
    /// is fatal: there is no server without a listener.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr();
        let fatal = |what: &str, err: std::io::Error| {
            Error::Fatal(format!("{} {}: {}", what, addr, err))
        };
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| fatal("socket for", e))?;
        socket.set_reuseaddr(true).map_err(|e| fatal("reuseaddr on", e))?;
        socket.bind(addr).map_err(|e| fatal("bind", e))?;
        socket
            .listen(self.config.listen_backlog)
            .map_err(|e| fatal("listen on", e))
    }

    /// Run the round manager and the accept loop until the process dies.
    /// There is no graceful shutdown protocol: clients observe the close.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        tokio::spawn(manager::run_rounds(self.clone()));
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => self.clone().admit_connection(stream, peer).await,
                Err(err) => {
                    tracing::warn!(target: "crashpot::server", "accept failed: {}", err);
                }
            }
        }
    }

    async fn admit_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        match self.table.admit(outbound_tx, shutdown.clone()) {
            Ok(id) => {
                self.round.reset_player(id);
                tracing::info!(target: "crashpot::server", "player {} connected from {}", id, peer);
                let (read_half, write_half) = stream.into_split();
                tokio::spawn(handler::run_writer(
                    self.clone(),
                    id,
                    outbound_rx,
                    write_half,
                    shutdown.clone(),
                ));
                tokio::spawn(handler::run_reader(self, id, read_half, shutdown));
            }
            Err(_) => {
                tracing::info!(target: "crashpot::server", "table full, turning away {}", peer);
                let mut stream = stream;
                let _ = wire::send_frame(&mut stream, &Frame::broadcast(FrameKind::Bye, 0.0)).await;
            }
        }
    }

    /// Queue a frame to every seated player. Dead queues belong to seats a
    /// writer task is already tearing down; they are skipped.
    pub(crate) fn broadcast(&self, frame: Frame) {
        for (_, tx) in self.table.snapshot() {
            let _ = tx.send(frame);
        }
    }

    /// Queue a frame to one seated player, if still seated.
    pub(crate) fn send_to(&self, id: PlayerId, frame: Frame) {
        if let Some(tx) = self.table.sender(id) {
            let _ = tx.send(frame);
        }
    }

    /// Remove a player: free the seat, forfeit an unsettled bet to the
    /// current round, unpark the connection tasks. Idempotent; only the
    /// first caller logs the departure.
    pub(crate) fn drop_player(&self, id: PlayerId) -> bool {
        let released = self.table.release(id);
        if released {
            self.round.forfeit(id);
            EventLine::new("disconnect").id(id).emit();
        }
        released
    }
}
