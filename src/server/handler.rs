//! Per-connection tasks.
//!
//! Each admitted player gets two tasks: a writer draining the seat's
//! outbound queue onto the socket, and a reader dispatching incoming
//! frames against the round state. Either task dropping the player unparks
//! the other through the seat's shutdown signal, so a parked read never
//! outlives its seat.

use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

use super::GameServer;
use crate::error::Error;
use crate::logging::EventLine;
use crate::protocol::{wire, Frame, FrameKind, PlayerId};

/// Drain the seat's outbound queue onto the socket. A send failure means
/// the peer is unreachable: drop the player so broadcasts stop queueing.
pub(crate) async fn run_writer(
    server: Arc<GameServer>,
    id: PlayerId,
    mut outbound: UnboundedReceiver<Frame>,
    mut writer: OwnedWriteHalf,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = wire::send_frame(&mut writer, &frame).await {
                        tracing::debug!(target: "crashpot::server", "send to player {} failed: {}", id, err);
                        server.drop_player(id);
                        break;
                    }
                    if frame.kind == FrameKind::Bye {
                        break;
                    }
                }
                // seat released, queue closed
                None => break,
            },
            _ = shutdown.notified() => {
                // flush whatever was queued before the release, then close
                while let Ok(frame) = outbound.try_recv() {
                    if wire::send_frame(&mut writer, &frame).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
}

/// Read frames until the player leaves, misbehaves, or the seat is released
/// out from under us.
pub(crate) async fn run_reader(
    server: Arc<GameServer>,
    id: PlayerId,
    mut reader: OwnedReadHalf,
    shutdown: Arc<Notify>,
) {
    loop {
        let frame = tokio::select! {
            res = wire::recv_frame(&mut reader) => res,
            _ = shutdown.notified() => return,
        };
        match frame {
            Ok(frame) => {
                if !dispatch(&server, id, frame) {
                    return;
                }
            }
            Err(Error::Malformed(reason)) => {
                tracing::warn!(target: "crashpot::server", "player {} sent a malformed frame: {}", id, reason);
                server.drop_player(id);
                return;
            }
            // PeerGone or a transport fault: release, no accumulator updates
            Err(err) => {
                tracing::debug!(target: "crashpot::server", "player {} read failed: {}", id, err);
                server.drop_player(id);
                return;
            }
        }
    }
}

/// Handle one client frame. Returns false when the connection is done.
fn dispatch(server: &Arc<GameServer>, id: PlayerId, frame: Frame) -> bool {
    match frame.kind {
        FrameKind::Bet => {
            // game-invalid bets are dropped without a response frame
            if server.round.record_bet(id, frame.value).is_ok() {
                EventLine::new("bet").id(id).bet(frame.value).emit();
            }
            true
        }
        FrameKind::Cashout => {
            if let Ok(receipt) = server.round.record_cashout(id) {
                server.send_to(
                    id,
                    Frame::addressed(
                        id,
                        FrameKind::Payout,
                        receipt.payout,
                        receipt.player_profit,
                        receipt.house_profit,
                    ),
                );
                EventLine::new("payout")
                    .id(id)
                    .m(receipt.multiplier)
                    .payout(receipt.payout)
                    .profits(receipt.player_profit, receipt.house_profit)
                    .emit();
            }
            true
        }
        FrameKind::Bye => {
            server.send_to(id, Frame::addressed(id, FrameKind::Bye, 0.0, 0.0, 0.0));
            server.drop_player(id);
            false
        }
        // a server→client tag coming from a client is a protocol violation
        _ => {
            tracing::warn!(target: "crashpot::server", "player {} sent unexpected {} frame", id, frame.kind);
            server.drop_player(id);
            false
        }
    }
}
