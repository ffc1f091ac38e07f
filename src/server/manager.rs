//! The round manager: the single driver of round timing.
//!
//! One task owns every phase transition and every broadcast. Handlers only
//! ever record bets and cashouts against the shared state; the manager
//! decides when the window closes, advances the multiplier on absolute
//! deadlines, and settles the round.

use std::sync::Arc;

use tokio::time::{self, Instant};

use super::GameServer;
use crate::logging::EventLine;
use crate::protocol::{Frame, FrameKind};

pub(crate) async fn run_rounds(server: Arc<GameServer>) {
    loop {
        // Idle: park until someone is seated. Every occupancy change
        // observed while still parked gets its own start line.
        let mut seen = 0;
        loop {
            let seated = server.table.occupied_count();
            if seated > seen {
                EventLine::new("start").emit();
            }
            seen = seated;
            if seated > 0 {
                break;
            }
            server.table.occupancy_changed().await;
        }

        // Betting: open the window and hold it for the configured time.
        // Players admitted mid-window may bet in whatever remains of it.
        server.round.begin_betting();
        server.broadcast(Frame::broadcast(FrameKind::Start, 0.0));
        time::sleep(server.config.betting_window).await;

        let (n, v, me) = server.round.close_betting();
        server.broadcast(Frame::broadcast(FrameKind::Closed, me));
        EventLine::new("closed").me(me).aggregates(n, v).emit();

        // Flight: tick on absolute deadlines so scheduling jitter does not
        // stretch the round. The explosion tick broadcasts no multiplier.
        let mut ticks = time::interval_at(
            Instant::now() + server.config.tick_interval,
            server.config.tick_interval,
        );
        loop {
            ticks.tick().await;
            match server.round.tick() {
                Some(m) => {
                    server.broadcast(Frame::broadcast(FrameKind::Multiplier, m));
                    EventLine::new("multiplier").m(m).me(me).aggregates(n, v).emit();
                }
                None => break,
            }
        }

        server.broadcast(Frame::broadcast(FrameKind::Explode, me));
        EventLine::new("explode").m(me).me(me).aggregates(n, v).emit();

        // Settlement: losers get an addressed zero payout, every bettor
        // gets a profit report. Seats that cashed out were already paid by
        // their handler. Seats without a bet get nothing.
        let report = server.round.settle();
        let house_profit = server.round.house_profit();
        for entry in &report {
            if !entry.cashed_out {
                server.send_to(
                    entry.id,
                    Frame::addressed(
                        entry.id,
                        FrameKind::Payout,
                        0.0,
                        entry.player_profit,
                        house_profit,
                    ),
                );
                EventLine::new("payout")
                    .id(entry.id)
                    .me(me)
                    .payout(0.0)
                    .profits(entry.player_profit, house_profit)
                    .emit();
            }
            server.send_to(
                entry.id,
                Frame::addressed(
                    entry.id,
                    FrameKind::Profit,
                    0.0,
                    entry.player_profit,
                    house_profit,
                ),
            );
            EventLine::new("profit")
                .id(entry.id)
                .profits(entry.player_profit, house_profit)
                .emit();
        }

        // Anyone still seated rolls straight into the next betting window;
        // an empty table parks the round.
        if server.table.occupied_count() == 0 {
            server.round.set_idle();
        }
    }
}
