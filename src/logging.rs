//! Logging setup and the round event log line.
//!
//! Round activity is reported as one line per event with the fields in a
//! fixed order, so operators can grep and align columns across a session:
//!
//! `event=bet | id=3 | m=0.00 | me=0.00 | N=0 | V=0.00 | bet=100.00 | ...`
//!
//! `id=*` marks broadcasts and events not attributable to one player.
//! Unused numeric fields stay zero.

use std::fmt;

use crate::protocol::PlayerId;

/// Install the global tracing subscriber. `filter` uses the usual
/// `EnvFilter` syntax (`info`, `crashpot=debug`, ...).
pub fn init(filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};
    fmt().with_env_filter(EnvFilter::new(filter)).init();
}

/// One round event, rendered in the fixed field order.
#[derive(Debug, Clone, Copy)]
pub struct EventLine {
    event: &'static str,
    id: Option<PlayerId>,
    m: f32,
    me: f32,
    n: u32,
    v: f32,
    bet: f32,
    payout: f32,
    player_profit: f32,
    house_profit: f32,
}

impl EventLine {
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            id: None,
            m: 0.0,
            me: 0.0,
            n: 0,
            v: 0.0,
            bet: 0.0,
            payout: 0.0,
            player_profit: 0.0,
            house_profit: 0.0,
        }
    }

    pub fn id(mut self, id: PlayerId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn m(mut self, m: f32) -> Self {
        self.m = m;
        self
    }

    pub fn me(mut self, me: f32) -> Self {
        self.me = me;
        self
    }

    pub fn aggregates(mut self, n: u32, v: f32) -> Self {
        self.n = n;
        self.v = v;
        self
    }

    pub fn bet(mut self, bet: f32) -> Self {
        self.bet = bet;
        self
    }

    pub fn payout(mut self, payout: f32) -> Self {
        self.payout = payout;
        self
    }

    pub fn profits(mut self, player: f32, house: f32) -> Self {
        self.player_profit = player;
        self.house_profit = house;
        self
    }

    /// Emit through tracing at info level.
    pub fn emit(self) {
        tracing::info!(target: "crashpot::round", "{}", self);
    }
}

impl fmt::Display for EventLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event={} | id=", self.event)?;
        match self.id {
            Some(id) => write!(f, "{}", id)?,
            None => f.write_str("*")?,
        }
        write!(
            f,
            " | m={:.2} | me={:.2} | N={} | V={:.2} | bet={:.2} | payout={:.2} | player_profit={:.2} | house_profit={:.2}",
            self.m,
            self.me,
            self.n,
            self.v,
            self.bet,
            self.payout,
            self.player_profit,
            self.house_profit
        )
    }
}
